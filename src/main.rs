use clap::Parser;
use jasp::cli::Cli;
use jasp::utils::output;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    if let Err(e) = try_main() {
        // {:#} 打印完整的错误来源链
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn try_main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    jasp::commands::run(cli)?;
    Ok(())
}
