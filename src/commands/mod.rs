//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `calculator/`, `batch/`, `utils/`
//! - 子模块: run, status, exec, summary, collect, clone, strip, memory

pub mod clone;
pub mod collect;
pub mod exec;
pub mod memory;
pub mod run;
pub mod status;
pub mod strip;
pub mod summary;

use crate::batch::{BatchResult, ProcessResult};
use crate::cli::{Cli, Commands};
use crate::config::JaspRc;
use crate::error::Result;
use crate::utils::{logging, output};

/// 执行命令
pub fn run(cli: Cli) -> Result<()> {
    logging::init(cli.verbosity());
    let rc = load_rc(&cli)?;

    match cli.command {
        Commands::Run(args) => run::execute(args, rc),
        Commands::Status(args) => status::execute(args, rc),
        Commands::Exec(args) => exec::execute(args, rc),
        Commands::Sum(args) => summary::execute(args, rc),
        Commands::Collect(args) => collect::execute(args, rc),
        Commands::Clone(args) => clone::execute(args),
        Commands::Strip(args) => strip::execute(args),
        Commands::Memory(args) => memory::execute(args, rc),
    }
}

/// 加载 jasprc 并应用命令行覆盖
fn load_rc(cli: &Cli) -> Result<JaspRc> {
    let mut rc = match &cli.rc {
        Some(path) => JaspRc::load_from(path)?,
        None => JaspRc::load()?,
    };
    if let Some(mode) = cli.mode {
        rc.mode = mode;
    }
    if let Some(scheduler) = cli.scheduler {
        rc.scheduler = scheduler;
    }
    Ok(rc)
}

/// 按输入顺序打印每个目录的结果
pub(crate) fn print_results(results: &[ProcessResult]) {
    for result in results {
        match result {
            ProcessResult::Success(msg) => output::print_success(msg),
            ProcessResult::Pending(msg) => output::print_pending(msg),
            ProcessResult::Skipped(msg) => output::print_skip(msg),
            ProcessResult::Failed(path, err) => output::print_error(&format!("{}: {}", path, err)),
        }
    }
}

/// 打印批量统计
pub(crate) fn print_batch_summary(summary: &BatchResult) {
    output::print_separator();
    output::print_done(&format!(
        "{} directories: {} done, {} pending, {} skipped, {} failed",
        summary.total(),
        summary.success,
        summary.pending,
        summary.skipped,
        summary.failed
    ));
}
