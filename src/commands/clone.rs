//! # clone 命令实现
//!
//! ## 依赖关系
//! - 使用 `cli/clone.rs` 定义的参数
//! - 使用 `calculator/files.rs`

use crate::calculator::files::clone_calculation;
use crate::cli::clone::CloneArgs;
use crate::error::Result;
use crate::utils::output;

/// 执行 clone 命令
pub fn execute(args: CloneArgs) -> Result<()> {
    let copied = clone_calculation(&args.src, &args.dst)?;
    output::print_success(&format!(
        "Copied {} files from '{}' to '{}'",
        copied,
        args.src.display(),
        args.dst.display()
    ));
    Ok(())
}
