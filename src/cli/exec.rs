//! # exec 子命令 CLI 定义
//!
//! 作业脚本中执行的命令：按队列环境选择串行 / 并行运行 VASP
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/exec.rs`

use clap::Args;
use std::path::PathBuf;

/// exec 子命令参数
#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Calculation directory
    #[arg(default_value = ".")]
    pub dir: PathBuf,
}
