//! # run 子命令 CLI 定义
//!
//! 对每个计算目录分类并在需要时运行或提交
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/run.rs`

use clap::Args;
use std::path::PathBuf;

/// run 子命令参数
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Calculation directories (default: current directory)
    pub dirs: Vec<PathBuf>,

    /// Search directories recursively
    #[arg(short, long, default_value_t = false)]
    pub recursive: bool,

    /// Also recompute when the magnetic moment was never recorded
    #[arg(long, default_value_t = false)]
    pub magmom: bool,

    /// Do not scan OUTCAR for errors when a job finishes
    #[arg(long, default_value_t = false)]
    pub no_check_errors: bool,
}
