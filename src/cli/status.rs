//! # status 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/status.rs`

use clap::Args;
use std::path::PathBuf;

/// status 子命令参数
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Calculation directories (default: current directory)
    pub dirs: Vec<PathBuf>,

    /// Search directories recursively
    #[arg(short, long, default_value_t = false)]
    pub recursive: bool,

    /// Number of parallel jobs (0 = all CPUs)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,
}
