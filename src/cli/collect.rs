//! # collect 子命令 CLI 定义
//!
//! 汇总完成的计算到 CSV
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/collect.rs`

use clap::Args;
use std::path::PathBuf;

/// collect 子命令参数
#[derive(Args, Debug)]
pub struct CollectArgs {
    /// Root directory containing calculation folders
    pub root: PathBuf,

    /// Output CSV file
    #[arg(short, long, default_value = "calculations.csv")]
    pub output: PathBuf,

    /// Include calculations that did not converge
    #[arg(long, default_value_t = false)]
    pub include_unconverged: bool,

    /// Number of parallel jobs (0 = all CPUs)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,
}
