//! # memory 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/memory.rs`

use clap::Args;
use std::path::PathBuf;

/// memory 子命令参数
#[derive(Args, Debug)]
pub struct MemoryArgs {
    /// Calculation directory
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    /// Seconds to wait for the diagnostic run (overrides the configuration)
    #[arg(long)]
    pub timeout: Option<u64>,
}
