//! # clone 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/clone.rs`

use clap::Args;
use std::path::PathBuf;

/// clone 子命令参数
#[derive(Args, Debug)]
pub struct CloneArgs {
    /// Source calculation directory
    pub src: PathBuf,

    /// Destination directory (created if missing)
    pub dst: PathBuf,
}
