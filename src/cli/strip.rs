//! # strip 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/strip.rs`

use clap::Args;
use std::path::PathBuf;

/// strip 子命令参数
#[derive(Args, Debug)]
pub struct StripArgs {
    /// Calculation directories (default: current directory)
    pub dirs: Vec<PathBuf>,

    /// Additional files to remove (comma-separated, e.g. 'LOCPOT,PROCAR')
    #[arg(long, value_delimiter = ',')]
    pub extra: Vec<String>,

    /// Search directories recursively
    #[arg(short, long, default_value_t = false)]
    pub recursive: bool,
}
