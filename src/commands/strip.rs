//! # strip 命令实现
//!
//! ## 依赖关系
//! - 使用 `cli/strip.rs` 定义的参数
//! - 使用 `calculator/files.rs`, `batch/collector.rs`

use crate::batch::CalcCollector;
use crate::calculator::files::strip_calculation;
use crate::cli::strip::StripArgs;
use crate::error::Result;
use crate::utils::output;

/// 执行 strip 命令
pub fn execute(args: StripArgs) -> Result<()> {
    let dirs = CalcCollector::new(args.dirs)
        .recursive(args.recursive)
        .collect();
    if dirs.is_empty() {
        output::print_warning("No VASP calculation directories found.");
        return Ok(());
    }

    let mut total = 0;
    for dir in &dirs {
        let removed = strip_calculation(dir, &args.extra)?;
        if removed.is_empty() {
            output::print_skip(&format!("{}: nothing to remove", dir.display()));
        } else {
            output::print_success(&format!("{}: removed {} files", dir.display(), removed.len()));
        }
        total += removed.len();
    }

    output::print_done(&format!("Removed {} files", total));
    Ok(())
}
