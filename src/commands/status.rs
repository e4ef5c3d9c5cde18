//! # status 命令实现
//!
//! 只做分类，不恢复配置、不执行钩子。
//!
//! ## 依赖关系
//! - 使用 `cli/status.rs` 定义的参数
//! - 使用 `calculator/`, `batch/`

use super::{print_batch_summary, print_results};
use crate::batch::{BatchRunner, CalcCollector, ProcessResult};
use crate::calculator::{DirectoryState, Hooks, Jasp};
use crate::cli::status::StatusArgs;
use crate::config::JaspRc;
use crate::error::Result;
use crate::queue::JobHandle;
use crate::utils::output;

use std::path::Path;

/// 执行 status 命令
pub fn execute(args: StatusArgs, rc: JaspRc) -> Result<()> {
    output::print_header("Calculation Status");

    let dirs = CalcCollector::new(args.dirs)
        .recursive(args.recursive)
        .collect();
    if dirs.is_empty() {
        output::print_warning("No VASP calculation directories found.");
        return Ok(());
    }

    let jasp = Jasp::from_rc(rc, Hooks::none())?;
    let (summary, results) =
        BatchRunner::new(args.jobs).run(&dirs, |dir| status_of(&jasp, dir));

    print_results(&results);
    print_batch_summary(&summary);
    Ok(())
}

fn status_of(jasp: &Jasp, dir: &Path) -> ProcessResult {
    let name = dir.display().to_string();
    let state = match jasp.classify(dir) {
        Ok(state) => state,
        Err(e) => return ProcessResult::Failed(name, e.to_string()),
    };

    let job = match JobHandle::read(dir) {
        Ok(Some(job)) => format!(" (job {})", job),
        _ => String::new(),
    };
    let line = format!("{}: {}{}", name, state, job);

    match state {
        DirectoryState::QueuedNotRunning | DirectoryState::QueuedRunning => {
            ProcessResult::Pending(line)
        }
        DirectoryState::JustFinished | DirectoryState::LongDone => ProcessResult::Success(line),
        _ => ProcessResult::Skipped(line),
    }
}
