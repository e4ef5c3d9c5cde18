//! # run 命令实现
//!
//! 对每个计算目录：进入目录 → 分类 → `calculate`。
//! 排队、运行中、已提交都按目录报告，一个目录出错不影响其他目录。
//!
//! ## 依赖关系
//! - 使用 `cli/run.rs` 定义的参数
//! - 使用 `calculator/`, `batch/`
//! - 使用 `utils/output.rs`

use super::{print_batch_summary, print_results};
use crate::batch::{BatchRunner, CalcCollector, ProcessResult};
use crate::calculator::{CalcRequest, Hooks, Jasp, Quantity, RunOutcome};
use crate::cli::run::RunArgs;
use crate::config::JaspRc;
use crate::error::Result;
use crate::utils::output;

use std::path::Path;

/// 执行 run 命令
pub fn execute(args: RunArgs, rc: JaspRc) -> Result<()> {
    output::print_header("Running Calculations");

    let dirs = CalcCollector::new(args.dirs)
        .recursive(args.recursive)
        .collect();
    if dirs.is_empty() {
        output::print_warning("No VASP calculation directories found.");
        return Ok(());
    }
    output::print_info(&format!(
        "{} directories, mode {:?}, scheduler {}",
        dirs.len(),
        rc.mode,
        rc.scheduler
    ));

    let hooks = if args.no_check_errors {
        Hooks::none()
    } else {
        Hooks::standard()
    };
    let jasp = Jasp::from_rc(rc, hooks)?;

    let mut quantities = vec![Quantity::Energy];
    if args.magmom {
        quantities.push(Quantity::Magmom);
    }

    // 进入目录会改变进程工作目录，必须顺序执行
    let (summary, results) =
        BatchRunner::sequential().run(&dirs, |dir| run_one(&jasp, dir, &quantities));

    print_results(&results);
    print_batch_summary(&summary);
    Ok(())
}

fn run_one(jasp: &Jasp, dir: &Path, quantities: &[Quantity]) -> ProcessResult {
    let name = dir.display().to_string();
    let outcome = jasp.enter(dir, CalcRequest::new(), |calc| calc.calculate(quantities));

    match outcome {
        Ok(RunOutcome::Ready) => ProcessResult::Success(format!("{}: up to date", name)),
        Ok(RunOutcome::Completed { exit_code: 0 }) => {
            ProcessResult::Success(format!("{}: completed", name))
        }
        Ok(RunOutcome::Completed { exit_code }) => {
            ProcessResult::Failed(name, format!("VASP exited with code {}", exit_code))
        }
        Ok(pending) => ProcessResult::Pending(format!("{}: {}", name, pending)),
        Err(e) => ProcessResult::Failed(name, e.to_string()),
    }
}
