//! # exec 命令实现
//!
//! 在队列作业内运行 VASP：从队列环境读取槽数，选择串行或 MPI 并行。
//! 不做分类，也不检查是否需要计算。
//!
//! ## 依赖关系
//! - 使用 `cli/exec.rs` 定义的参数
//! - 使用 `calculator/dispatch.rs`, `queue/env.rs`

use crate::calculator::dispatch::execute_solver;
use crate::cli::exec::ExecArgs;
use crate::config::JaspRc;
use crate::error::{JaspError, Result};
use crate::queue::QueueEnvironment;
use crate::utils::output;

/// 执行 exec 命令
pub fn execute(args: ExecArgs, rc: JaspRc) -> Result<()> {
    if !args.dir.is_dir() {
        return Err(JaspError::DirectoryNotFound {
            path: args.dir.display().to_string(),
        });
    }

    let env = QueueEnvironment::detect()?;
    if !env.in_queue {
        output::print_warning("Not inside a queue job; running in the foreground.");
    }

    let code = execute_solver(&args.dir, &rc, &env)?;
    if code != 0 {
        return Err(JaspError::CommandFailed {
            command: rc.vasp.serial.clone(),
            stderr: format!("exit code {}", code),
        });
    }

    output::print_done(&format!("VASP finished in {}", args.dir.display()));
    Ok(())
}
