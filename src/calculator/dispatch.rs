//! # 运行调度
//!
//! `run` 的判断顺序：
//! 1. 已有作业在排队 → `JobQueued`；正在运行 → `JobRunning`
//! 2. `mode = none` → `RunDisabled`
//! 3. 按注册顺序执行运行前钩子
//! 4. 写出输入文件
//! 5. 在队列作业内或 `mode = run`：按槽数选择串行 / 并行，立即运行 VASP
//! 6. 否则渲染作业脚本并提交，记录 `jobid` → `JobSubmitted`
//!
//! 排队、运行、已提交都不是结果可用的状态，调用方必须按 `RunOutcome` 分支处理。

use super::memory::{mem_request, MEMORY_KEY};
use super::{Calculator, Quantity};
use crate::config::{JaspRc, RunMode};
use crate::error::{JaspError, Result};
use crate::queue::env::plan_execution;
use crate::queue::script::{render_job_script, RUNNING_FILE};
use crate::queue::{JobHandle, JobSpec, QueueEnvironment, QueueStatus};
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::{debug, info};

/// VASP 标准输出
pub const VASP_OUTPUT: &str = "vasp.out";

/// 运行请求的结果
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// 不需要计算，结果可用
    Ready,
    /// 已在本进程中运行完毕
    Completed { exit_code: i32 },
    /// 作业在队列中等待
    JobQueued,
    /// 作业正在运行
    JobRunning,
    /// 已提交新作业
    JobSubmitted(JobHandle),
}

impl RunOutcome {
    /// 结果是否可以读取
    pub fn is_available(&self) -> bool {
        matches!(
            self,
            RunOutcome::Ready | RunOutcome::Completed { exit_code: 0 }
        )
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Ready => write!(f, "ready"),
            RunOutcome::Completed { exit_code } => write!(f, "completed (exit {})", exit_code),
            RunOutcome::JobQueued => write!(f, "queued"),
            RunOutcome::JobRunning => write!(f, "running"),
            RunOutcome::JobSubmitted(job) => write!(f, "submitted {}", job),
        }
    }
}

impl Calculator {
    /// 已有作业的状态；没有未完成作业时返回 None
    fn pending_job(&self) -> Result<Option<RunOutcome>> {
        if self.state().in_queue() {
            let running = self.state() == super::DirectoryState::QueuedRunning
                || self.queue_status == Some(QueueStatus::Running);
            return Ok(Some(if running {
                RunOutcome::JobRunning
            } else {
                RunOutcome::JobQueued
            }));
        }

        let Some(job) = self.job()? else {
            return Ok(None);
        };
        let status = self.context().queue.status(&job)?;
        let running = self.dir().join(RUNNING_FILE).exists();
        Ok(match status {
            QueueStatus::Running => Some(RunOutcome::JobRunning),
            QueueStatus::Queued if running => Some(RunOutcome::JobRunning),
            QueueStatus::Queued => Some(RunOutcome::JobQueued),
            QueueStatus::NotQueued | QueueStatus::Finished => None,
        })
    }

    /// 需要时运行计算
    pub fn calculate(&mut self, quantities: &[Quantity]) -> Result<RunOutcome> {
        if let Some(outcome) = self.pending_job()? {
            return Ok(outcome);
        }
        if !self.calculation_required(quantities)? {
            return Ok(RunOutcome::Ready);
        }
        self.run()
    }

    /// 运行或提交计算
    pub fn run(&mut self) -> Result<RunOutcome> {
        if let Some(outcome) = self.pending_job()? {
            info!("{}: {}", self.dir().display(), outcome);
            return Ok(outcome);
        }

        let ctx = Arc::clone(self.context());
        if ctx.rc.mode == RunMode::None {
            return Err(JaspError::RunDisabled {
                path: self.dir().display().to_string(),
            });
        }

        ctx.hooks.run_pre(self)?;
        self.write_config()?;

        if ctx.env.in_queue || ctx.rc.mode == RunMode::Run {
            let exit_code = execute_solver(self.dir(), &ctx.rc, &ctx.env)?;
            self.read_results()?;
            return Ok(RunOutcome::Completed { exit_code });
        }

        self.submit()
    }

    fn submit(&mut self) -> Result<RunOutcome> {
        let ctx = Arc::clone(self.context());
        let job = JobSpec {
            name: job_name(self.dir()),
            workdir: self.dir().to_path_buf(),
            script: render_job_script(&ctx.rc, self.dir()),
            mem: self
                .metadata()
                .get_f64(MEMORY_KEY)
                .map(|gb| mem_request(&ctx.rc.queue, gb)),
        };

        let handle = ctx.queue.submit(&job)?;
        handle.write(self.dir())?;
        info!("{}: submitted {} to {}", self.dir().display(), handle, ctx.queue.name());
        Ok(RunOutcome::JobSubmitted(handle))
    }
}

/// 作业名：相对主目录的路径
fn job_name(dir: &Path) -> String {
    dirs::home_dir()
        .and_then(|home| dir.strip_prefix(home).ok().map(Path::to_path_buf))
        .filter(|rel| !rel.as_os_str().is_empty())
        .unwrap_or_else(|| dir.to_path_buf())
        .display()
        .to_string()
}

/// 在目录中运行 VASP，标准输出写入 `vasp.out`，返回退出码
pub fn execute_solver(dir: &Path, rc: &JaspRc, env: &QueueEnvironment) -> Result<i32> {
    let plan = plan_execution(env, &rc.queue, rc.cores_per_process);
    let (program, args) = plan.command(&rc.vasp.serial, &rc.vasp.parallel, &rc.vasp.mpirun);
    info!("{}: {} {}", dir.display(), program, args.join(" "));

    let out_path = dir.join(VASP_OUTPUT);
    let out = File::create(&out_path).map_err(|e| JaspError::write(&out_path, e))?;

    let status = Command::new(&program)
        .args(&args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(out)
        .status()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => JaspError::CommandNotFound {
                command: program.clone(),
            },
            _ => JaspError::CommandFailed {
                command: program.clone(),
                stderr: e.to_string(),
            },
        })?;

    let code = status.code().unwrap_or(-1);
    debug!("{} exited with {}", program, code);
    Ok(code)
}
