//! # 作业队列模块
//!
//! 与外部批处理调度器（PBS / SGE）交互：查询作业状态、提交作业脚本。
//!
//! ## 功能
//! - `QueueProbe`：按作业号查询状态
//! - `BatchQueue`：在探针之上增加提交
//! - `JobHandle`：作业号，持久化为目录中的 `jobid` 文件
//! - `env`：检测当前进程是否运行在队列分配的环境中
//! - `script`：渲染作业脚本
//!
//! ## 依赖关系
//! - 被 `calculator/`, `commands/` 使用
//! - 使用 `config.rs`, `error.rs`
//! - 子模块: pbs, sge, env, script

pub mod env;
pub mod pbs;
pub mod script;
pub mod sge;

use crate::config::{JaspRc, Scheduler};
use crate::error::{JaspError, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::debug;

pub use env::{ExecutionPlan, QueueEnvironment};

/// 作业号标记文件
pub const JOBID_FILE: &str = "jobid";

/// 队列中的作业状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStatus {
    /// 不在队列中（未知作业号或已被清除）
    NotQueued,
    /// 排队等待
    Queued,
    /// 调度器报告正在运行
    Running,
    /// 调度器仍保留记录，但已完成
    Finished,
}

impl QueueStatus {
    /// 作业是否仍在队列中（排队或运行）
    pub fn in_queue(self) -> bool {
        matches!(self, QueueStatus::Queued | QueueStatus::Running)
    }
}

/// 外部作业号
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        JobHandle(id.into().trim().to_string())
    }

    pub fn id(&self) -> &str {
        &self.0
    }

    /// 读取目录中的 `jobid`；不存在时返回 None
    pub fn read(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(JOBID_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|e| JaspError::read(&path, e))?;
        Ok(Some(JobHandle::new(content)))
    }

    /// 写入 `jobid`
    pub fn write(&self, dir: &Path) -> Result<()> {
        let path = dir.join(JOBID_FILE);
        fs::write(&path, &self.0).map_err(|e| JaspError::write(&path, e))
    }

    /// 删除 `jobid`（作业已成为历史）
    pub fn remove(dir: &Path) -> Result<()> {
        let path = dir.join(JOBID_FILE);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(JaspError::write(&path, e)),
        }
    }
}

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 待提交的作业
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub name: String,
    /// 计算目录（绝对路径），提交命令在此目录中执行
    pub workdir: PathBuf,
    /// 作业脚本内容
    pub script: String,
    /// 覆盖配置中的内存请求（来自内存估计）
    pub mem: Option<String>,
}

/// 作业状态探针
pub trait QueueProbe {
    fn status(&self, job: &JobHandle) -> Result<QueueStatus>;
}

/// 可提交作业的调度器
pub trait BatchQueue: QueueProbe + Send + Sync {
    fn submit(&self, job: &JobSpec) -> Result<JobHandle>;

    fn name(&self) -> &str;
}

/// 按配置创建调度器适配器
pub fn from_rc(rc: &JaspRc) -> Box<dyn BatchQueue> {
    match rc.scheduler {
        Scheduler::Pbs => Box::new(pbs::PbsQueue::new(rc.queue.clone())),
        Scheduler::Sge => Box::new(sge::SgeQueue::new(rc.queue.clone())),
    }
}

/// 运行外部命令，可选写入标准输入
pub(crate) fn run_command(
    program: &str,
    args: &[String],
    workdir: Option<&Path>,
    stdin: Option<&str>,
) -> Result<Output> {
    debug!("{} {}", program, args.join(" "));

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = workdir {
        cmd.current_dir(dir);
    }

    let mut child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            JaspError::CommandNotFound {
                command: program.to_string(),
            }
        } else {
            JaspError::CommandFailed {
                command: program.to_string(),
                stderr: e.to_string(),
            }
        }
    })?;

    if let (Some(text), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(text.as_bytes())
            .map_err(|e| JaspError::CommandFailed {
                command: program.to_string(),
                stderr: e.to_string(),
            })?;
    }

    child.wait_with_output().map_err(|e| JaspError::CommandFailed {
        command: program.to_string(),
        stderr: e.to_string(),
    })
}

/// 提交命令的统一检查：无输出或有错误输出即失败
/// 检查查询命令的输出；失败时带上 stderr
pub(crate) fn check_query(command: &str, output: &Output) -> Result<String> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(JaspError::QueueCommandFailed {
            command: command.to_string(),
            message: if stderr.is_empty() {
                format!("exit status {}", output.status)
            } else {
                stderr
            },
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

pub(crate) fn check_submission(command: &str, output: &Output) -> Result<String> {
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if stdout.is_empty() || !stderr.is_empty() || !output.status.success() {
        return Err(JaspError::SubmissionError {
            command: command.to_string(),
            message: if stderr.is_empty() {
                format!("no job id returned (exit status {})", output.status)
            } else {
                stderr
            },
        });
    }
    Ok(stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_handle_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(JobHandle::read(dir.path()).unwrap(), None);

        JobHandle::new("1234.server\n").write(dir.path()).unwrap();
        let handle = JobHandle::read(dir.path()).unwrap().unwrap();
        assert_eq!(handle.id(), "1234.server");

        JobHandle::remove(dir.path()).unwrap();
        assert!(!dir.path().join(JOBID_FILE).exists());
        JobHandle::remove(dir.path()).unwrap();
    }

    #[test]
    fn test_in_queue() {
        assert!(QueueStatus::Queued.in_queue());
        assert!(QueueStatus::Running.in_queue());
        assert!(!QueueStatus::NotQueued.in_queue());
        assert!(!QueueStatus::Finished.in_queue());
    }

    #[cfg(unix)]
    #[test]
    fn test_check_submission() {
        use std::os::unix::process::ExitStatusExt;
        use std::process::ExitStatus;

        let output = |stdout: &str, stderr: &str| Output {
            status: ExitStatus::from_raw(0),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        };
        assert_eq!(
            check_submission("qsub", &output("4242.server\n", "")).unwrap(),
            "4242.server"
        );
        assert!(matches!(
            check_submission("qsub", &output("", "")),
            Err(JaspError::SubmissionError { .. })
        ));
        assert!(matches!(
            check_submission("qsub", &output("4242.server", "qsub: Unknown queue")),
            Err(JaspError::SubmissionError { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_query_is_an_error() {
        use std::os::unix::process::ExitStatusExt;
        use std::process::ExitStatus;

        // 等待状态编码：退出码 1
        let failed = Output {
            status: ExitStatus::from_raw(1 << 8),
            stdout: Vec::new(),
            stderr: b"qselect: cannot connect to server\n".to_vec(),
        };
        match check_query("qselect", &failed) {
            Err(JaspError::QueueCommandFailed { command, message }) => {
                assert_eq!(command, "qselect");
                assert_eq!(message, "qselect: cannot connect to server");
            }
            other => panic!("unexpected {:?}", other),
        }

        let silent = Output {
            status: ExitStatus::from_raw(2 << 8),
            stdout: Vec::new(),
            stderr: Vec::new(),
        };
        assert!(matches!(
            check_query("qselect", &silent),
            Err(JaspError::QueueCommandFailed { .. })
        ));

        let listed = Output {
            status: ExitStatus::from_raw(0),
            stdout: b"101.server\n".to_vec(),
            stderr: Vec::new(),
        };
        assert_eq!(check_query("qselect", &listed).unwrap(), "101.server\n");
    }

    #[test]
    fn test_missing_command() {
        let err = run_command("jasp-no-such-command", &[], None, None).unwrap_err();
        assert!(matches!(err, JaspError::CommandNotFound { .. }));
    }
}
