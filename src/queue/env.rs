//! # 队列环境检测
//!
//! 判断当前进程是否运行在调度器分配的作业中，并读取可用进程槽数：
//! - PBS: `PBS_O_WORKDIR`，`PBS_NODEFILE`（槽数 = 节点文件行数）
//! - SGE: `SGE_O_WORKDIR`，`PE_HOSTFILE` / `NSLOTS`
//!
//! 环境被捕获为值，串行 / 并行的选择 (`plan_execution`) 是纯函数。

use crate::config::QueueSettings;
use crate::error::{JaspError, Result};
use std::fs;
use std::path::Path;

/// 捕获的队列环境
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueEnvironment {
    /// 是否在队列作业内
    pub in_queue: bool,
    /// 可用进程槽数
    pub slots: Option<usize>,
}

impl QueueEnvironment {
    /// 从进程环境检测
    pub fn detect() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意变量来源检测
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let in_queue = lookup("PBS_O_WORKDIR").is_some() || lookup("SGE_O_WORKDIR").is_some();

        let slots = if let Some(nodefile) = lookup("PBS_NODEFILE") {
            Some(count_lines(Path::new(&nodefile))?)
        } else if let Some(nslots) = lookup("NSLOTS") {
            let n = nslots.trim().parse().map_err(|_| {
                JaspError::ConfigError(format!("NSLOTS is not a number: {}", nslots))
            })?;
            Some(n)
        } else {
            None
        };

        Ok(QueueEnvironment { in_queue, slots })
    }

    /// 队列外
    pub fn outside() -> Self {
        Self::default()
    }
}

fn count_lines(path: &Path) -> Result<usize> {
    let content = fs::read_to_string(path).map_err(|e| JaspError::read(path, e))?;
    Ok(content.lines().filter(|l| !l.trim().is_empty()).count())
}

/// 执行方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPlan {
    Serial,
    Parallel { nprocs: usize },
}

/// 选择串行或并行执行
///
/// 槽数为 1 或未知时串行；多节点、或单节点多核且未设置 `cores_per_process` 时
/// 用全部槽并行；否则按 `cores_per_process` 拆分给独立的子任务。
pub fn plan_execution(
    env: &QueueEnvironment,
    queue: &QueueSettings,
    cores_per_process: Option<u32>,
) -> ExecutionPlan {
    let nprocs = match env.slots {
        None | Some(0) | Some(1) => return ExecutionPlan::Serial,
        Some(n) => n,
    };

    let whole_job = queue.nodes > 1 || (queue.ppn > 1 && cores_per_process.is_none());
    if whole_job {
        return ExecutionPlan::Parallel { nprocs };
    }

    match cores_per_process {
        Some(c) if c > 1 => ExecutionPlan::Parallel { nprocs: c as usize },
        _ => ExecutionPlan::Serial,
    }
}

impl ExecutionPlan {
    /// 生成 (程序, 参数)
    pub fn command(&self, serial: &str, parallel: &str, mpirun: &str) -> (String, Vec<String>) {
        match self {
            ExecutionPlan::Serial => (serial.to_string(), Vec::new()),
            ExecutionPlan::Parallel { nprocs } => (
                mpirun.to_string(),
                vec!["-np".to_string(), nprocs.to_string(), parallel.to_string()],
            ),
        }
    }
}
