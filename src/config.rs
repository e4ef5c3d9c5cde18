//! # jasprc 配置
//!
//! 控制运行方式（排队 / 立即运行 / 禁止运行）、作业调度器与资源请求、
//! VASP 可执行文件、赝势路径等。
//!
//! ## 查找顺序
//! 1. 环境变量 `JASPRC` 指定的文件
//! 2. 当前目录的 `.jasprc.yaml`
//! 3. 用户主目录的 `.jasprc.yaml`
//!
//! 都不存在时使用内置默认值。命令行的 `--mode`/`--scheduler` 覆盖文件中的值。
//!
//! ## 依赖关系
//! - 被 `calculator/`, `queue/`, `commands/` 使用
//! - 使用 `error.rs`

use crate::error::{JaspError, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const RC_FILE_NAME: &str = ".jasprc.yaml";

/// 需要计算时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Submit a batch job
    Queue,
    /// Run VASP immediately in this process
    Run,
    /// Never run; report that a calculation is needed
    None,
}

/// 作业调度器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum Scheduler {
    /// PBS / Torque (qsub, qstat, qselect)
    Pbs,
    /// Sun Grid Engine (qsub, qstat)
    Sge,
}

impl std::fmt::Display for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scheduler::Pbs => write!(f, "PBS"),
            Scheduler::Sge => write!(f, "SGE"),
        }
    }
}

/// VASP 可执行文件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaspExecutables {
    pub serial: String,
    pub parallel: String,
    /// MPI 启动器
    pub mpirun: String,
}

impl Default for VaspExecutables {
    fn default() -> Self {
        VaspExecutables {
            serial: "vasp_std".to_string(),
            parallel: "vasp_std".to_string(),
            mpirun: "mpirun".to_string(),
        }
    }
}

/// 队列资源请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// 提交命令
    pub command: String,
    /// 附加到提交命令的选项（空白分隔）
    pub options: String,
    pub walltime: String,
    pub nodes: u32,
    pub ppn: u32,
    /// 内存请求，如 "2GB"
    pub mem: String,
    pub shell: String,
    /// SGE 队列名
    pub q: Option<String>,
    /// SGE 并行环境
    pub pe: String,
    /// SGE 槽数
    pub nprocs: u32,
}

impl Default for QueueSettings {
    fn default() -> Self {
        QueueSettings {
            command: "qsub".to_string(),
            options: "-joe".to_string(),
            walltime: "168:00:00".to_string(),
            nodes: 1,
            ppn: 1,
            mem: "2GB".to_string(),
            shell: "bash".to_string(),
            q: None,
            pe: "smp".to_string(),
            nprocs: 1,
        }
    }
}

/// jasp 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JaspRc {
    pub vasp: VaspExecutables,
    pub mode: RunMode,
    pub scheduler: Scheduler,
    pub queue: QueueSettings,
    /// 作业脚本中加载的环境模块
    pub module: Option<String>,
    /// 一个节点上多个独立任务时，每个任务使用的核数
    pub cores_per_process: Option<u32>,
    /// 未收敛时是否重新计算；为 false 时报告 NotConverged
    pub restart_unconverged: bool,
    /// 作业脚本中执行计算的命令
    pub run_command: String,
    /// 赝势库根目录；未设置时使用 `VASP_PP_PATH`
    pub pp_path: Option<PathBuf>,
    /// 内存估计探针的超时 (s)
    pub memory_probe_timeout: u64,
}

impl Default for JaspRc {
    fn default() -> Self {
        JaspRc {
            vasp: VaspExecutables::default(),
            mode: RunMode::Queue,
            scheduler: Scheduler::Pbs,
            queue: QueueSettings::default(),
            module: None,
            cores_per_process: None,
            restart_unconverged: true,
            run_command: "jasp exec".to_string(),
            pp_path: None,
            memory_probe_timeout: 20,
        }
    }
}

impl JaspRc {
    /// 按查找顺序加载配置
    pub fn load() -> Result<Self> {
        match Self::locate() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No jasprc found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// 查找配置文件
    pub fn locate() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os("JASPRC") {
            return Some(PathBuf::from(path));
        }

        let local = PathBuf::from(RC_FILE_NAME);
        if local.exists() {
            return Some(local);
        }

        dirs::home_dir()
            .map(|home| home.join(RC_FILE_NAME))
            .filter(|p| p.exists())
    }

    /// 从指定文件加载
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| JaspError::read(path, e))?;
        let rc: JaspRc = serde_yaml_ng::from_str(&content)?;
        rc.validate()?;
        debug!("Loaded jasprc from {}", path.display());
        Ok(rc)
    }

    fn validate(&self) -> Result<()> {
        if self.queue.nodes == 0 || self.queue.ppn == 0 {
            return Err(JaspError::ConfigError(
                "queue.nodes and queue.ppn must be positive".to_string(),
            ));
        }
        if self.cores_per_process == Some(0) {
            return Err(JaspError::ConfigError(
                "cores_per_process must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// 赝势搜索路径
    pub fn pp_search_path(&self) -> Vec<PathBuf> {
        if let Some(path) = &self.pp_path {
            return vec![path.clone()];
        }
        std::env::var_os("VASP_PP_PATH")
            .map(|v| std::env::split_paths(&v).collect())
            .unwrap_or_default()
    }
}
