//! # 目录状态分类
//!
//! 计算目录的生命周期只记录在文件标记中：`INCAR`, `jobid`, `running`,
//! `CONTCAR`, `OUTCAR`, `vasprun.xml`。每次调用都从磁盘 + 队列查询重新推导状态。
//!
//! ## 优先级
//! | # | 状态 | 条件 |
//! |---|------|------|
//! | 1 | NebInit | 调用方提供多映像结构和弹簧常数 |
//! | 2 | Empty | 无 INCAR |
//! | 3 | Initialized | 有 INCAR，无 jobid，无 CONTCAR |
//! | 4 | QueuedNotRunning | 有 jobid，在队列中，无 running |
//! | 5 | QueuedRunning | 有 jobid，在队列中，有 running |
//! | 6 | JustFinished | 有 jobid，不在队列中，无 running |
//! | 7 | LongDone | 无 jobid，无 running，CONTCAR + OUTCAR + vasprun.xml |
//! | 8 | 无法识别 | 以上均不满足 |

use crate::queue::{script::RUNNING_FILE, QueueStatus, JOBID_FILE};
use std::fmt;
use std::path::Path;

/// 目录生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectoryState {
    NebInit,
    Empty,
    Initialized,
    QueuedNotRunning,
    QueuedRunning,
    JustFinished,
    LongDone,
}

impl DirectoryState {
    /// 结果文件是否可读
    pub fn has_results(self) -> bool {
        matches!(
            self,
            DirectoryState::QueuedRunning | DirectoryState::JustFinished | DirectoryState::LongDone
        )
    }

    /// 作业是否仍在队列中
    pub fn in_queue(self) -> bool {
        matches!(
            self,
            DirectoryState::QueuedNotRunning | DirectoryState::QueuedRunning
        )
    }
}

impl fmt::Display for DirectoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DirectoryState::NebInit => "neb-init",
            DirectoryState::Empty => "empty",
            DirectoryState::Initialized => "initialized",
            DirectoryState::QueuedNotRunning => "queued",
            DirectoryState::QueuedRunning => "running",
            DirectoryState::JustFinished => "just-finished",
            DirectoryState::LongDone => "done",
        };
        write!(f, "{}", label)
    }
}

/// 目录中的文件标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Markers {
    pub incar: bool,
    pub jobid: bool,
    pub running: bool,
    pub contcar: bool,
    pub outcar: bool,
    pub vasprun: bool,
    /// 队列查询结果；只在有 jobid 时才查询
    pub queue_status: Option<QueueStatus>,
}

impl Markers {
    /// 扫描目录（不查询队列）
    pub fn scan(dir: &Path) -> Self {
        let exists = |name: &str| dir.join(name).exists();
        Markers {
            incar: exists("INCAR"),
            jobid: exists(JOBID_FILE),
            running: exists(RUNNING_FILE),
            contcar: exists("CONTCAR"),
            outcar: exists("OUTCAR"),
            vasprun: exists("vasprun.xml"),
            queue_status: None,
        }
    }

    /// 分类是否需要队列查询结果
    pub fn needs_probe(&self) -> bool {
        self.incar && self.jobid
    }

    /// 调度器报告作业仍在队列中
    pub fn queued(&self) -> bool {
        self.queue_status.is_some_and(QueueStatus::in_queue)
    }

    /// 完整结果文件齐全
    pub fn has_results(&self) -> bool {
        self.contcar && self.outcar && self.vasprun
    }
}

/// 按优先级分类；无法识别时返回 None
pub fn classify(markers: &Markers, neb_requested: bool) -> Option<DirectoryState> {
    if neb_requested {
        return Some(DirectoryState::NebInit);
    }

    let m = markers;
    let queued = m.queued();

    let state = if !m.incar {
        DirectoryState::Empty
    } else if !m.jobid && !m.contcar {
        DirectoryState::Initialized
    } else if m.jobid && queued && !m.running {
        DirectoryState::QueuedNotRunning
    } else if m.jobid && queued && m.running {
        DirectoryState::QueuedRunning
    } else if m.jobid && !queued && !m.running {
        DirectoryState::JustFinished
    } else if !m.jobid && !m.running && m.has_results() {
        DirectoryState::LongDone
    } else {
        return None;
    };

    Some(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers(incar: bool, jobid: bool, running: bool, results: bool, queued: bool) -> Markers {
        Markers {
            incar,
            jobid,
            running,
            contcar: results,
            outcar: results,
            vasprun: results,
            queue_status: (incar && jobid).then_some(if queued {
                QueueStatus::Queued
            } else {
                QueueStatus::NotQueued
            }),
        }
    }

    #[test]
    fn test_every_combination_has_one_outcome() {
        use DirectoryState::*;

        for bits in 0u8..32 {
            let b = |k: u8| bits & (1 << k) != 0;
            let (incar, jobid, running, results, queued) = (b(0), b(1), b(2), b(3), b(4));
            let m = markers(incar, jobid, running, results, queued);

            let expected = if !incar {
                Some(Empty)
            } else if !jobid && !results {
                Some(Initialized)
            } else if jobid && queued {
                Some(if running { QueuedRunning } else { QueuedNotRunning })
            } else if jobid && !running {
                Some(JustFinished)
            } else if !jobid && !running {
                Some(LongDone)
            } else {
                None
            };

            assert_eq!(classify(&m, false), expected, "combination {:05b}", bits);
            assert_eq!(classify(&m, true), Some(NebInit));
        }
    }

    #[test]
    fn test_running_without_job_is_unknown() {
        let m = markers(true, false, true, true, false);
        assert_eq!(classify(&m, false), None);
    }

    #[test]
    fn test_partial_results_are_unknown() {
        let mut m = markers(true, false, false, true, false);
        m.vasprun = false;
        assert_eq!(classify(&m, false), None);
    }

    #[test]
    fn test_scan_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("INCAR"), "").unwrap();
        std::fs::write(dir.path().join(JOBID_FILE), "1").unwrap();
        let m = Markers::scan(dir.path());
        assert!(m.incar && m.jobid && m.needs_probe());
        assert!(!m.running && !m.has_results());
        assert_eq!(m.queue_status, None);
    }
}
