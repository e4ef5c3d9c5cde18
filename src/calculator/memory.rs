//! # 内存估计
//!
//! 查找顺序：METADATA 的 `recommended.memory` → 已有 OUTCAR 中的内存行 →
//! 诊断运行（IALGO = -1，串行可执行文件）。诊断运行每 100 ms 检查一次 OUTCAR，
//! 得到估计或超时后终止子进程。

use super::Calculator;
use crate::config::QueueSettings;
use crate::error::{JaspError, Result};
use crate::parsers::outcar::{parse_outcar, parse_outcar_content};
use std::fs;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// METADATA 中的推荐内存 (GB)
pub const MEMORY_KEY: &str = "recommended.memory";

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 诊断运行留下的文件
const DIAGNOSTIC_OUTPUTS: &[&str] = &[
    "CHG", "CHGCAR", "CONTCAR", "DOSCAR", "EIGENVAL", "IBZKPT", "OSZICAR", "PCDAT",
    "vasprun.xml", "OUTCAR", "WAVECAR", "XDATCAR",
];

/// 整个作业的内存请求：`ceil(nodes × ppn × 每核内存)` GB
pub fn mem_request(queue: &QueueSettings, gb_per_process: f64) -> String {
    let total = f64::from(queue.nodes) * f64::from(queue.ppn) * gb_per_process;
    format!("{}GB", total.ceil() as u64)
}

impl Calculator {
    /// 每个进程需要的内存 (GB)
    pub fn required_memory(&mut self) -> Result<f64> {
        if let Some(gb) = self.metadata().get_f64(MEMORY_KEY) {
            debug!("Memory from METADATA: {} GB", gb);
            return Ok(gb);
        }

        let outcar = self.dir().join("OUTCAR");
        if outcar.exists() {
            if let Some(gb) = parse_outcar(&outcar)?.memory_gb {
                self.persist_memory(gb)?;
                return Ok(gb);
            }
        }

        let original = self.config().get_int("ialgo");
        self.set("ialgo", -1)?;
        let written = self.write_config();

        let estimate = written.and_then(|()| {
            let rc = self.rc();
            info!("Running memory probe in {}", self.dir().display());
            probe(self.dir(), &rc.vasp.serial, rc.memory_probe_timeout)
        });

        match original {
            Some(v) => self.set("ialgo", v)?,
            None => {
                self.unset("ialgo")?;
            }
        }
        self.write_incar()?;
        remove_outputs(self.dir());

        let gb = estimate?;
        self.persist_memory(gb)?;
        Ok(gb)
    }

    fn persist_memory(&mut self, gb: f64) -> Result<()> {
        self.metadata_mut().set(MEMORY_KEY, gb);
        let dir = self.dir().to_path_buf();
        self.metadata().write(&dir)
    }
}

/// 运行诊断计算直到 OUTCAR 中出现内存估计
fn probe(dir: &Path, executable: &str, timeout_secs: u64) -> Result<f64> {
    let mut child = Command::new(executable)
        .current_dir(dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => JaspError::CommandNotFound {
                command: executable.to_string(),
            },
            _ => JaspError::CommandFailed {
                command: executable.to_string(),
                stderr: e.to_string(),
            },
        })?;

    let outcar = dir.join("OUTCAR");
    let deadline = Instant::now() + Duration::from_secs(timeout_secs);

    loop {
        if let Some(gb) = read_estimate(&outcar) {
            stop(&mut child);
            return Ok(gb);
        }

        let exited = child.try_wait().map_err(|e| JaspError::CommandFailed {
            command: executable.to_string(),
            stderr: e.to_string(),
        })?;
        if let Some(status) = exited {
            return read_estimate(&outcar).ok_or_else(|| JaspError::CommandFailed {
                command: executable.to_string(),
                stderr: format!("exited ({}) without a memory estimate", status),
            });
        }

        if Instant::now() >= deadline {
            stop(&mut child);
            return Err(JaspError::MemoryEstimateTimeout {
                seconds: timeout_secs,
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn read_estimate(outcar: &Path) -> Option<f64> {
    let bytes = fs::read(outcar).ok()?;
    parse_outcar_content(&String::from_utf8_lossy(&bytes)).memory_gb
}

fn stop(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!("Probe already exited: {}", e);
    }
    let _ = child.wait();
}

fn remove_outputs(dir: &Path) {
    for name in DIAGNOSTIC_OUTPUTS {
        let path = dir.join(name);
        if path.exists() {
            if let Err(e) = fs::remove_file(&path) {
                warn!("Could not remove {}: {}", path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_request_rounds_up() {
        let queue = QueueSettings {
            nodes: 2,
            ppn: 4,
            ..Default::default()
        };
        assert_eq!(mem_request(&queue, 0.3), "3GB");
        assert_eq!(mem_request(&QueueSettings::default(), 1.0), "1GB");
    }

    #[test]
    fn test_remove_outputs_keeps_inputs() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["INCAR", "OUTCAR", "WAVECAR"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        remove_outputs(dir.path());
        assert!(dir.path().join("INCAR").exists());
        assert!(!dir.path().join("OUTCAR").exists());
        assert!(!dir.path().join("WAVECAR").exists());
    }

    #[test]
    fn test_probe_missing_executable() {
        let dir = tempfile::tempdir().unwrap();
        let err = probe(dir.path(), "jasp-no-such-vasp", 1).unwrap_err();
        assert!(matches!(err, JaspError::CommandNotFound { .. }));
    }
}
