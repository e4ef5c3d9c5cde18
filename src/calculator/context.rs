//! # 作用域工作目录
//!
//! 进入计算目录（必要时创建），离开作用域时恢复原工作目录，
//! 无论正常返回还是出错。

use crate::error::{JaspError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 进入目录的守卫；析构时返回原目录
#[derive(Debug)]
pub struct ScopedDir {
    previous: PathBuf,
    current: PathBuf,
}

impl ScopedDir {
    /// 创建并进入目录
    pub fn enter(dir: &Path) -> Result<Self> {
        let previous = std::env::current_dir().map_err(|e| JaspError::read(Path::new("."), e))?;
        let current = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            previous.join(dir)
        };

        std::fs::create_dir_all(&current).map_err(|e| JaspError::write(&current, e))?;
        std::env::set_current_dir(&current).map_err(|e| JaspError::read(&current, e))?;
        debug!("Entered {}", current.display());

        Ok(ScopedDir { previous, current })
    }

    /// 所在目录（绝对路径）
    pub fn path(&self) -> &Path {
        &self.current
    }

    /// 进入前的目录
    pub fn previous(&self) -> &Path {
        &self.previous
    }
}

impl Drop for ScopedDir {
    fn drop(&mut self) {
        if let Err(e) = std::env::set_current_dir(&self.previous) {
            warn!(
                "Could not return to {}: {}",
                self.previous.display(),
                e
            );
        }
    }
}
