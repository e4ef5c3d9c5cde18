//! # 计算目录文件操作
//!
//! - 判断 VASP 目录
//! - 克隆：复制目标中尚不存在的 VASP 文件（含 NEB 映像目录），刷新 METADATA 标识
//! - 清理：删除大而不关键的文件

use crate::error::{JaspError, Result};
use crate::parsers::Metadata;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 克隆时复制的文件
pub const VASP_FILES: &[&str] = &[
    "INCAR", "STOPCAR", "KPOINTS", "POSCAR", "CONTCAR", "POTCAR", "OUTCAR", "OSZICAR",
    "vasprun.xml", "CHG", "CHGCAR", "WAVECAR", "DOSCAR", "EIGENVAL", "IBZKPT", "PCDAT",
    "PROCAR", "XDATCAR", "ase-sort.dat", "METADATA", "vasp.out",
];

/// 默认清理的文件
pub const STRIP_FILES: &[&str] = &["CHG", "CHGCAR", "WAVECAR"];

/// 目录中有 INCAR 即视为 VASP 计算目录
pub fn is_vasp_dir(dir: &Path) -> bool {
    dir.join("INCAR").is_file()
}

/// NEB 映像目录 `0[0-9]`
pub fn image_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = dir.join("0[0-9]");
    let pattern = pattern.to_string_lossy();
    let entries = glob::glob(&pattern)
        .map_err(|e| JaspError::InvalidArgument(format!("invalid pattern {}: {}", pattern, e)))?;

    let mut dirs: Vec<PathBuf> = entries.filter_map(|e| e.ok()).filter(|p| p.is_dir()).collect();
    dirs.sort();
    Ok(dirs)
}

fn copy_missing(src: &Path, dst: &Path) -> Result<usize> {
    fs::create_dir_all(dst).map_err(|e| JaspError::write(dst, e))?;
    let mut copied = 0;
    for name in VASP_FILES {
        let from = src.join(name);
        let to = dst.join(name);
        if from.is_file() && !to.exists() {
            fs::copy(&from, &to).map_err(|e| JaspError::write(&to, e))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// 把 `src` 中的计算复制到 `dst`，返回复制的文件数
pub fn clone_calculation(src: &Path, dst: &Path) -> Result<usize> {
    if !src.is_dir() {
        return Err(JaspError::DirectoryNotFound {
            path: src.display().to_string(),
        });
    }
    if src == dst {
        return Err(JaspError::InvalidArgument(
            "source and destination are the same directory".to_string(),
        ));
    }

    let mut copied = copy_missing(src, dst)?;
    for image in image_dirs(src)? {
        if let Some(name) = image.file_name() {
            copied += copy_missing(&image, &dst.join(name))?;
        }
    }

    let mut metadata = Metadata::read(dst)?;
    metadata.mark_cloned(src);
    metadata.write(dst)?;

    debug!("Cloned {} files from {} to {}", copied, src.display(), dst.display());
    Ok(copied)
}

/// 删除大文件，返回实际删除的路径
pub fn strip_calculation(dir: &Path, extra: &[String]) -> Result<Vec<PathBuf>> {
    let names = STRIP_FILES
        .iter()
        .map(|s| s.to_string())
        .chain(extra.iter().cloned());

    let mut removed = Vec::new();
    for name in names {
        let path = dir.join(&name);
        if path.is_file() {
            fs::remove_file(&path).map_err(|e| JaspError::write(&path, e))?;
            removed.push(path);
        }
    }
    Ok(removed)
}
