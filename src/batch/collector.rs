//! # 计算目录收集器
//!
//! 根据输入路径收集 VASP 计算目录（含 INCAR 的目录）。
//!
//! ## 功能
//! - 支持多个输入路径
//! - 可选递归搜索
//! - 跳过 NEB 映像目录 `00..NN`
//!
//! ## 依赖关系
//! - 被 `commands/run.rs`, `commands/status.rs`, `commands/collect.rs` 调用
//! - 使用 `walkdir` 遍历目录

use crate::calculator::files::is_vasp_dir;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 计算目录收集器
pub struct CalcCollector {
    /// 输入路径
    inputs: Vec<PathBuf>,
    /// 是否递归
    recursive: bool,
}

impl CalcCollector {
    /// 创建收集器；没有输入时使用当前目录
    pub fn new(inputs: Vec<PathBuf>) -> Self {
        let inputs = if inputs.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            inputs
        };
        Self {
            inputs,
            recursive: false,
        }
    }

    /// 设置是否递归搜索
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// 收集计算目录（排序、去重）
    pub fn collect(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = Vec::new();

        for input in &self.inputs {
            if !input.is_dir() {
                continue;
            }
            if !self.recursive {
                if is_vasp_dir(input) {
                    dirs.push(input.clone());
                }
                continue;
            }

            let walker = WalkDir::new(input)
                .into_iter()
                .filter_entry(|e| !is_image_dir(e.path()))
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_dir());

            dirs.extend(
                walker
                    .filter(|entry| is_vasp_dir(entry.path()))
                    .map(|e| e.path().to_path_buf()),
            );
        }

        dirs.sort();
        dirs.dedup();
        dirs
    }
}

/// NEB 映像目录：两位数字，且上级目录是计算目录
fn is_image_dir(path: &Path) -> bool {
    let is_numbered = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.len() == 2 && n.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false);
    is_numbered && path.parent().map(is_vasp_dir).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn calc(dir: &Path) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("INCAR"), "ENCUT = 400\n").unwrap();
    }

    #[test]
    fn test_collect_recursive() {
        let root = tempfile::tempdir().unwrap();
        calc(&root.path().join("a"));
        calc(&root.path().join("b/c"));
        calc(&root.path().join("neb"));
        calc(&root.path().join("neb/01"));
        fs::create_dir_all(root.path().join("empty")).unwrap();

        let dirs = CalcCollector::new(vec![root.path().to_path_buf()])
            .recursive(true)
            .collect();
        let names: Vec<_> = dirs
            .iter()
            .map(|d| d.strip_prefix(root.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![PathBuf::from("a"), PathBuf::from("b/c"), PathBuf::from("neb")]
        );
    }

    #[test]
    fn test_collect_flat() {
        let root = tempfile::tempdir().unwrap();
        calc(&root.path().join("a"));
        let inputs = vec![root.path().join("a"), root.path().to_path_buf()];
        let dirs = CalcCollector::new(inputs).collect();
        assert_eq!(dirs, vec![root.path().join("a")]);
    }
}
