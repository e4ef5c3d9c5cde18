//! # VASP KPOINTS 读写
//!
//! 只处理自动网格格式：
//! ```text
//! KPOINTS created by jasp
//! 0
//! Monkhorst-Pack     (或 Gamma)
//! 4 4 4
//! 0 0 0
//! ```
//! 其他格式（显式 k 点列表、能带路径）读取时返回 `None`。

use crate::error::{JaspError, Result};
use crate::models::params::CalculatorConfig;
use std::fs;
use std::path::Path;
use tracing::warn;

/// 自动 k 点网格
#[derive(Debug, Clone, PartialEq)]
pub struct KpointMesh {
    pub divisions: Vec<f64>,
    pub gamma: bool,
}

impl KpointMesh {
    /// 从配置中的 `kpts`/`gamma` 构造，未设置时为 1×1×1
    pub fn from_config(config: &CalculatorConfig) -> Self {
        KpointMesh {
            divisions: config
                .get_list("kpts")
                .map(<[f64]>::to_vec)
                .unwrap_or_else(|| vec![1.0, 1.0, 1.0]),
            gamma: config.get_bool("gamma").unwrap_or(false),
        }
    }

    /// 写回配置
    pub fn apply(&self, config: &mut CalculatorConfig) -> Result<()> {
        config.set("kpts", self.divisions.clone())?;
        config.set("gamma", self.gamma)?;
        Ok(())
    }
}

/// 读取 KPOINTS 文件
pub fn read_kpoints(path: &Path) -> Result<Option<KpointMesh>> {
    let content = fs::read_to_string(path).map_err(|e| JaspError::read(path, e))?;
    parse_kpoints_content(&content).map_err(|reason| JaspError::parse("KPOINTS", path, reason))
}

/// 解析 KPOINTS 内容
pub fn parse_kpoints_content(content: &str) -> std::result::Result<Option<KpointMesh>, String> {
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() < 4 {
        return Err("File too short".to_string());
    }

    let nkpts: i64 = lines[1]
        .split_whitespace()
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| "Invalid k-point count".to_string())?;
    if nkpts != 0 {
        warn!("Explicit k-point lists are not read back");
        return Ok(None);
    }

    let style = lines[2].trim().to_ascii_lowercase();
    let gamma = match style.chars().next() {
        Some('g') => true,
        Some('m') => false,
        _ => {
            warn!("Unsupported KPOINTS style: {}", lines[2].trim());
            return Ok(None);
        }
    };

    let divisions: Vec<f64> = lines[3]
        .split_whitespace()
        .map(|s| s.parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| "Invalid mesh line".to_string())?;
    if divisions.len() != 3 {
        return Err("Mesh must have three divisions".to_string());
    }

    Ok(Some(KpointMesh { divisions, gamma }))
}

/// 写出 KPOINTS 文件
pub fn write_kpoints(path: &Path, mesh: &KpointMesh) -> Result<()> {
    let divisions: Vec<String> = mesh.divisions.iter().map(|x| x.to_string()).collect();
    let content = format!(
        "KPOINTS created by jasp\n0\n{}\n{}\n0 0 0\n",
        if mesh.gamma { "Gamma" } else { "Monkhorst-Pack" },
        divisions.join(" ")
    );
    fs::write(path, content).map_err(|e| JaspError::write(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gamma_mesh() {
        let mesh = parse_kpoints_content("auto\n0\nGamma\n6 6 1\n0 0 0\n")
            .unwrap()
            .unwrap();
        assert!(mesh.gamma);
        assert_eq!(mesh.divisions, vec![6.0, 6.0, 1.0]);
    }

    #[test]
    fn test_explicit_list_not_read() {
        let content = "list\n2\nReciprocal\n0 0 0 1\n0.5 0 0 1\n";
        assert_eq!(parse_kpoints_content(content).unwrap(), None);
    }

    #[test]
    fn test_default_mesh_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("KPOINTS");
        let mesh = KpointMesh::from_config(&CalculatorConfig::new());
        assert_eq!(mesh.divisions, vec![1.0, 1.0, 1.0]);

        write_kpoints(&path, &mesh).unwrap();
        assert_eq!(read_kpoints(&path).unwrap(), Some(mesh));
    }
}
