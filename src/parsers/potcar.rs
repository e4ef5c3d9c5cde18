//! # VASP POTCAR 文件
//!
//! 从 POTCAR 读取交换关联泛函、元素顺序和价电子数（ZVAL），以及拼接多个赝势文件。
//! 赝势的查找见 `calculator/potcar.rs`。

use crate::error::{JaspError, Result};
use std::fs;
use std::path::Path;

/// 从首行推断交换关联泛函
///
/// `PAW_PBE Si 05Jan2001` → PBE，`PAW_GGA` → PW91，`PAW Si` → LDA
pub fn xc_from_header(first_line: &str) -> Option<String> {
    let tag = first_line.split_whitespace().next()?;
    let xc = match tag {
        t if t.ends_with("_PBE") => "PBE",
        t if t.ends_with("_GGA") => "PW91",
        "PAW" | "US" => "LDA",
        _ => return None,
    };
    Some(xc.to_string())
}

/// POTCAR 的摘要信息
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PotcarInfo {
    pub xc: Option<String>,
    /// 按文件顺序的元素符号
    pub symbols: Vec<String>,
    /// 与 `symbols` 对应的价电子数
    pub zvals: Vec<f64>,
}

impl PotcarInfo {
    /// 某元素的价电子数
    pub fn zval(&self, symbol: &str) -> Option<f64> {
        let k = self.symbols.iter().position(|s| s == symbol)?;
        self.zvals.get(k).copied()
    }
}

/// 读取 POTCAR
pub fn read_potcar(path: &Path) -> Result<PotcarInfo> {
    let content = fs::read_to_string(path).map_err(|e| JaspError::read(path, e))?;
    Ok(parse_potcar_content(&content))
}

/// `   POMASS =   55.847; ZVAL   =    8.000    mass and valenz`
fn parse_zval(line: &str) -> Option<f64> {
    let (_, rest) = line.split_once("ZVAL")?;
    let rest = rest.trim_start().strip_prefix('=')?;
    rest.split_whitespace().next()?.parse().ok()
}

/// 解析 POTCAR 内容：首行给出泛函，`TITEL` 行给出元素，`ZVAL` 给出价电子数
pub fn parse_potcar_content(content: &str) -> PotcarInfo {
    let xc = content.lines().next().and_then(xc_from_header);
    let symbols = content
        .lines()
        .filter(|l| l.trim_start().starts_with("TITEL"))
        .filter_map(|l| l.split_whitespace().nth(3))
        .map(|s| s.split('_').next().unwrap_or(s).to_string())
        .collect();
    let zvals = content.lines().filter_map(parse_zval).collect();
    PotcarInfo { xc, symbols, zvals }
}

/// 依次拼接赝势文件写出 POTCAR
pub fn write_potcar(path: &Path, sources: &[impl AsRef<Path>]) -> Result<()> {
    let mut content = String::new();
    for src in sources {
        let src = src.as_ref();
        content.push_str(&fs::read_to_string(src).map_err(|e| JaspError::read(src, e))?);
    }
    fs::write(path, content).map_err(|e| JaspError::write(path, e))
}
