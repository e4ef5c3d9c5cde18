//! # 赝势查找
//!
//! 赝势库布局：`<root>/<potpaw 目录>/<元素><setup>/POTCAR`
//!
//! | xc | 目录 |
//! |----|------|
//! | PBE | `potpaw_PBE` |
//! | PW91 | `potpaw_GGA` |
//! | LDA | `potpaw` |

use crate::error::{JaspError, Result};
use crate::models::CalculatorConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 未设置 `xc` 时使用的泛函
pub const DEFAULT_XC: &str = "PBE";

/// 泛函对应的赝势目录
pub fn library_dir(xc: &str) -> Result<&'static str> {
    match xc.to_uppercase().as_str() {
        "PBE" => Ok("potpaw_PBE"),
        "PW91" | "GGA" => Ok("potpaw_GGA"),
        "LDA" => Ok("potpaw"),
        other => Err(JaspError::InvalidParameter {
            name: "xc".to_string(),
            reason: format!("no pseudopotential library for '{}'", other),
        }),
    }
}

/// 在搜索路径中查找一个元素的 POTCAR
pub fn locate(symbol: &str, setup: &str, xc: &str, search: &[PathBuf]) -> Result<PathBuf> {
    let relative = Path::new(library_dir(xc)?)
        .join(format!("{}{}", symbol, setup))
        .join("POTCAR");

    for root in search {
        let candidate = root.join(&relative);
        if candidate.is_file() {
            debug!("{} -> {}", symbol, candidate.display());
            return Ok(candidate);
        }
    }

    Err(JaspError::MissingPseudopotential {
        symbol: symbol.to_string(),
        name: relative.display().to_string(),
    })
}

/// 按 POSCAR 元素顺序查找全部 POTCAR；`setups` 指定元素的后缀（如 `_pv`）
pub fn locate_all(
    species: &[String],
    config: &CalculatorConfig,
    search: &[PathBuf],
) -> Result<Vec<PathBuf>> {
    let xc = config.get_str("xc").unwrap_or(DEFAULT_XC);
    let setups = config.get("setups").and_then(|v| v.as_dict());

    species
        .iter()
        .map(|symbol| {
            let setup = setups
                .and_then(|s| s.get(symbol))
                .and_then(|v| v.as_str())
                .unwrap_or("");
            locate(symbol, setup, xc, search)
        })
        .collect()
}
