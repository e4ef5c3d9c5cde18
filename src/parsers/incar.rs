//! # VASP INCAR 读写
//!
//! INCAR 每行 `TAG = value`，`!` 或 `#` 之后为注释，`;` 分隔同一行的多个标签。
//! 读入时按静态参数表决定类型；列表值支持 `N*x` 展开。
//! 未在参数表中的标签记录警告后忽略。
//!
//! `ldau_luj` 字典在写出时展开为 `LDAU/LDAUL/LDAUU/LDAUJ`，
//! 读回时由 `collapse_ldau` 在已知元素顺序的前提下还原。
//!
//! ## 依赖关系
//! - 被 `calculator/` 使用
//! - 使用 `models/params.rs`

use crate::error::{JaspError, Result};
use crate::models::params::{category_of, CalculatorConfig, Category, ParamValue};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::warn;

/// 读取 INCAR 文件
pub fn read_incar(path: &Path) -> Result<CalculatorConfig> {
    let content = fs::read_to_string(path).map_err(|e| JaspError::read(path, e))?;
    parse_incar_content(&content).map_err(|reason| JaspError::parse("INCAR", path, reason))
}

/// 解析 INCAR 内容
pub fn parse_incar_content(content: &str) -> std::result::Result<CalculatorConfig, String> {
    let mut config = CalculatorConfig::new();

    for raw in content.lines() {
        let line = raw.split(['!', '#']).next().unwrap_or("");
        for statement in line.split(';') {
            let Some((key, value)) = statement.split_once('=') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();
            if key.is_empty() {
                continue;
            }

            let Some(category) = category_of(&key) else {
                warn!("Ignoring unknown INCAR tag {}", key.to_uppercase());
                continue;
            };

            let parsed = parse_value(&key, category, value)
                .ok_or_else(|| format!("Cannot parse {} = {}", key.to_uppercase(), value))?;
            config.set(&key, parsed).map_err(|e| e.to_string())?;
        }
    }

    Ok(config)
}

fn parse_value(key: &str, category: Category, value: &str) -> Option<ParamValue> {
    match category {
        Category::Int => parse_int(value).map(ParamValue::Int),
        Category::Float | Category::Expr => parse_float(value).map(ParamValue::Float),
        Category::Str => Some(ParamValue::Str(value.to_string())),
        Category::Bool => parse_bool(value).map(ParamValue::Bool),
        Category::List => parse_list(value).map(ParamValue::List),
        Category::Input if key == "lreal" => Some(
            parse_bool(value)
                .map(ParamValue::Bool)
                .unwrap_or_else(|| ParamValue::Str(value.to_string())),
        ),
        Category::Dict | Category::Input => None,
    }
}

fn parse_int(value: &str) -> Option<i64> {
    let word = value.split_whitespace().next()?;
    word.parse::<i64>().ok().or_else(|| {
        let f = parse_float(word)?;
        (f.fract() == 0.0).then_some(f as i64)
    })
}

/// Fortran 风格浮点数：接受 `1.0d-4`
fn parse_float(value: &str) -> Option<f64> {
    let word = value.split_whitespace().next()?;
    word.replace(['d', 'D'], "e").parse().ok()
}

fn parse_bool(value: &str) -> Option<bool> {
    let v = value.trim().trim_start_matches('.').to_ascii_uppercase();
    if v.starts_with('T') {
        Some(true)
    } else if v.starts_with('F') {
        Some(false)
    } else {
        None
    }
}

/// 解析列表，展开 `N*x`
fn parse_list(value: &str) -> Option<Vec<f64>> {
    let mut out = Vec::new();
    for word in value.split_whitespace() {
        if let Some((n, x)) = word.split_once('*') {
            let n: usize = n.parse().ok()?;
            let x = parse_float(x)?;
            out.extend(std::iter::repeat(x).take(n));
        } else {
            out.push(parse_float(word)?);
        }
    }
    Some(out)
}

/// 格式化 INCAR 中的单个值
fn format_value(category: Category, value: &ParamValue) -> Option<String> {
    let text = match (category, value) {
        (Category::Expr, ParamValue::Float(v)) => format!("{:e}", v),
        (_, ParamValue::Int(v)) => v.to_string(),
        (_, ParamValue::Float(v)) => v.to_string(),
        (_, ParamValue::Bool(v)) => fortran_bool(*v).to_string(),
        (_, ParamValue::Str(v)) => v.clone(),
        (_, ParamValue::List(v)) => v
            .iter()
            .map(|x| x.to_string())
            .collect::<Vec<_>>()
            .join(" "),
        (_, ParamValue::Dict(_)) => return None,
    };
    Some(text)
}

fn fortran_bool(v: bool) -> &'static str {
    if v {
        ".TRUE."
    } else {
        ".FALSE."
    }
}

/// 将配置转换为 INCAR 字符串
///
/// `species` 为 POSCAR 中元素的分组顺序，用于展开 `ldau_luj`。
pub fn to_incar_string(config: &CalculatorConfig, species: &[&str]) -> String {
    let mut out = String::from("INCAR created by jasp\n");

    for category in [
        Category::Int,
        Category::Float,
        Category::Expr,
        Category::Str,
        Category::Bool,
        Category::List,
    ] {
        for (key, value) in config.category(category) {
            if let Some(text) = format_value(category, value) {
                out.push_str(&format!(" {} = {}\n", key.to_uppercase(), text));
            }
        }
    }

    if let Some(lreal) = config.get("lreal") {
        if let Some(text) = format_value(Category::Input, lreal) {
            out.push_str(&format!(" LREAL = {}\n", text));
        }
    }

    if let Some(luj) = config.get("ldau_luj").and_then(ParamValue::as_dict) {
        out.push_str(&expand_ldau(luj, species, config.get("ldau").is_none()));
    }

    out
}

/// 写出 INCAR 文件
pub fn write_incar(path: &Path, config: &CalculatorConfig, species: &[&str]) -> Result<()> {
    fs::write(path, to_incar_string(config, species)).map_err(|e| JaspError::write(path, e))
}

fn luj_entry(entry: &ParamValue, key: &str) -> Option<f64> {
    entry.as_dict()?.get(key)?.as_float()
}

fn expand_ldau(luj: &BTreeMap<String, ParamValue>, species: &[&str], switch_on: bool) -> String {
    let mut l = Vec::new();
    let mut u = Vec::new();
    let mut j = Vec::new();
    for symbol in species {
        let entry = luj.get(*symbol);
        l.push(entry.and_then(|e| luj_entry(e, "L")).unwrap_or(-1.0));
        u.push(entry.and_then(|e| luj_entry(e, "U")).unwrap_or(0.0));
        j.push(entry.and_then(|e| luj_entry(e, "J")).unwrap_or(0.0));
    }

    let join = |v: &[f64]| {
        v.iter()
            .map(|x| x.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    };

    let mut out = String::new();
    if switch_on {
        out.push_str(" LDAU = .TRUE.\n");
    }
    out.push_str(&format!(" LDAUL = {}\n", join(&l)));
    out.push_str(&format!(" LDAUU = {}\n", join(&u)));
    out.push_str(&format!(" LDAUJ = {}\n", join(&j)));
    out
}

/// 把读回的 `LDAU/LDAUL/LDAUU/LDAUJ` 还原为 `ldau_luj` 字典
///
/// 仅当三个列表长度与元素数一致时还原；L = -1 且 U = J = 0 的元素不写入字典。
/// `LDAU = .TRUE.` 由字典隐含，`.FALSE.` 保留。
pub fn collapse_ldau(config: &mut CalculatorConfig, species: &[&str]) -> Result<()> {
    let (Some(l), Some(u), Some(j)) = (
        config.get_list("ldaul").map(<[f64]>::to_vec),
        config.get_list("ldauu").map(<[f64]>::to_vec),
        config.get_list("ldauj").map(<[f64]>::to_vec),
    ) else {
        return Ok(());
    };
    if config.get("ldau_luj").is_some()
        || [l.len(), u.len(), j.len()].iter().any(|&n| n != species.len())
    {
        return Ok(());
    }

    let mut luj = BTreeMap::new();
    for (k, symbol) in species.iter().enumerate() {
        if l[k] == -1.0 && u[k] == 0.0 && j[k] == 0.0 {
            continue;
        }
        let mut entry = BTreeMap::new();
        entry.insert("L".to_string(), ParamValue::Int(l[k] as i64));
        entry.insert("U".to_string(), ParamValue::Float(u[k]));
        entry.insert("J".to_string(), ParamValue::Float(j[k]));
        luj.insert(symbol.to_string(), ParamValue::Dict(entry));
    }

    for key in ["ldaul", "ldauu", "ldauj"] {
        config.unset(key)?;
    }
    config.set("ldau_luj", luj)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_typed_values() {
        let content = "\
SYSTEM = bulk Cu
ENCUT = 350   ! cutoff
ISMEAR = 1; SIGMA = 0.1
EDIFF = 1.0d-5
LWAVE = .FALSE.
MAGMOM = 2*1.5 0.0
LREAL = Auto
# commented = 1
";
        let config = parse_incar_content(content).unwrap();
        assert_eq!(config.get_str("system"), Some("bulk Cu"));
        assert_eq!(config.get_float("encut"), Some(350.0));
        assert_eq!(config.get_int("ismear"), Some(1));
        assert_eq!(config.get_float("sigma"), Some(0.1));
        assert_eq!(config.get_float("ediff"), Some(1e-5));
        assert_eq!(config.get_bool("lwave"), Some(false));
        assert_eq!(config.get_list("magmom"), Some(&[1.5, 1.5, 0.0][..]));
        assert_eq!(config.get_str("lreal"), Some("Auto"));
    }

    #[test]
    fn test_unknown_tags_are_skipped() {
        let config = parse_incar_content("FOOBAR = 3\nNSW = 10\n").unwrap();
        assert_eq!(config.get_int("nsw"), Some(10));
        assert_eq!(config.iter().count(), 1);
    }

    #[test]
    fn test_bad_value_is_an_error() {
        assert!(parse_incar_content("NSW = ten\n").is_err());
    }

    #[test]
    fn test_written_incar_reads_back_equal() {
        let mut config = CalculatorConfig::new();
        config.set("encut", 520.0).unwrap();
        config.set("ediff", 1e-6).unwrap();
        config.set("ibrion", 2).unwrap();
        config.set("prec", "Accurate").unwrap();
        config.set("lcharg", false).unwrap();
        config.set("magmom", vec![0.6, -0.6]).unwrap();
        config.set("lreal", false).unwrap();

        let back = parse_incar_content(&to_incar_string(&config, &[])).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_ldau_expand_and_collapse() {
        let mut u_entry = BTreeMap::new();
        u_entry.insert("L".to_string(), ParamValue::Int(2));
        u_entry.insert("U".to_string(), ParamValue::Float(3.5));
        u_entry.insert("J".to_string(), ParamValue::Float(0.0));
        let mut luj = BTreeMap::new();
        luj.insert("Fe".to_string(), ParamValue::Dict(u_entry));

        let mut config = CalculatorConfig::new();
        config.set("ldau_luj", luj).unwrap();

        let text = to_incar_string(&config, &["Fe", "O"]);
        assert!(text.contains("LDAUL = 2 -1"));
        assert!(text.contains("LDAUU = 3.5 0"));

        let mut back = parse_incar_content(&text).unwrap();
        collapse_ldau(&mut back, &["Fe", "O"]).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_ldau_switch_written_once() {
        let mut entry = BTreeMap::new();
        entry.insert("U".to_string(), ParamValue::Int(4));
        entry.insert("L".to_string(), ParamValue::Int(2));
        let mut luj = BTreeMap::new();
        luj.insert("Cu".to_string(), ParamValue::Dict(entry));

        for ldau in [None, Some(true), Some(false)] {
            let mut config = CalculatorConfig::new();
            if let Some(v) = ldau {
                config.set("ldau", v).unwrap();
            }
            config.set("ldau_luj", luj.clone()).unwrap();

            let text = to_incar_string(&config, &["O", "Cu"]);
            assert_eq!(text.matches(" LDAU =").count(), 1, "{}", text);

            let mut back = parse_incar_content(&text).unwrap();
            collapse_ldau(&mut back, &["O", "Cu"]).unwrap();
            assert_eq!(back, config, "ldau = {:?}", ldau);
        }
    }
}
