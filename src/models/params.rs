//! # VASP 参数模型
//!
//! 计算参数按类别分区存储：整数、浮点、表达式、字符串、布尔、列表、字典、
//! 特殊输入。每个参数名只属于一个类别，由静态表 `category_of` 决定，
//! 未知参数在构建配置时即报错。
//!
//! 数值列表统一存为 `Vec<f64>`，因此 `(4, 4, 4)` 与 `[4, 4, 4]` 按值相等。
//!
//! ## 依赖关系
//! - 被 `parsers/incar.rs`, `parsers/kpoints.rs`, `calculator/` 使用
//! - 使用 `error.rs`

use crate::error::{JaspError, Result};

use std::collections::BTreeMap;
use std::fmt;

/// 参数类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Int,
    Float,
    Expr,
    Str,
    Bool,
    List,
    Dict,
    Input,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Int,
        Category::Float,
        Category::Expr,
        Category::Str,
        Category::Bool,
        Category::List,
        Category::Dict,
        Category::Input,
    ];

    fn keys(self) -> &'static [&'static str] {
        match self {
            Category::Int => INT_KEYS,
            Category::Float => FLOAT_KEYS,
            Category::Expr => EXPR_KEYS,
            Category::Str => STRING_KEYS,
            Category::Bool => BOOL_KEYS,
            Category::List => LIST_KEYS,
            Category::Dict => DICT_KEYS,
            Category::Input => INPUT_KEYS,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Int => "integer",
            Category::Float => "float",
            Category::Expr => "expression",
            Category::Str => "string",
            Category::Bool => "boolean",
            Category::List => "list",
            Category::Dict => "dict",
            Category::Input => "special input",
        };
        write!(f, "{}", name)
    }
}

// ─────────────────────────────────────────────────────────────
// 静态参数表
// ─────────────────────────────────────────────────────────────

const INT_KEYS: &[&str] = &[
    "snl", "isym", "maxmix", "fnmin", "ispin", "nbands", "ngzf", "ichain", "ismear", "vdwgr",
    "ngxf", "nelm", "nelmin", "istart", "nupdown", "nwrite", "ialgo", "voskown", "icharg",
    "nfree", "nblk", "lorbit", "nsw", "ngx", "ngy", "ngz", "nelmdl", "iniwav", "nkredx",
    "nkredy", "nkredz", "nbmod", "ibrion", "ngyf", "npar", "iwavpr", "nkred", "lbfgsmem",
    "idipol", "ldautype", "nsim", "isif", "lmaxmix", "ldauprint", "iopt", "smass", "vdwrn",
    "images", "ncore", "kpar",
];

const FLOAT_KEYS: &[&str] = &[
    "emax", "falphadec", "encut", "enaug", "timestep", "maxmove", "ebreak", "nelect", "bmix",
    "sdr", "invcurve", "ddr", "hfscreen", "ftimeinc", "dfnmax", "sdalpha", "pomass", "jacobian",
    "zab_vdw", "param2", "amix_mag", "aexx", "encutfock", "aggac", "ftimemax", "aldac",
    "drotmax", "zval", "deper", "bmix_mag", "aggax", "stol", "amin", "emin", "falpha", "weimin",
    "ftimedec", "dfnmin", "amix", "param1", "time", "sigma", "potim", "spring", "tebeg",
    "teend",
];

const EXPR_KEYS: &[&str] = &["ediff", "symprec", "ediffg", "fdstep"];

const STRING_KEYS: &[&str] = &["prec", "system", "gga", "algo"];

const BOOL_KEYS: &[&str] = &[
    "lcorr", "lclimb", "lcharg", "lnebcell", "lplane", "lhfcalc", "lasync", "lvdw",
    "ltangentold", "ldau", "lsepb", "ldneb", "lsepk", "lasph", "addgrid", "ldiag", "lelf",
    "loptics", "luse_vdw", "lglobal", "ldipol", "lvhar", "lvtot", "lscalu", "llineopt", "lpard",
    "lthomas", "lwave", "lscalapack", "laechg",
];

const LIST_KEYS: &[&str] = &[
    "magmom", "ropt", "kpuse", "eint", "ferdo", "ldaul", "ldauj", "iband", "ldauu", "ferwe",
    "rwigs", "dipol",
];

const DICT_KEYS: &[&str] = &["ldau_luj"];

/// 特殊输入：不（全部）直接写入 INCAR 的参数
const INPUT_KEYS: &[&str] = &["xc", "kpts", "gamma", "setups", "txt", "lreal"];

/// 变更检测中无法比较、始终视为未变化的特殊输入参数
pub const INCOMPARABLE_KEYS: &[&str] = &["setups", "txt"];

/// 查找参数所属类别（不区分大小写）
pub fn category_of(name: &str) -> Option<Category> {
    let name = name.to_ascii_lowercase();
    Category::ALL
        .into_iter()
        .find(|c| c.keys().contains(&name.as_str()))
}

// ─────────────────────────────────────────────────────────────
// 参数值
// ─────────────────────────────────────────────────────────────

/// 带类型标签的参数值
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    List(Vec<f64>),
    Dict(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[f64]> {
        match self {
            ParamValue::List(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<String, ParamValue>> {
        match self {
            ParamValue::Dict(v) => Some(v),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ParamValue::Int(_) => "integer",
            ParamValue::Float(_) => "float",
            ParamValue::Bool(_) => "boolean",
            ParamValue::Str(_) => "string",
            ParamValue::List(_) => "list",
            ParamValue::Dict(_) => "dict",
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Str(v) => write!(f, "{}", v),
            ParamValue::List(v) => {
                let items: Vec<String> = v.iter().map(|x| x.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
            ParamValue::Dict(v) => {
                let items: Vec<String> = v.iter().map(|(k, x)| format!("{}: {}", k, x)).collect();
                write!(f, "{{{}}}", items.join(", "))
            }
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(v: Vec<f64>) -> Self {
        ParamValue::List(v)
    }
}

impl From<Vec<i64>> for ParamValue {
    fn from(v: Vec<i64>) -> Self {
        ParamValue::List(v.into_iter().map(|x| x as f64).collect())
    }
}

impl<const N: usize> From<[i64; N]> for ParamValue {
    fn from(v: [i64; N]) -> Self {
        ParamValue::List(v.iter().map(|&x| x as f64).collect())
    }
}

impl<const N: usize> From<[f64; N]> for ParamValue {
    fn from(v: [f64; N]) -> Self {
        ParamValue::List(v.to_vec())
    }
}

impl From<BTreeMap<String, ParamValue>> for ParamValue {
    fn from(v: BTreeMap<String, ParamValue>) -> Self {
        ParamValue::Dict(v)
    }
}

/// 按类别把值转换成规范形式
fn coerce(name: &str, category: Category, value: ParamValue) -> Result<ParamValue> {
    let mismatch = |value: &ParamValue| JaspError::InvalidParameter {
        name: name.to_string(),
        reason: format!("expected {} value, got {}", category, value.kind()),
    };

    match (category, value) {
        (Category::Int, ParamValue::Int(v)) => Ok(ParamValue::Int(v)),
        (Category::Float | Category::Expr, ParamValue::Int(v)) => Ok(ParamValue::Float(v as f64)),
        (Category::Float | Category::Expr, ParamValue::Float(v)) => Ok(ParamValue::Float(v)),
        (Category::Str, ParamValue::Str(v)) => Ok(ParamValue::Str(v)),
        (Category::Bool, ParamValue::Bool(v)) => Ok(ParamValue::Bool(v)),
        (Category::List, ParamValue::List(v)) => Ok(ParamValue::List(v)),
        (Category::Dict, ParamValue::Dict(v)) if name == "ldau_luj" => canonical_luj(v),
        (Category::Dict, ParamValue::Dict(v)) => Ok(ParamValue::Dict(v)),
        (Category::Input, value) => coerce_input(name, value),
        (_, value) => Err(mismatch(&value)),
    }
}

/// `ldau_luj` 的规范形式：键大写，L 为整数，U/J 为浮点，缺省项补齐
///
/// 与 `L = -1, U = J = 0` 等价的元素写入 INCAR 后无法区分，直接丢弃。
fn canonical_luj(luj: BTreeMap<String, ParamValue>) -> Result<ParamValue> {
    let invalid = |symbol: &str, reason: &str| JaspError::InvalidParameter {
        name: "ldau_luj".to_string(),
        reason: format!("{}: {}", symbol, reason),
    };

    let mut out = BTreeMap::new();
    for (symbol, entry) in luj {
        let ParamValue::Dict(entry) = entry else {
            return Err(invalid(&symbol, "expected a dict with L, U and J"));
        };

        let mut l = -1;
        let mut u = 0.0;
        let mut j = 0.0;
        for (key, value) in entry {
            match (key.to_ascii_uppercase().as_str(), value) {
                ("L", ParamValue::Int(v)) => l = v,
                ("L", ParamValue::Float(v)) if v.fract() == 0.0 => l = v as i64,
                ("U", v) => u = v.as_float().ok_or_else(|| invalid(&symbol, "U must be a number"))?,
                ("J", v) => j = v.as_float().ok_or_else(|| invalid(&symbol, "J must be a number"))?,
                (other, _) => {
                    return Err(invalid(&symbol, &format!("bad entry {}", other)));
                }
            }
        }
        if l == -1 && u == 0.0 && j == 0.0 {
            continue;
        }

        let mut canonical = BTreeMap::new();
        canonical.insert("L".to_string(), ParamValue::Int(l));
        canonical.insert("U".to_string(), ParamValue::Float(u));
        canonical.insert("J".to_string(), ParamValue::Float(j));
        out.insert(symbol, ParamValue::Dict(canonical));
    }
    Ok(ParamValue::Dict(out))
}

fn coerce_input(name: &str, value: ParamValue) -> Result<ParamValue> {
    let ok = match (name, &value) {
        ("kpts", ParamValue::List(_)) => true,
        ("xc" | "txt", ParamValue::Str(_)) => true,
        ("gamma", ParamValue::Bool(_)) => true,
        ("setups", ParamValue::Dict(_)) => true,
        ("lreal", ParamValue::Bool(_) | ParamValue::Str(_)) => true,
        _ => false,
    };

    if !ok {
        return Err(JaspError::InvalidParameter {
            name: name.to_string(),
            reason: format!("unsupported {} value", value.kind()),
        });
    }

    match value {
        ParamValue::Str(s) if name == "xc" => Ok(ParamValue::Str(s.to_ascii_uppercase())),
        other => Ok(other),
    }
}

// ─────────────────────────────────────────────────────────────
// 计算配置
// ─────────────────────────────────────────────────────────────

/// 单个类别的参数映射
pub type ParamMap = BTreeMap<String, ParamValue>;

/// 计算配置：按类别分区的参数映射。未设置的参数不出现在映射中。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalculatorConfig {
    int_params: ParamMap,
    float_params: ParamMap,
    exp_params: ParamMap,
    string_params: ParamMap,
    bool_params: ParamMap,
    list_params: ParamMap,
    dict_params: ParamMap,
    input_params: ParamMap,
}

impl CalculatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取某个类别的参数映射
    pub fn category(&self, category: Category) -> &ParamMap {
        match category {
            Category::Int => &self.int_params,
            Category::Float => &self.float_params,
            Category::Expr => &self.exp_params,
            Category::Str => &self.string_params,
            Category::Bool => &self.bool_params,
            Category::List => &self.list_params,
            Category::Dict => &self.dict_params,
            Category::Input => &self.input_params,
        }
    }

    fn category_mut(&mut self, category: Category) -> &mut ParamMap {
        match category {
            Category::Int => &mut self.int_params,
            Category::Float => &mut self.float_params,
            Category::Expr => &mut self.exp_params,
            Category::Str => &mut self.string_params,
            Category::Bool => &mut self.bool_params,
            Category::List => &mut self.list_params,
            Category::Dict => &mut self.dict_params,
            Category::Input => &mut self.input_params,
        }
    }

    /// 设置参数；未知参数或类型不符时报错
    pub fn set(&mut self, name: &str, value: impl Into<ParamValue>) -> Result<()> {
        let key = name.to_ascii_lowercase();
        let category =
            category_of(&key).ok_or_else(|| JaspError::UnknownParameter(name.to_string()))?;
        let value = coerce(&key, category, value.into())?;
        self.category_mut(category).insert(key, value);
        self.drop_implied_ldau();
        Ok(())
    }

    /// 批量设置
    pub fn set_all<I, K>(&mut self, params: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, ParamValue)>,
        K: AsRef<str>,
    {
        for (name, value) in params {
            self.set(name.as_ref(), value)?;
        }
        Ok(())
    }

    /// 删除参数（恢复为未设置）
    pub fn unset(&mut self, name: &str) -> Result<Option<ParamValue>> {
        let key = name.to_ascii_lowercase();
        let category =
            category_of(&key).ok_or_else(|| JaspError::UnknownParameter(name.to_string()))?;
        Ok(self.category_mut(category).remove(&key))
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        let key = name.to_ascii_lowercase();
        category_of(&key).and_then(|c| self.category(c).get(&key))
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ParamValue::as_int)
    }

    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(ParamValue::as_float)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(ParamValue::as_bool)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ParamValue::as_str)
    }

    pub fn get_list(&self, name: &str) -> Option<&[f64]> {
        self.get(name).and_then(ParamValue::as_list)
    }

    /// 用另一配置的所有参数覆盖本配置
    pub fn update_from(&mut self, other: &CalculatorConfig) {
        for category in Category::ALL {
            let src = other.category(category).clone();
            self.category_mut(category).extend(src);
        }
        self.drop_implied_ldau();
    }

    /// 有 `ldau_luj` 时 `ldau = true` 是隐含的，写出的 INCAR 也读不回它
    fn drop_implied_ldau(&mut self) {
        if self.dict_params.contains_key("ldau_luj")
            && self.bool_params.get("ldau") == Some(&ParamValue::Bool(true))
        {
            self.bool_params.remove("ldau");
        }
    }

    /// 按类别顺序遍历所有已设置参数
    pub fn iter(&self) -> impl Iterator<Item = (Category, &str, &ParamValue)> {
        Category::ALL.into_iter().flat_map(move |c| {
            self.category(c)
                .iter()
                .map(move |(k, v)| (c, k.as_str(), v))
        })
    }

    pub fn is_empty(&self) -> bool {
        Category::ALL.iter().all(|c| self.category(*c).is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_are_disjoint() {
        for (i, a) in Category::ALL.iter().enumerate() {
            for b in Category::ALL.iter().skip(i + 1) {
                for key in a.keys() {
                    assert!(!b.keys().contains(key), "{} is in {} and {}", key, a, b);
                }
            }
        }
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let mut config = CalculatorConfig::new();
        let err = config.set("encutt", 400.0).unwrap_err();
        assert!(matches!(err, JaspError::UnknownParameter(_)));
    }

    #[test]
    fn test_int_coerced_into_float_category() {
        let mut config = CalculatorConfig::new();
        config.set("ENCUT", 400).unwrap();
        config.set("ediff", 1).unwrap();
        assert_eq!(config.get("encut"), Some(&ParamValue::Float(400.0)));
        assert_eq!(config.category(Category::Expr).len(), 1);
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let mut config = CalculatorConfig::new();
        assert!(config.set("nsw", 1.5).is_err());
        assert!(config.set("lwave", "yes").is_err());
        assert!(config.set("kpts", "4 4 4").is_err());
    }

    #[test]
    fn test_kpts_tuple_and_vec_equal() {
        let mut a = CalculatorConfig::new();
        let mut b = CalculatorConfig::new();
        a.set("kpts", [4i64, 4, 4]).unwrap();
        b.set("kpts", vec![4.0, 4.0, 4.0]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_xc_normalised() {
        let mut config = CalculatorConfig::new();
        config.set("xc", "pbe").unwrap();
        assert_eq!(config.get_str("xc"), Some("PBE"));
    }

    #[test]
    fn test_clone_is_independent() {
        let mut config = CalculatorConfig::new();
        config.set("magmom", vec![1.0, 2.0]).unwrap();
        let snapshot = config.clone();
        config.set("magmom", vec![3.0]).unwrap();
        assert_eq!(snapshot.get_list("magmom"), Some(&[1.0, 2.0][..]));
    }

    fn luj(entries: &[(&str, &str, ParamValue)]) -> BTreeMap<String, ParamValue> {
        let mut out: BTreeMap<String, ParamValue> = BTreeMap::new();
        for (symbol, key, value) in entries {
            let entry = out
                .entry(symbol.to_string())
                .or_insert_with(|| ParamValue::Dict(BTreeMap::new()));
            if let ParamValue::Dict(map) = entry {
                map.insert(key.to_string(), value.clone());
            }
        }
        out
    }

    #[test]
    fn test_ldau_luj_compared_numerically() {
        let mut a = CalculatorConfig::new();
        let mut b = CalculatorConfig::new();
        a.set(
            "ldau_luj",
            luj(&[
                ("Cu", "L", ParamValue::Int(2)),
                ("Cu", "U", ParamValue::Int(4)),
                ("Cu", "J", ParamValue::Int(0)),
            ]),
        )
        .unwrap();
        b.set(
            "ldau_luj",
            luj(&[
                ("Cu", "l", ParamValue::Float(2.0)),
                ("Cu", "u", ParamValue::Float(4.0)),
            ]),
        )
        .unwrap();
        assert_eq!(a, b);

        let entry = a.get("ldau_luj").and_then(ParamValue::as_dict).unwrap()["Cu"].clone();
        assert_eq!(entry.as_dict().unwrap()["U"], ParamValue::Float(4.0));
        assert_eq!(entry.as_dict().unwrap()["L"], ParamValue::Int(2));
    }

    #[test]
    fn test_ldau_luj_drops_inert_entries_and_rejects_garbage() {
        let mut config = CalculatorConfig::new();
        config
            .set(
                "ldau_luj",
                luj(&[
                    ("O", "L", ParamValue::Int(-1)),
                    ("Cu", "L", ParamValue::Int(2)),
                    ("Cu", "U", ParamValue::Float(4.0)),
                ]),
            )
            .unwrap();
        let dict = config.get("ldau_luj").and_then(ParamValue::as_dict).unwrap();
        assert!(!dict.contains_key("O"));
        assert!(dict.contains_key("Cu"));

        let bad = luj(&[("Cu", "U", ParamValue::Str("big".into()))]);
        assert!(config.set("ldau_luj", bad).is_err());
        let mut flat = BTreeMap::new();
        flat.insert("Cu".to_string(), ParamValue::Float(4.0));
        assert!(config.set("ldau_luj", flat).is_err());
    }

    #[test]
    fn test_ldau_true_is_implied_by_luj() {
        let mut config = CalculatorConfig::new();
        config.set("ldau", true).unwrap();
        config
            .set("ldau_luj", luj(&[("Cu", "U", ParamValue::Float(4.0))]))
            .unwrap();
        assert_eq!(config.get("ldau"), None);

        let mut off = CalculatorConfig::new();
        off.set("ldau", false).unwrap();
        let mut overrides = CalculatorConfig::new();
        overrides
            .set("ldau_luj", luj(&[("Cu", "U", ParamValue::Float(4.0))]))
            .unwrap();
        off.update_from(&overrides);
        assert_eq!(off.get_bool("ldau"), Some(false));
    }
}
