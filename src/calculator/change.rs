//! # 变更检测
//!
//! 比较当前配置 / 结构与上次分类时的快照，判断是否需要重新计算。
//! 检查按顺序短路：第一个成立的条件即给出结论。
//!
//! 1. 没有上次结构
//! 2. 结构不同（元素、位置、晶胞、约束）
//! 3. 浮点 / 表达式 / 字符串 / 整数 / 布尔 / 字典参数逐键不同
//! 4. 列表参数不同；一侧存在一侧缺失一律视为不同
//! 5. 特殊输入参数不同；`INCOMPARABLE_KEYS` 中的键跳过
//! 6. 要求磁矩但从未记录
//! 7. 未收敛：`restart_unconverged` 为 false 时报 `NotConverged`
//! 8. 否则不需要

use crate::error::{JaspError, Result};
use crate::models::params::{CalculatorConfig, Category, ParamMap, INCOMPARABLE_KEYS};
use crate::models::AtomicStructure;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// 调用方要求的输出量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Energy,
    Forces,
    Stress,
    Magmom,
}

/// 需要重新计算的原因
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeReason {
    NoPreviousStructure,
    StructureChanged,
    ParameterChanged { category: Category, name: String },
    MagneticMomentMissing,
    NotConverged,
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeReason::NoPreviousStructure => write!(f, "no previous structure"),
            ChangeReason::StructureChanged => write!(f, "structure changed"),
            ChangeReason::ParameterChanged { category, name } => {
                write!(f, "{} parameter '{}' changed", category, name)
            }
            ChangeReason::MagneticMomentMissing => write!(f, "magnetic moment not recorded"),
            ChangeReason::NotConverged => write!(f, "not converged"),
        }
    }
}

/// 变更检测的输入
pub struct ChangeCheck<'a> {
    pub current_atoms: Option<&'a AtomicStructure>,
    pub previous_atoms: Option<&'a AtomicStructure>,
    pub current: &'a CalculatorConfig,
    pub previous: &'a CalculatorConfig,
    pub quantities: &'a [Quantity],
    pub magmom_recorded: bool,
    pub restart_unconverged: bool,
    pub dir: &'a Path,
}

/// 逐键比较的类别
const SCALAR_CATEGORIES: [Category; 6] = [
    Category::Float,
    Category::Expr,
    Category::Str,
    Category::Int,
    Category::Bool,
    Category::Dict,
];

/// 第 1-5 步：结构与参数的差异
pub fn first_difference(check: &ChangeCheck<'_>) -> Option<ChangeReason> {
    let Some(previous_atoms) = check.previous_atoms else {
        return Some(ChangeReason::NoPreviousStructure);
    };

    match check.current_atoms {
        Some(current) if !current.geometry_differs(previous_atoms) => {}
        _ => return Some(ChangeReason::StructureChanged),
    }

    for category in SCALAR_CATEGORIES {
        let (a, b) = (check.current.category(category), check.previous.category(category));
        if a != b {
            let name = differing_key(a, b).unwrap_or_default();
            return Some(ChangeReason::ParameterChanged { category, name });
        }
    }

    // 列表：两侧都缺失才跳过，一侧缺失即为不同
    let (a, b) = (
        check.current.category(Category::List),
        check.previous.category(Category::List),
    );
    for key in union_keys(a, b) {
        let changed = match (a.get(key), b.get(key)) {
            (None, None) => false,
            (Some(x), Some(y)) => x != y,
            _ => true,
        };
        if changed {
            return Some(ChangeReason::ParameterChanged {
                category: Category::List,
                name: key.to_string(),
            });
        }
    }

    let (a, b) = (
        check.current.category(Category::Input),
        check.previous.category(Category::Input),
    );
    for key in union_keys(a, b) {
        if INCOMPARABLE_KEYS.contains(&key) {
            if a.get(key) != b.get(key) {
                warn!("Changes to '{}' are not detected; not recomputing", key);
            }
            continue;
        }
        if a.get(key) != b.get(key) {
            return Some(ChangeReason::ParameterChanged {
                category: Category::Input,
                name: key.to_string(),
            });
        }
    }

    None
}

fn union_keys<'m>(a: &'m ParamMap, b: &'m ParamMap) -> BTreeSet<&'m str> {
    a.keys().chain(b.keys()).map(String::as_str).collect()
}

fn differing_key(a: &ParamMap, b: &ParamMap) -> Option<String> {
    union_keys(a, b)
        .into_iter()
        .find(|k| a.get(*k) != b.get(*k))
        .map(str::to_string)
}

/// 判断是否需要重新计算
///
/// `read_convergence` 只在前六步都不成立时调用。
pub fn calculation_required<F>(check: &ChangeCheck<'_>, read_convergence: F) -> Result<bool>
where
    F: FnOnce() -> Result<bool>,
{
    let reason = match first_difference(check) {
        Some(reason) => Some(reason),
        None if check.quantities.contains(&Quantity::Magmom) && !check.magmom_recorded => {
            Some(ChangeReason::MagneticMomentMissing)
        }
        None if !read_convergence()? => {
            if !check.restart_unconverged {
                return Err(JaspError::NotConverged {
                    path: check.dir.display().to_string(),
                });
            }
            Some(ChangeReason::NotConverged)
        }
        None => None,
    };

    match reason {
        Some(reason) => {
            debug!("{}: calculation required ({})", check.dir.display(), reason);
            Ok(true)
        }
        None => {
            debug!("{}: no calculation required", check.dir.display());
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Atom, Lattice, ParamValue};

    fn structure() -> AtomicStructure {
        AtomicStructure::new(
            "CO",
            Lattice::cubic(10.0),
            vec![Atom::new("C", [0.0; 3]), Atom::new("O", [1.2, 0.0, 0.0])],
        )
    }

    fn config() -> CalculatorConfig {
        let mut c = CalculatorConfig::new();
        c.set("encut", 350.0).unwrap();
        c.set("ediff", 1e-5).unwrap();
        c.set("prec", "Normal").unwrap();
        c.set("nsw", 0).unwrap();
        c.set("lwave", false).unwrap();
        c.set("magmom", vec![0.0, 0.0]).unwrap();
        c.set("kpts", [1i64, 1, 1]).unwrap();
        c.set("xc", "PBE").unwrap();
        c
    }

    fn check<'a>(
        atoms: &'a AtomicStructure,
        current: &'a CalculatorConfig,
        previous: &'a CalculatorConfig,
    ) -> ChangeCheck<'a> {
        ChangeCheck {
            current_atoms: Some(atoms),
            previous_atoms: Some(atoms),
            current,
            previous,
            quantities: &[],
            magmom_recorded: false,
            restart_unconverged: true,
            dir: Path::new("/calc"),
        }
    }

    #[test]
    fn test_equal_configs_not_required() {
        let atoms = structure();
        let (a, b) = (config(), config());
        assert!(!calculation_required(&check(&atoms, &a, &b), || Ok(true)).unwrap());
    }

    #[test]
    fn test_any_single_key_change_required() {
        let atoms = structure();
        let previous = config();
        let changes: Vec<(&str, ParamValue)> = vec![
            ("encut", ParamValue::Float(400.0)),
            ("ediff", ParamValue::Float(1e-6)),
            ("prec", ParamValue::from("Accurate")),
            ("nsw", ParamValue::Int(10)),
            ("lwave", ParamValue::Bool(true)),
            ("magmom", ParamValue::List(vec![1.0, 0.0])),
            ("kpts", ParamValue::List(vec![2.0, 2.0, 2.0])),
            ("xc", ParamValue::from("PW91")),
            ("ispin", ParamValue::Int(2)),
        ];
        for (name, value) in changes {
            let mut current = config();
            current.set(name, value).unwrap();
            let c = check(&atoms, &current, &previous);
            assert!(first_difference(&c).is_some(), "{} change not detected", name);
            assert!(calculation_required(&c, || Ok(true)).unwrap());
        }
    }

    #[test]
    fn test_empty_list_vs_absent_is_changed() {
        let atoms = structure();
        let mut current = config();
        let mut previous = config();
        current.set("rwigs", Vec::<f64>::new()).unwrap();
        previous.unset("rwigs").unwrap();
        let reason = first_difference(&check(&atoms, &current, &previous));
        assert_eq!(
            reason,
            Some(ChangeReason::ParameterChanged {
                category: Category::List,
                name: "rwigs".to_string()
            })
        );
    }

    #[test]
    fn test_incomparable_keys_skipped() {
        let atoms = structure();
        let previous = config();
        let mut current = config();
        current.set("txt", "vasp.out").unwrap();
        let mut setups = std::collections::BTreeMap::new();
        setups.insert("O".to_string(), ParamValue::from("_s"));
        current.set("setups", setups).unwrap();
        assert_eq!(first_difference(&check(&atoms, &current, &previous)), None);
    }

    #[test]
    fn test_structure_checks() {
        let atoms = structure();
        let c = config();
        let mut no_previous = check(&atoms, &c, &c);
        no_previous.previous_atoms = None;
        assert_eq!(
            first_difference(&no_previous),
            Some(ChangeReason::NoPreviousStructure)
        );

        let mut moved = structure();
        moved.atoms[1].position[0] = 1.3;
        let mut chk = check(&atoms, &c, &c);
        chk.current_atoms = Some(&moved);
        assert_eq!(first_difference(&chk), Some(ChangeReason::StructureChanged));
    }

    #[test]
    fn test_magmom_requested() {
        let atoms = structure();
        let c = config();
        let mut chk = check(&atoms, &c, &c);
        chk.quantities = &[Quantity::Magmom];
        assert!(calculation_required(&chk, || Ok(true)).unwrap());
        chk.magmom_recorded = true;
        assert!(!calculation_required(&chk, || Ok(true)).unwrap());
    }

    #[test]
    fn test_unconverged_policy() {
        let atoms = structure();
        let c = config();
        let mut chk = check(&atoms, &c, &c);
        assert!(calculation_required(&chk, || Ok(false)).unwrap());

        chk.restart_unconverged = false;
        let err = calculation_required(&chk, || Ok(false)).unwrap_err();
        assert!(matches!(err, JaspError::NotConverged { .. }));
    }

    #[test]
    fn test_convergence_not_read_when_changed() {
        let atoms = structure();
        let previous = config();
        let mut current = config();
        current.set("encut", 500.0).unwrap();
        let required = calculation_required(&check(&atoms, &current, &previous), || {
            panic!("convergence should not be read")
        });
        assert!(required.unwrap());
    }
}
