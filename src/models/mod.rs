//! # 数据模型模块
//!
//! 定义原子结构、VASP 参数配置和计算结果数据模型。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `calculator/` 和 `commands/` 使用
//! - 子模块: structure, params, calculation

pub mod calculation;
pub mod params;
pub mod structure;

pub use calculation::CalcResults;
pub use params::{CalculatorConfig, Category, ParamValue};
pub use structure::{Atom, AtomicStructure, Lattice};
