//! # 解析器模块
//!
//! VASP 输入输出文件的读写：INCAR, KPOINTS, POSCAR/CONTCAR, POTCAR, OUTCAR，
//! 以及 `ase-sort.dat` 与 `METADATA`。
//!
//! ## 依赖关系
//! - 被 `calculator/` 和 `commands/` 模块使用
//! - 使用 `models/` 数据模型
//! - 子模块: incar, kpoints, poscar, potcar, outcar, metadata

pub mod incar;
pub mod kpoints;
pub mod metadata;
pub mod outcar;
pub mod poscar;
pub mod potcar;

pub use metadata::Metadata;
pub use poscar::SortOrder;
