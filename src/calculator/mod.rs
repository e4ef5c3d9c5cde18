//! # 计算器模块
//!
//! 一个计算目录对应一个 `Calculator`：当前配置与结构、分类时的快照、
//! 读回的结果与收敛性，以及共享的运行上下文（配置、调度器、钩子、队列环境）。
//!
//! ## 功能
//! - `state`：目录状态分类
//! - `factory`：按状态构造计算器 (`Jasp`)
//! - `change`：变更检测
//! - `dispatch`：运行 / 提交 (`RunOutcome`)
//! - `hooks`：运行前后钩子
//! - `context`：作用域工作目录
//! - `neb`, `potcar`, `memory`, `files`：NEB、赝势查找、内存估计、克隆与清理
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `models/`, `parsers/`, `queue/`, `config.rs`

pub mod change;
pub mod context;
pub mod dispatch;
pub mod factory;
pub mod files;
pub mod hooks;
pub mod memory;
pub mod neb;
pub mod potcar;
pub mod state;

pub use change::{ChangeReason, Quantity};
pub use context::ScopedDir;
pub use dispatch::RunOutcome;
pub use factory::{CalcRequest, Context, Jasp};
pub use hooks::{Hook, Hooks};
pub use neb::{NebImages, NebRequest};
pub use state::DirectoryState;

use crate::config::JaspRc;
use crate::error::{JaspError, Result};
use crate::models::{AtomicStructure, CalcResults, CalculatorConfig, ParamValue};
use crate::parsers::incar::{collapse_ldau, write_incar};
use crate::parsers::kpoints::{read_kpoints, write_kpoints, KpointMesh};
use crate::parsers::outcar::parse_outcar;
use crate::parsers::poscar::{parse_poscar_file, write_poscar};
use crate::parsers::potcar::{read_potcar, write_potcar};
use crate::parsers::{incar, Metadata, SortOrder};
use crate::queue::{JobHandle, QueueStatus};
use change::ChangeCheck;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub const SORT_FILE: &str = "ase-sort.dat";

/// `set_nbands` 默认的每原子附加能带数
pub const DEFAULT_NBANDS_FACTOR: f64 = 1.5;

/// 计算目录的计算器
pub struct Calculator {
    dir: PathBuf,
    state: DirectoryState,
    queue_status: Option<QueueStatus>,
    config: CalculatorConfig,
    previous_config: CalculatorConfig,
    atoms: Option<AtomicStructure>,
    previous_atoms: Option<AtomicStructure>,
    results: Option<CalcResults>,
    converged: Option<bool>,
    sort: Option<SortOrder>,
    potcar_symbols: Vec<String>,
    neb: Option<NebImages>,
    metadata: Metadata,
    ctx: Arc<Context>,
}

impl Calculator {
    pub(crate) fn new(dir: PathBuf, state: DirectoryState, ctx: Arc<Context>) -> Self {
        Calculator {
            dir,
            state,
            queue_status: None,
            config: CalculatorConfig::new(),
            previous_config: CalculatorConfig::new(),
            atoms: None,
            previous_atoms: None,
            results: None,
            converged: None,
            sort: None,
            potcar_symbols: Vec::new(),
            neb: None,
            metadata: Metadata::default(),
            ctx,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // 访问器
    // ─────────────────────────────────────────────────────────────

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn state(&self) -> DirectoryState {
        self.state
    }

    pub fn config(&self) -> &CalculatorConfig {
        &self.config
    }

    pub fn previous_config(&self) -> &CalculatorConfig {
        &self.previous_config
    }

    pub fn atoms(&self) -> Option<&AtomicStructure> {
        self.atoms.as_ref()
    }

    pub fn previous_atoms(&self) -> Option<&AtomicStructure> {
        self.previous_atoms.as_ref()
    }

    pub fn set_atoms(&mut self, atoms: AtomicStructure) {
        self.atoms = Some(atoms);
    }

    pub fn results(&self) -> Option<&CalcResults> {
        self.results.as_ref()
    }

    pub fn neb(&self) -> Option<&NebImages> {
        self.neb.as_ref()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    pub fn rc(&self) -> &JaspRc {
        &self.ctx.rc
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// 目录中记录的作业号
    pub fn job(&self) -> Result<Option<JobHandle>> {
        JobHandle::read(&self.dir)
    }

    /// 设置参数
    pub fn set(&mut self, name: &str, value: impl Into<ParamValue>) -> Result<()> {
        self.config.set(name, value)
    }

    pub fn unset(&mut self, name: &str) -> Result<Option<ParamValue>> {
        self.config.unset(name)
    }

    pub fn energy(&self) -> Option<f64> {
        self.results.as_ref().and_then(|r| r.energy_ev)
    }

    pub fn stress(&self) -> Option<[f64; 6]> {
        self.results.as_ref().and_then(|r| r.stress_gpa)
    }

    pub fn magnetic_moment(&self) -> Option<f64> {
        self.results.as_ref().and_then(|r| r.magnetic_moment)
    }

    /// 受力（用户原子顺序）；仅在收敛时有意义
    pub fn forces(&self) -> Option<Vec<[f64; 3]>> {
        let atoms = self.atoms.as_ref()?;
        atoms.has_forces().then(|| {
            atoms
                .atoms
                .iter()
                .map(|a| a.force.unwrap_or_default())
                .collect()
        })
    }

    /// 是否已确认收敛（未读取时为 None）
    pub fn converged(&self) -> Option<bool> {
        self.converged
    }

    /// 是否为离子弛豫
    pub fn is_relaxation(&self) -> bool {
        matches!(self.config.get_int("ibrion"), Some(1..=3))
            && self.config.get_int("nsw").unwrap_or(0) > 0
    }

    /// 元素分组顺序（POSCAR 顺序）
    pub fn species(&self) -> Vec<String> {
        species_of(self.atoms.as_ref(), &self.potcar_symbols)
    }

    /// 调度器在分类时报告的作业状态；没有 jobid 时为 None
    pub fn queue_status(&self) -> Option<QueueStatus> {
        self.queue_status
    }

    /// 离子步数（最后一个 Iteration 的编号）
    pub fn ionic_steps(&self) -> Option<usize> {
        self.results.as_ref().and_then(|r| r.ionic_steps)
    }

    /// 全部原子的价电子数，按 POTCAR 的 ZVAL 求和；POTCAR 不存在时先写出
    pub fn valence_electrons(&self) -> Result<f64> {
        let atoms = self.atoms.as_ref().ok_or_else(|| {
            JaspError::InvalidArgument(format!("{} has no atoms", self.dir.display()))
        })?;

        let potcar = self.dir.join("POTCAR");
        if !potcar.exists() {
            std::fs::create_dir_all(&self.dir).map_err(|e| JaspError::write(&self.dir, e))?;
            self.write_potcar()?;
        }
        let info = read_potcar(&potcar)?;

        atoms.symbols().into_iter().try_fold(0.0, |total, symbol| {
            let zval = info
                .zval(symbol)
                .ok_or_else(|| JaspError::MissingPseudopotential {
                    symbol: symbol.to_string(),
                    name: format!("ZVAL in {}", potcar.display()),
                })?;
            Ok(total + zval)
        })
    }

    /// 设置 NBANDS 并返回其值
    ///
    /// 给定 `n` 时直接使用；否则取 `ceil(价电子数 / 2) + 原子数 × f`，
    /// 过渡金属可把 `f` 调到 2。
    pub fn set_nbands(&mut self, n: Option<i64>, f: f64) -> Result<i64> {
        let nbands = match n {
            Some(n) => n,
            None => {
                let natoms = self.atoms.as_ref().map_or(0, AtomicStructure::len);
                let nelect = self.valence_electrons()?;
                ((nelect / 2.0).ceil() + natoms as f64 * f) as i64
            }
        };
        self.set("nbands", nbands)?;
        Ok(nbands)
    }

    // ─────────────────────────────────────────────────────────────
    // 输入读取
    // ─────────────────────────────────────────────────────────────

    /// 读取 INCAR / KPOINTS / POTCAR / ase-sort.dat / METADATA
    pub fn read_config(&mut self) -> Result<()> {
        let incar_path = self.dir.join("INCAR");
        self.config = incar::read_incar(&incar_path)?;

        let kpoints = self.dir.join("KPOINTS");
        if kpoints.exists() {
            if let Some(mesh) = read_kpoints(&kpoints)? {
                mesh.apply(&mut self.config)?;
            }
        }

        let potcar = self.dir.join("POTCAR");
        if potcar.exists() {
            let info = read_potcar(&potcar)?;
            if let Some(xc) = info.xc {
                self.config.set("xc", xc)?;
            }
            self.potcar_symbols = info.symbols;
        }

        let sort_file = self.dir.join(SORT_FILE);
        self.sort = if sort_file.exists() {
            Some(SortOrder::read(&sort_file)?)
        } else {
            None
        };

        self.metadata = Metadata::read(&self.dir)?;
        debug!("Read configuration from {}", self.dir.display());
        Ok(())
    }

    /// 读取 POSCAR/CONTCAR 并恢复用户原子顺序；文件不存在时返回 None
    pub(crate) fn read_structure(&self, name: &str) -> Result<Option<AtomicStructure>> {
        let path = self.dir.join(name);
        let empty = std::fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);
        if empty {
            return Ok(None);
        }

        let hint = (!self.potcar_symbols.is_empty()).then_some(self.potcar_symbols.as_slice());
        let structure = parse_poscar_file(&path, hint)?;
        Ok(Some(match &self.sort {
            Some(order) if order.len() == structure.len() => structure.reordered(&order.resort),
            _ => structure,
        }))
    }

    /// 按输入结构的元素顺序，从 LDAU 列表还原 `ldau_luj`
    pub(crate) fn normalize_ldau(&mut self, written: Option<&AtomicStructure>) -> Result<()> {
        let species = species_of(written, &self.potcar_symbols);
        let refs: Vec<&str> = species.iter().map(String::as_str).collect();
        collapse_ldau(&mut self.config, &refs)
    }

    // ─────────────────────────────────────────────────────────────
    // 结果读取
    // ─────────────────────────────────────────────────────────────

    /// 读取 OUTCAR 结果；受力按用户顺序写入原子，仅在收敛时保留
    pub fn read_results(&mut self) -> Result<()> {
        let outcar = self.dir.join("OUTCAR");
        if !outcar.exists() {
            return Ok(());
        }
        let mut results = parse_outcar(&outcar)?;

        if let Some(order) = &self.sort {
            if order.len() == results.forces.len() {
                results.forces = order.resort.iter().map(|&i| results.forces[i]).collect();
            }
        }
        self.results = Some(results);
        self.converged = None;

        let converged = self.read_convergence()?;
        self.converged = Some(converged);
        self.attach_forces(converged);
        Ok(())
    }

    fn attach_forces(&mut self, converged: bool) {
        let forces = match &self.results {
            Some(r) if converged => r.forces.clone(),
            _ => Vec::new(),
        };
        if let Some(atoms) = self.atoms.as_mut() {
            if forces.len() == atoms.len() {
                for (atom, f) in atoms.atoms.iter_mut().zip(forces) {
                    atom.force = Some(f);
                }
            } else {
                atoms.clear_forces();
            }
        }
    }

    /// 判断计算是否收敛
    pub fn read_convergence(&self) -> Result<bool> {
        if let Some(converged) = self.converged {
            return Ok(converged);
        }
        let ediff = self.config.get_float("ediff");
        if let Some(neb) = &self.neb {
            return neb.converged(&self.dir, ediff);
        }

        match &self.results {
            Some(results) => Ok(results.converged(ediff, self.is_relaxation())),
            None => {
                let outcar = self.dir.join("OUTCAR");
                if !outcar.exists() {
                    return Ok(false);
                }
                Ok(parse_outcar(&outcar)?.converged(ediff, self.is_relaxation()))
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // 输入写出
    // ─────────────────────────────────────────────────────────────

    /// 写出全部输入文件：POSCAR, INCAR, KPOINTS, POTCAR, ase-sort.dat, METADATA
    pub fn write_config(&mut self) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| JaspError::write(&self.dir, e))?;

        if let Some(neb) = &self.neb {
            self.sort = Some(neb.write_images(&self.dir)?);
        } else {
            let atoms = self.atoms.as_ref().ok_or_else(|| {
                JaspError::InvalidArgument(format!(
                    "{} has no atoms to write",
                    self.dir.display()
                ))
            })?;
            let order = SortOrder::by_species(atoms);
            let sorted = atoms.reordered(&order.sort);
            write_poscar(&self.dir.join("POSCAR"), &sorted)?;
            order.write(&self.dir.join(SORT_FILE))?;
            self.sort = Some(order);
        }

        self.write_incar()?;
        write_kpoints(&self.dir.join("KPOINTS"), &KpointMesh::from_config(&self.config))?;
        self.write_potcar()?;

        if let Some(neb) = &self.neb {
            neb.record_endpoints(&mut self.metadata);
        }
        self.metadata.ensure_identity();
        self.metadata.write(&self.dir)?;

        debug!("Wrote input files in {}", self.dir.display());
        Ok(())
    }

    /// 只写出 INCAR；未设置 MAGMOM 时使用原子上的初始磁矩
    pub fn write_incar(&self) -> Result<()> {
        let species = self.species();
        let refs: Vec<&str> = species.iter().map(String::as_str).collect();

        let mut config = self.config.clone();
        if config.get("magmom").is_none() {
            if let (Some(atoms), Some(order)) = (&self.atoms, &self.sort) {
                if atoms.atoms.iter().any(|a| a.magmom.is_some()) && order.len() == atoms.len() {
                    let magmom: Vec<f64> = order
                        .sort
                        .iter()
                        .map(|&i| atoms.atoms[i].magmom.unwrap_or(0.0))
                        .collect();
                    config.set("magmom", magmom)?;
                }
            }
        }

        write_incar(&self.dir.join("INCAR"), &config, &refs)
    }

    fn write_potcar(&self) -> Result<()> {
        let target = self.dir.join("POTCAR");
        let search = self.ctx.rc.pp_search_path();
        if search.is_empty() && target.exists() {
            debug!("No pseudopotential path; keeping existing POTCAR");
            return Ok(());
        }

        let species = self.species();
        let sources = potcar::locate_all(&species, &self.config, &search)?;
        write_potcar(&target, &sources)
    }

    // ─────────────────────────────────────────────────────────────
    // 变更检测
    // ─────────────────────────────────────────────────────────────

    /// 判断是否需要重新计算
    pub fn calculation_required(&self, quantities: &[Quantity]) -> Result<bool> {
        let check = ChangeCheck {
            current_atoms: self.atoms.as_ref(),
            previous_atoms: self.previous_atoms.as_ref(),
            current: &self.config,
            previous: &self.previous_config,
            quantities,
            magmom_recorded: self.magnetic_moment().is_some(),
            restart_unconverged: self.ctx.rc.restart_unconverged,
            dir: &self.dir,
        };
        change::calculation_required(&check, || self.read_convergence())
    }
}

/// 结构中元素首次出现的顺序；没有结构时使用 POTCAR 中的元素
fn species_of(structure: Option<&AtomicStructure>, fallback: &[String]) -> Vec<String> {
    let mut species: Vec<String> = Vec::new();
    for symbol in structure.map(|s| s.symbols()).unwrap_or_default() {
        if !species.iter().any(|s| s == symbol) {
            species.push(symbol.to_string());
        }
    }
    if species.is_empty() {
        species = fallback.to_vec();
    }
    species
}

impl std::fmt::Debug for Calculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Calculator")
            .field("dir", &self.dir)
            .field("state", &self.state)
            .field("config", &self.config)
            .field("converged", &self.converged)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Atom, Lattice};
    use crate::queue::QueueEnvironment;
    use std::fs;

    fn library(root: &Path) {
        for (symbol, zval) in [("Fe", 8.0), ("O", 6.0)] {
            let dir = root.join("potpaw_PBE").join(symbol);
            fs::create_dir_all(&dir).unwrap();
            fs::write(
                dir.join("POTCAR"),
                format!(
                    "  PAW_PBE {0} 06Sep2000\n   TITEL  = PAW_PBE {0} 06Sep2000\n   POMASS =   1.000; ZVAL   =    {1:.3}    mass and valenz\n",
                    symbol, zval
                ),
            )
            .unwrap();
        }
    }

    fn factory(pp: &Path) -> Jasp {
        let rc = JaspRc {
            pp_path: Some(pp.to_path_buf()),
            ..Default::default()
        };
        let queue = crate::queue::from_rc(&rc);
        Jasp::new(rc, queue, Hooks::none(), QueueEnvironment::outside())
    }

    fn feo() -> AtomicStructure {
        AtomicStructure::new(
            "FeO",
            Lattice::cubic(4.3),
            vec![
                Atom::new("O", [0.0, 0.0, 0.0]).with_magmom(0.0),
                Atom::new("Fe", [2.15, 2.15, 2.15]).with_magmom(4.0),
                Atom::new("O", [2.15, 0.0, 2.15]).with_magmom(0.0),
            ],
        )
    }

    #[test]
    fn test_write_config_sorts_and_derives_magmom() {
        let root = tempfile::tempdir().unwrap();
        library(&root.path().join("pp"));
        let dir = root.path().join("feo");

        let request = CalcRequest::new().atoms(feo()).set("ispin", 2).unwrap();
        let mut calc = factory(&root.path().join("pp")).calculator(&dir, request).unwrap();
        assert_eq!(calc.state(), DirectoryState::Empty);
        assert_eq!(calc.species(), vec!["O", "Fe"]);
        calc.write_config().unwrap();

        let written = incar::read_incar(&dir.join("INCAR")).unwrap();
        assert_eq!(written.get_list("magmom"), Some(&[0.0, 0.0, 4.0][..]));
        assert!(calc.metadata().uuid().is_some());

        let potcar = read_potcar(&dir.join("POTCAR")).unwrap();
        assert_eq!(potcar.symbols, vec!["O", "Fe"]);

        // 读回时恢复用户顺序
        let restored = calc.read_structure("POSCAR").unwrap().unwrap();
        assert_eq!(restored.symbols(), vec!["O", "Fe", "O"]);
        assert!(!restored.geometry_differs(&feo()));
    }

    #[test]
    fn test_initialized_directory_needs_calculation() {
        let root = tempfile::tempdir().unwrap();
        library(&root.path().join("pp"));
        let dir = root.path().join("feo");
        let jasp = factory(&root.path().join("pp"));

        let mut calc = jasp
            .calculator(&dir, CalcRequest::new().atoms(feo()))
            .unwrap();
        calc.write_config().unwrap();

        let calc = jasp.calculator(&dir, CalcRequest::new()).unwrap();
        assert_eq!(calc.state(), DirectoryState::Initialized);
        assert_eq!(calc.config().get_str("xc"), Some("PBE"));
        assert!(calc.forces().is_none());
        assert_eq!(calc.converged(), None);
        // 结构未变、参数未变，但没有输出
        assert!(calc.calculation_required(&[Quantity::Energy]).unwrap());
    }

    #[test]
    fn test_write_without_atoms_fails() {
        let root = tempfile::tempdir().unwrap();
        let mut calc = factory(root.path())
            .calculator(root.path().join("empty"), CalcRequest::new())
            .unwrap();
        assert!(matches!(
            calc.write_config(),
            Err(JaspError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_set_nbands_from_valence_electrons() {
        let root = tempfile::tempdir().unwrap();
        library(&root.path().join("pp"));
        let dir = root.path().join("feo");

        let request = CalcRequest::new().atoms(feo());
        let mut calc = factory(&root.path().join("pp")).calculator(&dir, request).unwrap();
        // O + Fe + O = 6 + 8 + 6
        assert_eq!(calc.valence_electrons().unwrap(), 20.0);
        assert!(dir.join("POTCAR").exists());

        // ceil(20 / 2) + 3 × 1.5 = 14.5 → 14
        assert_eq!(calc.set_nbands(None, DEFAULT_NBANDS_FACTOR).unwrap(), 14);
        assert_eq!(calc.config().get_int("nbands"), Some(14));
        assert_eq!(calc.set_nbands(Some(32), DEFAULT_NBANDS_FACTOR).unwrap(), 32);
        assert_eq!(calc.config().get_int("nbands"), Some(32));
    }

    #[test]
    fn test_valence_electrons_needs_zval() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("feo");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("POTCAR"),
            "  PAW_PBE O 08Apr2002\n   TITEL  = PAW_PBE O 08Apr2002\n   POMASS =  16.000; ZVAL   =    6.000\n",
        )
        .unwrap();

        let calc = factory(root.path())
            .calculator(&dir, CalcRequest::new().atoms(feo()))
            .unwrap();
        assert!(matches!(
            calc.valence_electrons(),
            Err(JaspError::MissingPseudopotential { .. })
        ));
    }
}
