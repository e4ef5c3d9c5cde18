//! # 计算器工厂
//!
//! `Jasp` 持有共享上下文（配置、调度器、钩子、队列环境），对每个目录：
//! 扫描标记 → 必要时查询队列 → 分类 → 按状态恢复 → 拍快照 → 应用覆盖参数。
//!
//! ## 状态恢复
//! - Empty：空配置
//! - Initialized：读取输入；POSCAR 缺失视为尚无结构
//! - QueuedNotRunning：读取输入与排序，不读结果
//! - QueuedRunning：读取输入与已有的部分结果
//! - JustFinished：删除 `jobid`，读取全部结果，执行一次运行后钩子
//! - LongDone：读取全部结果

use super::hooks::Hooks;
use super::neb::{NebImages, NebRequest};
use super::state::{classify, DirectoryState, Markers};
use super::{Calculator, ScopedDir};
use crate::config::JaspRc;
use crate::error::{JaspError, Result};
use crate::models::{AtomicStructure, CalculatorConfig, ParamValue};
use crate::queue::{self, BatchQueue, JobHandle, QueueEnvironment, QueueStatus};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// 工厂与运行调度共享的上下文
pub struct Context {
    pub rc: JaspRc,
    pub queue: Box<dyn BatchQueue>,
    pub hooks: Hooks,
    pub env: QueueEnvironment,
}

/// 构造计算器时的调用方输入
#[derive(Debug, Clone, Default)]
pub struct CalcRequest {
    atoms: Option<AtomicStructure>,
    neb: Option<NebRequest>,
    overrides: CalculatorConfig,
}

impl CalcRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn atoms(mut self, atoms: AtomicStructure) -> Self {
        self.atoms = Some(atoms);
        self
    }

    pub fn neb(mut self, request: NebRequest) -> Self {
        self.neb = Some(request);
        self
    }

    /// 覆盖参数；未知参数名立即报错
    pub fn set(mut self, name: &str, value: impl Into<ParamValue>) -> Result<Self> {
        self.overrides.set(name, value)?;
        Ok(self)
    }

    pub fn overrides(mut self, overrides: CalculatorConfig) -> Self {
        self.overrides.update_from(&overrides);
        self
    }
}

/// 计算器工厂
#[derive(Clone)]
pub struct Jasp {
    ctx: Arc<Context>,
}

impl Jasp {
    pub fn new(
        rc: JaspRc,
        queue: Box<dyn BatchQueue>,
        hooks: Hooks,
        env: QueueEnvironment,
    ) -> Self {
        Jasp {
            ctx: Arc::new(Context {
                rc,
                queue,
                hooks,
                env,
            }),
        }
    }

    /// 按配置选择调度器并检测队列环境
    pub fn from_rc(rc: JaspRc, hooks: Hooks) -> Result<Self> {
        let queue = queue::from_rc(&rc);
        let env = QueueEnvironment::detect()?;
        Ok(Self::new(rc, queue, hooks, env))
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// 进入目录、构造计算器并执行 `f`；离开时恢复工作目录
    pub fn enter<T, F>(&self, dir: &Path, request: CalcRequest, f: F) -> Result<T>
    where
        F: FnOnce(&mut Calculator) -> Result<T>,
    {
        let scope = ScopedDir::enter(dir)?;
        let mut calc = self.calculator(scope.path(), request)?;
        f(&mut calc)
    }

    /// 只做分类，不恢复配置
    pub fn classify(&self, dir: &Path) -> Result<DirectoryState> {
        let dir = absolute(dir)?;
        self.classify_markers(&dir).map(|(state, _)| state)
    }

    fn classify_markers(&self, dir: &Path) -> Result<(DirectoryState, Markers)> {
        let mut markers = Markers::scan(dir);
        if markers.needs_probe() {
            let status = match JobHandle::read(dir)? {
                Some(job) => self.ctx.queue.status(&job)?,
                None => QueueStatus::NotQueued,
            };
            markers.queue_status = Some(status);
        }

        let state = classify(&markers, false).ok_or_else(|| JaspError::UnrecognizedDirectoryState {
            path: dir.display().to_string(),
        })?;
        debug!("{}: {} ({:?})", dir.display(), state, markers);
        Ok((state, markers))
    }

    /// 为目录构造计算器
    pub fn calculator(&self, dir: impl AsRef<Path>, request: CalcRequest) -> Result<Calculator> {
        let dir = absolute(dir.as_ref())?;
        let CalcRequest {
            atoms,
            neb,
            overrides,
        } = request;

        if let Some(neb) = neb {
            return self.neb_init(dir, neb, overrides);
        }

        let (state, markers) = self.classify_markers(&dir)?;
        let mut calc = Calculator::new(dir, state, Arc::clone(&self.ctx));
        calc.queue_status = markers.queue_status;

        match state {
            DirectoryState::Empty => {
                calc.metadata = crate::parsers::Metadata::read(&calc.dir)?;
                calc.atoms = atoms;
            }
            DirectoryState::Initialized => {
                calc.read_config()?;
                let restored = calc.read_structure("POSCAR")?;
                calc.normalize_ldau(restored.as_ref())?;
                calc.take_structures(atoms, restored, false);
                calc.restore_neb()?;
            }
            DirectoryState::QueuedNotRunning => {
                calc.read_config()?;
                if calc.sort.is_none() {
                    debug!("{}: no sort file, using identity order", calc.dir.display());
                }
                let restored = calc.read_structure("POSCAR")?;
                calc.normalize_ldau(restored.as_ref())?;
                calc.take_structures(atoms, restored, false);
                calc.restore_neb()?;
                calc.converged = Some(false);
            }
            DirectoryState::QueuedRunning => {
                calc.read_config()?;
                let restored = calc.read_structure("POSCAR")?;
                calc.normalize_ldau(restored.as_ref())?;
                calc.take_structures(atoms, restored, false);
                calc.restore_neb()?;
                calc.read_results()?;
            }
            DirectoryState::JustFinished => {
                JobHandle::remove(&calc.dir)?;
                info!("{}: job finished", calc.dir.display());
                calc.restore_finished(atoms)?;
                let ctx = Arc::clone(&self.ctx);
                ctx.hooks.run_post(&mut calc)?;
            }
            DirectoryState::LongDone => {
                calc.restore_finished(atoms)?;
            }
            DirectoryState::NebInit => {
                return Err(JaspError::InvalidArgument(format!(
                    "{}: NEB calculations need images and endpoints",
                    calc.dir.display()
                )));
            }
        }

        calc.previous_config = calc.config.clone();
        calc.config.update_from(&overrides);
        Ok(calc)
    }

    /// 从两个已完成的端点目录建立 NEB 计算
    fn neb_init(
        &self,
        dir: PathBuf,
        request: NebRequest,
        overrides: CalculatorConfig,
    ) -> Result<Calculator> {
        if overrides.get("spring").is_none() {
            return Err(JaspError::InvalidArgument(
                "NEB calculations require a spring constant".to_string(),
            ));
        }
        if request.images.len() < 3 {
            return Err(JaspError::InvalidArgument(format!(
                "NEB needs at least 3 images, got {}",
                request.images.len()
            )));
        }

        let endpoint = |path: &Path| -> Result<(CalculatorConfig, f64)> {
            let calc = self.calculator(path, CalcRequest::new())?;
            let energy = calc.energy().ok_or_else(|| {
                JaspError::InvalidArgument(format!(
                    "endpoint {} has no energy",
                    calc.dir.display()
                ))
            })?;
            Ok((calc.config, energy))
        };
        let (mut config, initial) = endpoint(&request.initial_dir)?;
        let (_, last) = endpoint(&request.final_dir)?;

        let n_images = request.images.len() as i64 - 2;
        config.set("images", n_images)?;

        let mut calc = Calculator::new(dir, DirectoryState::NebInit, Arc::clone(&self.ctx));
        if calc.dir.join("INCAR").exists() {
            calc.read_config()?;
            let restored = calc.read_structure("00/POSCAR")?;
            calc.normalize_ldau(restored.as_ref())?;
            calc.previous_atoms = restored;
            calc.previous_config = calc.config.clone();
        } else {
            calc.metadata = crate::parsers::Metadata::read(&calc.dir)?;
        }

        calc.atoms = request.images.first().cloned();
        calc.neb = Some(NebImages::new(request.images, initial, last));
        calc.config = config;
        calc.config.update_from(&overrides);
        calc.converged = None;
        info!(
            "{}: NEB with {} intermediate images",
            calc.dir.display(),
            n_images
        );
        Ok(calc)
    }
}

impl Calculator {
    /// 当前原子：调用方提供的优先；上次的结构作为比较基准
    fn take_structures(
        &mut self,
        atoms: Option<AtomicStructure>,
        restored: Option<AtomicStructure>,
        adopt: bool,
    ) {
        self.atoms = match (atoms, &restored) {
            (Some(mut user), Some(previous)) if adopt => {
                user.adopt_geometry(previous);
                Some(user)
            }
            (Some(user), _) => Some(user),
            (None, restored) => restored.clone(),
        };
        self.previous_atoms = restored;
    }

    /// INCAR 中设置了 IMAGES 时恢复 NEB 映像
    fn restore_neb(&mut self) -> Result<()> {
        let Some(images) = self.config.get_int("images").filter(|&n| n > 0) else {
            return Ok(());
        };
        let neb = NebImages::read(
            &self.dir,
            images as usize,
            self.sort.as_ref(),
            &self.metadata,
        )?;
        if self.atoms.is_none() {
            self.atoms = neb.images.first().cloned();
        }
        if self.previous_atoms.is_none() {
            self.previous_atoms = neb.images.first().cloned();
        }
        self.neb = Some(neb);
        Ok(())
    }

    /// 完成状态：结构取 CONTCAR，读取结果与收敛性
    fn restore_finished(&mut self, atoms: Option<AtomicStructure>) -> Result<()> {
        self.read_config()?;
        let restored = match self.read_structure("CONTCAR")? {
            Some(s) => Some(s),
            None => self.read_structure("POSCAR")?,
        };
        self.normalize_ldau(restored.as_ref())?;
        self.take_structures(atoms, restored, true);
        self.restore_neb()?;
        self.read_results()
    }
}

fn absolute(dir: &Path) -> Result<PathBuf> {
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| JaspError::read(Path::new("."), e))?;
    Ok(cwd.join(dir))
}
