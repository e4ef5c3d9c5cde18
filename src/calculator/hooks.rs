//! # 运行前后钩子
//!
//! - 运行前钩子：`run` 开始时按注册顺序执行
//! - 运行后钩子：状态为 JustFinished 时在重建计算器后执行一次
//!
//! 钩子返回错误时中止当前操作。内置的 `check_errors` 检查 OUTCAR
//! 中的已知错误并写出 `error` 文件。

use super::Calculator;
use crate::error::{JaspError, Result};
use std::fs;
use tracing::{info, warn};

/// 钩子函数
pub type Hook = Box<dyn Fn(&mut Calculator) -> Result<()> + Send + Sync>;

/// 已注册的钩子
#[derive(Default)]
pub struct Hooks {
    pre_run: Vec<Hook>,
    post_run: Vec<Hook>,
}

impl Hooks {
    pub fn builder() -> HooksBuilder {
        HooksBuilder::default()
    }

    /// 不注册任何钩子
    pub fn none() -> Self {
        Self::default()
    }

    /// 只注册 `check_errors` 运行后钩子
    pub fn standard() -> Self {
        Self::builder().post_run(check_errors).build()
    }

    pub(crate) fn run_pre(&self, calc: &mut Calculator) -> Result<()> {
        for hook in &self.pre_run {
            hook(calc)?;
        }
        Ok(())
    }

    pub(crate) fn run_post(&self, calc: &mut Calculator) -> Result<()> {
        for hook in &self.post_run {
            hook(calc)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("pre_run", &self.pre_run.len())
            .field("post_run", &self.post_run.len())
            .finish()
    }
}

#[derive(Default)]
pub struct HooksBuilder {
    hooks: Hooks,
}

impl HooksBuilder {
    pub fn pre_run<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Calculator) -> Result<()> + Send + Sync + 'static,
    {
        self.hooks.pre_run.push(Box::new(hook));
        self
    }

    pub fn post_run<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Calculator) -> Result<()> + Send + Sync + 'static,
    {
        self.hooks.post_run.push(Box::new(hook));
        self
    }

    pub fn build(self) -> Hooks {
        self.hooks
    }
}

// ─────────────────────────────────────────────────────────────
// 内置钩子
// ─────────────────────────────────────────────────────────────

/// 错误标记文件
pub const ERROR_FILE: &str = "error";

/// OUTCAR 中表示失败的字符串
pub const ERROR_STRINGS: &[&str] = &[
    "forrtl: severe",
    "highest band is occupied at some k-points!",
    "rrrr",
    "cnorm",
    "failed",
    "non-integer",
];

/// 检查 OUTCAR 中的错误，写出或清除 `error` 文件
///
/// 非 NEB 计算缺少 OUTCAR 时返回 `FileNotFound`。
/// VASP 自行改变 NBANDS 时，把新值写回 INCAR 并返回 `BandsChanged`。
pub fn check_errors(calc: &mut Calculator) -> Result<()> {
    let outcar = calc.dir().join("OUTCAR");
    if !outcar.exists() {
        // NEB 的 OUTCAR 在各映像子目录中
        if calc.neb().is_some() {
            return Ok(());
        }
        return Err(JaspError::FileNotFound {
            path: outcar.display().to_string(),
        });
    }
    let content = fs::read_to_string(&outcar).map_err(|e| JaspError::read(&outcar, e))?;

    let mut errors: Vec<String> = ERROR_STRINGS
        .iter()
        .filter(|s| content.contains(*s))
        .map(|s| s.to_string())
        .collect();
    if !calc.read_convergence()? {
        errors.push("unconverged".to_string());
    }
    // IBRION > 3 为振动计算，不检查离子弛豫
    let relaxing = matches!(calc.config().get_int("ibrion"), Some(1..=3));
    if relaxing && !content.contains("reached required accuracy") {
        errors.push("unrelaxed".to_string());
    }

    let error_file = calc.dir().join(ERROR_FILE);
    if errors.is_empty() {
        if error_file.exists() {
            fs::remove_file(&error_file).map_err(|e| JaspError::write(&error_file, e))?;
        }
    } else {
        warn!("{}: {}", calc.dir().display(), errors.join(", "));
        fs::write(&error_file, errors.join("\n") + "\n")
            .map_err(|e| JaspError::write(&error_file, e))?;
    }

    if let Some((requested, used)) = calc.results().and_then(|r| r.bands_changed) {
        if calc.config().get_int("nbands") != Some(used) {
            info!("VASP changed NBANDS to {}; updating INCAR", used);
            calc.set("nbands", used)?;
            calc.write_incar()?;
            return Err(JaspError::BandsChanged { requested, used });
        }
    }

    Ok(())
}
