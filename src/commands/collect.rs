//! # collect 命令实现
//!
//! 汇总完成的计算到 CSV。
//!
//! ## 功能
//! - 递归查找计算目录
//! - 并行分类并读取结果（只处理已完成的目录）
//! - 每个计算一行：路径、化学式、原子数、能量、晶胞参数、体积、应力、收敛性、uuid
//!
//! ## 依赖关系
//! - 使用 `cli/collect.rs` 定义的参数
//! - 使用 `calculator/`, `batch/`
//! - 使用 `csv` + `serde` 写出

use super::print_batch_summary;
use crate::batch::{BatchRunner, CalcCollector, ProcessResult};
use crate::calculator::{CalcRequest, Calculator, Hooks, Jasp};
use crate::cli::collect::CollectArgs;
use crate::config::JaspRc;
use crate::error::{JaspError, Result};
use crate::utils::output;

use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;

/// CSV 中的一行
#[derive(Debug, Clone, Serialize)]
pub struct CalcRecord {
    pub path: String,
    pub formula: String,
    pub natoms: usize,
    pub energy: Option<f64>,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub volume: f64,
    /// Voigt 顺序 (xx yy zz yz xz xy)，空格分隔，GPa
    pub stress: String,
    pub converged: bool,
    pub uuid: String,
}

impl CalcRecord {
    fn from_calculator(calc: &Calculator) -> Option<Self> {
        let atoms = calc.atoms()?;
        let (a, b, c, alpha, beta, gamma) = atoms.lattice.parameters();
        Some(CalcRecord {
            path: calc.dir().display().to_string(),
            formula: atoms.formula(),
            natoms: atoms.len(),
            energy: calc.energy(),
            a,
            b,
            c,
            alpha,
            beta,
            gamma,
            volume: atoms.lattice.volume(),
            stress: calc
                .stress()
                .map(|s| {
                    s.iter()
                        .map(|v| format!("{:.4}", v))
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .unwrap_or_default(),
            converged: calc.converged().unwrap_or(false),
            uuid: calc.metadata().uuid().unwrap_or_default().to_string(),
        })
    }
}

/// 执行 collect 命令
pub fn execute(args: CollectArgs, rc: JaspRc) -> Result<()> {
    output::print_header("Collecting Calculations");

    if !args.root.is_dir() {
        return Err(JaspError::DirectoryNotFound {
            path: args.root.display().to_string(),
        });
    }

    let dirs = CalcCollector::new(vec![args.root.clone()])
        .recursive(true)
        .collect();
    output::print_info(&format!("Scanning {} directories...", dirs.len()));

    let jasp = Jasp::from_rc(rc, Hooks::none())?;
    let records = Mutex::new(Vec::new());
    let (summary, results) = BatchRunner::new(args.jobs).run(&dirs, |dir| {
        collect_one(&jasp, dir, args.include_unconverged, &records)
    });

    for result in &results {
        if let ProcessResult::Failed(path, err) = result {
            output::print_warning(&format!("{}: {}", path, err));
        }
    }

    let mut records = records
        .into_inner()
        .map_err(|_| JaspError::Other("record collection was poisoned".to_string()))?;
    records.sort_by(|a: &CalcRecord, b| a.path.cmp(&b.path));

    if records.is_empty() {
        output::print_warning("No finished calculations found to collect.");
        return Ok(());
    }

    let mut writer = csv::Writer::from_path(&args.output)?;
    for record in &records {
        writer.serialize(record)?;
    }
    writer
        .flush()
        .map_err(|e| JaspError::write(&args.output, e))?;

    print_batch_summary(&summary);
    output::print_done(&format!(
        "Collected {} calculations into '{}'",
        records.len(),
        args.output.display()
    ));
    Ok(())
}

fn collect_one(
    jasp: &Jasp,
    dir: &Path,
    include_unconverged: bool,
    records: &Mutex<Vec<CalcRecord>>,
) -> ProcessResult {
    let name = dir.display().to_string();
    let calc = match jasp.calculator(dir, CalcRequest::new()) {
        Ok(calc) => calc,
        Err(e) => return ProcessResult::Failed(name, e.to_string()),
    };

    if !calc.state().has_results() || calc.state().in_queue() {
        return ProcessResult::Skipped(format!("{}: {}", name, calc.state()));
    }
    if !include_unconverged && calc.converged() != Some(true) {
        return ProcessResult::Skipped(format!("{}: not converged", name));
    }

    match (CalcRecord::from_calculator(&calc), records.lock()) {
        (Some(record), Ok(mut list)) => {
            list.push(record);
            ProcessResult::Success(name)
        }
        (None, _) => ProcessResult::Skipped(format!("{}: no structure", name)),
        (_, Err(_)) => ProcessResult::Failed(name, "record collection was poisoned".to_string()),
    }
}
