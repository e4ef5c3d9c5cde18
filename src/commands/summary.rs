//! # sum 命令实现
//!
//! 打印计算摘要：状态、能量、收敛性、晶胞、原子表、INCAR 参数、NEB 映像能量。
//!
//! ## 依赖关系
//! - 使用 `cli/summary.rs` 定义的参数
//! - 使用 `calculator/`
//! - 使用 `tabled` 打印表格

use crate::calculator::{CalcRequest, Calculator, Hooks, Jasp};
use crate::cli::summary::SumArgs;
use crate::config::JaspRc;
use crate::error::Result;
use crate::utils::output;

use tabled::{Table, Tabled};

/// 原子表行
#[derive(Debug, Clone, Tabled)]
struct AtomRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "x (Å)")]
    x: String,
    #[tabled(rename = "y (Å)")]
    y: String,
    #[tabled(rename = "z (Å)")]
    z: String,
    #[tabled(rename = "Fixed")]
    fixed: String,
    #[tabled(rename = "|F| (eV/Å)")]
    force: String,
}

/// 参数表行
#[derive(Debug, Clone, Tabled)]
struct ParamRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Parameter")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// NEB 映像行
#[derive(Debug, Clone, Tabled)]
struct ImageRow {
    #[tabled(rename = "Image")]
    image: String,
    #[tabled(rename = "Energy (eV)")]
    energy: String,
    #[tabled(rename = "ΔE (eV)")]
    delta: String,
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.*}", precision, v))
}

/// 执行 sum 命令
pub fn execute(args: SumArgs, rc: JaspRc) -> Result<()> {
    let jasp = Jasp::from_rc(rc, Hooks::none())?;
    let calc = jasp.calculator(&args.dir, CalcRequest::new())?;

    output::print_header(&format!("Calculation Summary: {}", calc.dir().display()));
    print_overview(&calc);

    if let Some(atoms) = calc.atoms() {
        output::print_separator();
        let (a, b, c, alpha, beta, gamma) = atoms.lattice.parameters();
        output::print_field("Formula", &atoms.formula());
        output::print_field("a, b, c (Å)", &format!("{:.4} {:.4} {:.4}", a, b, c));
        output::print_field(
            "α, β, γ (°)",
            &format!("{:.2} {:.2} {:.2}", alpha, beta, gamma),
        );
        output::print_field("Volume (Å³)", &format!("{:.3}", atoms.lattice.volume()));

        let rows: Vec<AtomRow> = atoms
            .atoms
            .iter()
            .enumerate()
            .map(|(i, atom)| AtomRow {
                index: i,
                symbol: atom.symbol.clone(),
                x: format!("{:.5}", atom.position[0]),
                y: format!("{:.5}", atom.position[1]),
                z: format!("{:.5}", atom.position[2]),
                fixed: atom
                    .fixed
                    .map(|f| f.iter().map(|&x| if x { 'F' } else { 'T' }).collect::<String>())
                    .unwrap_or_default(),
                force: fmt_opt(atom.rms_force(), 3),
            })
            .collect();
        println!("\n{}", Table::new(&rows));
    }

    let params: Vec<ParamRow> = calc
        .config()
        .iter()
        .map(|(category, name, value)| ParamRow {
            category: category.to_string(),
            name: name.to_uppercase(),
            value: value.to_string(),
        })
        .collect();
    if !params.is_empty() {
        println!("\n{}", Table::new(&params));
    }

    if let Some(neb) = calc.neb() {
        let reference = neb.energies.first().copied().flatten();
        let rows: Vec<ImageRow> = neb
            .energies
            .iter()
            .enumerate()
            .map(|(i, e)| ImageRow {
                image: format!("{:02}", i),
                energy: fmt_opt(*e, 4),
                delta: fmt_opt(e.zip(reference).map(|(e, r)| e - r), 4),
            })
            .collect();
        println!("\n{}", Table::new(&rows));
    }

    Ok(())
}

fn print_overview(calc: &Calculator) {
    output::print_field("State", &calc.state().to_string());
    if let Ok(Some(job)) = calc.job() {
        output::print_field("Job", job.id());
    }
    if let Some(uuid) = calc.metadata().uuid() {
        output::print_field("uuid", uuid);
    }

    let converged = match calc.converged() {
        Some(true) => "yes",
        Some(false) => "no",
        None => "unknown",
    };
    output::print_field("Converged", converged);
    output::print_field("Energy (eV)", &fmt_opt(calc.energy(), 6));

    if let Some(results) = calc.results() {
        output::print_field("Energy/atom (eV)", &fmt_opt(results.energy_per_atom(), 6));
        output::print_field("Max force (eV/Å)", &fmt_opt(results.max_force(), 4));
        output::print_field("Magnetic moment", &fmt_opt(results.magnetic_moment, 4));
        if let Some(stress) = results.stress_gpa {
            let text: Vec<String> = stress.iter().map(|s| format!("{:.3}", s)).collect();
            output::print_field("Stress (GPa)", &text.join(" "));
        }
        if let Some(seconds) = results.elapsed_seconds {
            output::print_field("Elapsed (s)", &format!("{:.1}", seconds));
        }
    }
}
