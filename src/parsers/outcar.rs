//! # VASP OUTCAR 解析器
//!
//! 解析 VASP 计算输出文件 OUTCAR，提取能量、受力、应力、磁矩、收敛判据、
//! 内存估计和能带数变化等信息。
//!
//! ## 依赖关系
//! - 被 `calculator/`, `commands/collect.rs` 使用
//! - 使用 `models/calculation.rs`

use crate::error::{JaspError, Result};
use crate::models::CalcResults;
use regex::Regex;
use std::fs;
use std::path::Path;

const FINISHED_MARKER: &str = "General timing and accounting informations for this job";
const BANDS_CHANGED_MARKER: &str =
    "The number of bands has been changed from the values supplied";

/// 解析 VASP OUTCAR 文件
pub fn parse_outcar(path: &Path) -> Result<CalcResults> {
    let content = fs::read_to_string(path).map_err(|e| JaspError::read(path, e))?;
    Ok(parse_outcar_content(&content))
}

fn parse_ionic_step(line: &str) -> Option<usize> {
    let (head, _) = line.split_once('(')?;
    head.split_whitespace().last()?.parse().ok()
}

/// 从字符串内容解析 OUTCAR
pub fn parse_outcar_content(content: &str) -> CalcResults {
    let lines: Vec<&str> = content.lines().collect();
    let mut result = CalcResults::default();

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];

        // 检查是否完成
        if line.contains(FINISHED_MARKER) {
            result.is_finished = true;
        }

        // "energy  without entropy=     -123.456789  energy(sigma->0) =     -123.456789"
        if line.contains("energy  without entropy") {
            if let Some(pos) = line.find("energy(sigma->0)") {
                if let Some(val) = extract_number_after(&line[pos..], "=") {
                    result.energy_ev = Some(val);
                }
            }
        }

        // "free  energy   TOTEN  =      -123.456789 eV"
        if line.contains("free  energy   TOTEN") {
            if let Some(val) = extract_number_after(line, "=") {
                result.free_energy_ev = Some(val);
            }
        }

        // "  in kB     -1.23     -1.23 ..."，kBar 转 GPa 并换成 Voigt 顺序
        if line.trim_start().starts_with("in kB") {
            let vals: Vec<f64> = line
                .split_whitespace()
                .skip(2)
                .filter_map(|w| w.parse().ok())
                .collect();
            if vals.len() == 6 {
                let s = |k: usize| -0.1 * vals[k];
                result.stress_gpa = Some([s(0), s(1), s(2), s(4), s(5), s(3)]);
            }
        }

        // "number of electron      16.0000000 magnetization       2.0000000"
        if line.contains("number of electron") && line.contains("magnetization") {
            if let Some(val) = extract_last_number(line) {
                result.magnetic_moment = Some(val);
            }
        }

        // "   EDIFF  = 0.1E-03   stopping-criterion for ELM"
        if line.trim_start().starts_with("EDIFF ") || line.trim_start().starts_with("EDIFF=") {
            if let Some(val) = extract_number_after(line, "=") {
                result.ediff = Some(val);
            }
        }

        // "  total energy-change (2. order) :-0.1234567E-03  (-0.1234E-03)"
        if line.contains("total energy-change") {
            if let Some(pos) = line.find(':') {
                let rest = &line[pos + 1..];
                let value = rest.split('(').next().unwrap_or("").trim();
                if let Ok(val) = value.parse::<f64>() {
                    result.last_energy_change = Some(val);
                }
            }
        }

        if line.contains("reached required accuracy") {
            result.reached_accuracy = true;
        }

        // " total amount of memory used by VASP MPI-rank0    30516. kBytes"
        if result.memory_gb.is_none() && line.contains("total amount of memory used by VASP") {
            let words: Vec<&str> = line.split_whitespace().collect();
            if words.len() >= 2 {
                if let Ok(kb) = words[words.len() - 2].parse::<f64>() {
                    result.memory_gb = Some(kb / 1e6);
                }
            }
        }

        if line.contains(BANDS_CHANGED_MARKER) {
            if let Some(change) = find_bands_change(&lines[i..]) {
                result.bands_changed = Some(change);
            }
        }

        // "----------------------- Iteration      3(   7)  -----------------------"
        if line.contains("- Iteration") {
            if let Some(step) = parse_ionic_step(line) {
                result.ionic_steps = Some(step);
            }
        }

        // "   NIONS =       8"
        if line.contains("NIONS =") {
            if let Some(val) = extract_last_number(line) {
                result.num_atoms = Some(val as usize);
            }
        }

        // "  volume of cell :      123.456789"
        if line.contains("volume of cell") {
            if let Some(val) = extract_last_number(line) {
                result.volume = Some(val);
            }
        }

        // "  Elapsed time (sec):      123.456"
        if line.contains("Elapsed time (sec):") {
            if let Some(val) = extract_last_number(line) {
                result.elapsed_seconds = Some(val);
            }
        }

        // 受力块：表头、分隔线、逐原子行、分隔线
        if line.contains("TOTAL-FORCE (eV/Angst)") {
            let (forces, consumed) = read_force_block(&lines[i + 1..]);
            result.forces = forces;
            i += consumed;
        }

        i += 1;
    }

    result
}

/// 读取受力块，返回受力与消耗的行数
fn read_force_block(lines: &[&str]) -> (Vec<[f64; 3]>, usize) {
    let mut forces = Vec::new();
    let mut consumed = 0;

    for (k, line) in lines.iter().enumerate() {
        consumed = k + 1;
        if line.trim_start().starts_with("---") {
            if k == 0 {
                continue;
            }
            break;
        }
        let vals: Vec<f64> = line
            .split_whitespace()
            .filter_map(|w| w.parse().ok())
            .collect();
        if vals.len() < 6 {
            break;
        }
        forces.push([vals[3], vals[4], vals[5]]);
    }

    (forces, consumed)
}

/// 在能带数变化提示之后查找 "I found NBANDS = x now NBANDS = y"
fn find_bands_change(lines: &[&str]) -> Option<(Option<i64>, i64)> {
    let re = Regex::new(r"I found NBANDS\s+=\s+([0-9]*).*=\s+([0-9]+)").ok()?;
    lines.iter().take(8).find_map(|line| {
        let caps = re.captures(line)?;
        let requested = caps.get(1).and_then(|m| m.as_str().parse().ok());
        let used = caps.get(2)?.as_str().parse().ok()?;
        Some((requested, used))
    })
}

/// 从字符串中提取指定标记之后的数字
fn extract_number_after(s: &str, marker: &str) -> Option<f64> {
    let pos = s.find(marker)?;
    let after = &s[pos + marker.len()..];
    after.split_whitespace().next()?.parse().ok()
}

/// 提取字符串中最后一个数字
fn extract_last_number(s: &str) -> Option<f64> {
    s.split_whitespace()
        .filter_map(|w| w.parse::<f64>().ok())
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
   NIONS =       2
   EDIFF  = 0.1E-04   stopping-criterion for ELM
 total amount of memory used by VASP MPI-rank0    30516. kBytes
  volume of cell :       40.00
  total energy-change (2. order) :-0.1000000E-02  (-0.1000E-02)
  total energy-change (2. order) :-0.2000000E-05  (-0.2000E-05)
 number of electron       8.0000000 magnetization       1.5000000
  in kB     -10.0    -20.0    -30.0      1.0      2.0      3.0
 POSITION                                       TOTAL-FORCE (eV/Angst)
 -----------------------------------------------------------------------------------
      0.00000      0.00000      0.00000         0.010000     -0.020000      0.030000
      1.00000      1.00000      1.00000        -0.010000      0.020000     -0.030000
 -----------------------------------------------------------------------------------
  free  energy   TOTEN  =       -10.50000000 eV
  energy  without entropy=      -10.40000000  energy(sigma->0) =      -10.45000000
 reached required accuracy - stopping structural energy minimisation
                  Elapsed time (sec):       12.345
 General timing and accounting informations for this job:
";

    #[test]
    fn test_parse_sample() {
        let r = parse_outcar_content(SAMPLE);
        assert!(r.is_finished);
        assert_eq!(r.num_atoms, Some(2));
        assert_eq!(r.energy_ev, Some(-10.45));
        assert_eq!(r.free_energy_ev, Some(-10.5));
        assert_eq!(r.magnetic_moment, Some(1.5));
        assert_eq!(r.ediff, Some(1e-5));
        assert_eq!(r.last_energy_change, Some(-2e-6));
        assert!(r.reached_accuracy);
        assert_eq!(r.forces.len(), 2);
        assert_eq!(r.forces[1], [-0.01, 0.02, -0.03]);
        assert_eq!(r.elapsed_seconds, Some(12.345));
        assert!((r.memory_gb.unwrap() - 0.030516).abs() < 1e-12);
        assert!(r.converged(None, true));
    }

    #[test]
    fn test_stress_kbar_to_gpa_voigt() {
        let s = parse_outcar_content(SAMPLE).stress_gpa.unwrap();
        let expected = [1.0, 2.0, 3.0, -0.2, -0.3, -0.1];
        for k in 0..6 {
            assert!((s[k] - expected[k]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_bands_changed() {
        let text = "\
 The number of bands has been changed from the values supplied
 in the INCAR file. This is a result of running the parallel version.
 The orbitals not found in the WAVECAR file will be initialized with
 random numbers, which is usually adequate. For correlated
 calculations, however, you should redo the groundstate calculation.
 I found NBANDS    =      9  now  NBANDS  =      12
";
        let r = parse_outcar_content(text);
        assert_eq!(r.bands_changed, Some((Some(9), 12)));
    }

    #[test]
    fn test_unfinished_output() {
        let r = parse_outcar_content("   NIONS =       4\n");
        assert!(!r.is_finished);
        assert!(r.energy_ev.is_none());
        assert!(!r.converged(None, false));
    }

    #[test]
    fn test_ionic_steps_from_last_iteration() {
        let text = "\
----------------------------------------- Iteration    1(   1)  ---------------------------------------
----------------------------------------- Iteration    1(  12)  ---------------------------------------
----------------------------------------- Iteration    2(   1)  ---------------------------------------
----------------------------------------- Iteration    3(   5)  ---------------------------------------
";
        assert_eq!(parse_outcar_content(text).ionic_steps, Some(3));
        assert_eq!(parse_outcar_content(SAMPLE).ionic_steps, None);
    }
}
