//! # VASP 计算结果数据模型
//!
//! 存储从 OUTCAR 中提取的结果：能量、受力、应力、磁矩、收敛信息等。
//!
//! ## 依赖关系
//! - 被 `parsers/outcar.rs` 填充
//! - 被 `calculator/`, `commands/collect.rs`, `commands/summary.rs` 使用

use serde::{Deserialize, Serialize};

/// 未设置 EDIFF 时 VASP 的默认值
pub const DEFAULT_EDIFF: f64 = 1e-4;

/// VASP 计算结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalcResults {
    /// 计算是否正常结束（OUTCAR 末尾的计时信息）
    pub is_finished: bool,

    /// 能量 energy(sigma->0) (eV)
    pub energy_ev: Option<f64>,

    /// 自由能 TOTEN (eV)
    pub free_energy_ev: Option<f64>,

    /// 受力 (eV/Å)，最后一个离子步，按 POSCAR 原子顺序
    pub forces: Vec<[f64; 3]>,

    /// 应力 (GPa)，Voigt 顺序 xx yy zz yz zx xy
    pub stress_gpa: Option<[f64; 6]>,

    /// 总磁矩 (μB)
    pub magnetic_moment: Option<f64>,

    /// OUTCAR 中记录的 EDIFF
    pub ediff: Option<f64>,

    /// 最后一个电子步的能量变化
    pub last_energy_change: Option<f64>,

    /// 离子弛豫是否达到要求精度
    pub reached_accuracy: bool,

    /// VASP 估计的内存 (GB)
    pub memory_gb: Option<f64>,

    /// VASP 自行修改的能带数 (原请求, 实际使用)
    pub bands_changed: Option<(Option<i64>, i64)>,

    /// 运行耗时 (s)
    pub elapsed_seconds: Option<f64>,

    /// 离子步数（最后一个 Iteration 行的离子步编号）
    pub ionic_steps: Option<usize>,

    /// 原子数
    pub num_atoms: Option<usize>,

    /// 体积 (Å³)
    pub volume: Option<f64>,
}

impl CalcResults {
    /// 判断是否收敛
    ///
    /// 结束 ∧ 最后电子步能量变化 < EDIFF ∧（非离子弛豫 ∨ 已达到精度）
    pub fn converged(&self, ediff: Option<f64>, relaxation: bool) -> bool {
        if !self.is_finished {
            return false;
        }
        let ediff = self.ediff.or(ediff).unwrap_or(DEFAULT_EDIFF);
        let electronic = match self.last_energy_change {
            Some(de) => de.abs() < ediff,
            None => false,
        };
        electronic && (!relaxation || self.reached_accuracy)
    }

    /// 每原子能量
    pub fn energy_per_atom(&self) -> Option<f64> {
        match (self.energy_ev, self.num_atoms) {
            (Some(e), Some(n)) if n > 0 => Some(e / n as f64),
            _ => None,
        }
    }

    /// 最大受力
    pub fn max_force(&self) -> Option<f64> {
        self.forces
            .iter()
            .map(|f| (f[0] * f[0] + f[1] * f[1] + f[2] * f[2]).sqrt())
            .fold(None, |acc, x| Some(acc.map_or(x, |m: f64| m.max(x))))
    }
}
