//! # 原子结构数据模型
//!
//! 计算目录中的原子结构：有序原子列表 + 3×3 晶胞 + 逐原子逐轴约束。
//! 力只有在计算收敛时才有意义，由 `Calculator` 在读取结果后填入。
//!
//! ## 依赖关系
//! - 被 `parsers/poscar.rs`, `calculator/` 使用
//! - 无外部模块依赖

use serde::{Deserialize, Serialize};

/// 晶格参数表示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    /// 晶格向量矩阵 (3x3)，行向量表示 a, b, c（单位 Å）
    pub matrix: [[f64; 3]; 3],
}

impl Lattice {
    /// 从晶格向量矩阵创建
    pub fn from_vectors(matrix: [[f64; 3]; 3]) -> Self {
        Lattice { matrix }
    }

    /// 立方晶胞
    pub fn cubic(a: f64) -> Self {
        Lattice {
            matrix: [[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]],
        }
    }

    /// 获取晶格参数 (a, b, c, alpha, beta, gamma)，角度单位：度
    pub fn parameters(&self) -> (f64, f64, f64, f64, f64, f64) {
        let [a_vec, b_vec, c_vec] = self.matrix;

        let a = norm(a_vec);
        let b = norm(b_vec);
        let c = norm(c_vec);

        let alpha = (dot(b_vec, c_vec) / (b * c)).acos().to_degrees();
        let beta = (dot(a_vec, c_vec) / (a * c)).acos().to_degrees();
        let gamma = (dot(a_vec, b_vec) / (a * b)).acos().to_degrees();

        (a, b, c, alpha, beta, gamma)
    }

    /// 计算晶格体积（带符号的行列式）
    pub fn volume(&self) -> f64 {
        let [a, b, c] = self.matrix;
        a[0] * (b[1] * c[2] - b[2] * c[1]) - a[1] * (b[0] * c[2] - b[2] * c[0])
            + a[2] * (b[0] * c[1] - b[1] * c[0])
    }

    /// 分数坐标转笛卡尔坐标
    pub fn to_cartesian(&self, frac: [f64; 3]) -> [f64; 3] {
        let m = self.matrix;
        [
            frac[0] * m[0][0] + frac[1] * m[1][0] + frac[2] * m[2][0],
            frac[0] * m[0][1] + frac[1] * m[1][1] + frac[2] * m[2][1],
            frac[0] * m[0][2] + frac[1] * m[1][2] + frac[2] * m[2][2],
        ]
    }

    /// 笛卡尔坐标转分数坐标；退化晶胞时原样返回
    pub fn to_fractional(&self, cart: [f64; 3]) -> [f64; 3] {
        let m = self.matrix;
        let det = self.volume();

        if det.abs() < 1e-10 {
            return cart;
        }

        let inv = [
            [
                (m[1][1] * m[2][2] - m[1][2] * m[2][1]) / det,
                (m[0][2] * m[2][1] - m[0][1] * m[2][2]) / det,
                (m[0][1] * m[1][2] - m[0][2] * m[1][1]) / det,
            ],
            [
                (m[1][2] * m[2][0] - m[1][0] * m[2][2]) / det,
                (m[0][0] * m[2][2] - m[0][2] * m[2][0]) / det,
                (m[0][2] * m[1][0] - m[0][0] * m[1][2]) / det,
            ],
            [
                (m[1][0] * m[2][1] - m[1][1] * m[2][0]) / det,
                (m[0][1] * m[2][0] - m[0][0] * m[2][1]) / det,
                (m[0][0] * m[1][1] - m[0][1] * m[1][0]) / det,
            ],
        ];

        // 行向量约定：cart = frac · M，因此 frac = cart · M⁻¹
        [
            cart[0] * inv[0][0] + cart[1] * inv[1][0] + cart[2] * inv[2][0],
            cart[0] * inv[0][1] + cart[1] * inv[1][1] + cart[2] * inv[2][1],
            cart[0] * inv[0][2] + cart[1] * inv[1][2] + cart[2] * inv[2][2],
        ]
    }
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

/// 几何比较容差 (Å)
pub const GEOMETRY_TOLERANCE: f64 = 1e-8;

fn close(a: [f64; 3], b: [f64; 3]) -> bool {
    a.iter()
        .zip(b.iter())
        .all(|(x, y)| (x - y).abs() <= GEOMETRY_TOLERANCE)
}

/// 原子信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// 元素符号
    pub symbol: String,

    /// 笛卡尔坐标 [x, y, z]（Å）
    pub position: [f64; 3],

    /// 可选整数标签
    pub tag: Option<i64>,

    /// 初始磁矩
    pub magmom: Option<f64>,

    /// 约束掩码，true 表示该方向固定
    pub fixed: Option<[bool; 3]>,

    /// 受力 (eV/Å)，仅在收敛后填充
    pub force: Option<[f64; 3]>,
}

impl Atom {
    pub fn new(symbol: impl Into<String>, position: [f64; 3]) -> Self {
        Atom {
            symbol: symbol.into(),
            position,
            tag: None,
            magmom: None,
            fixed: None,
            force: None,
        }
    }

    pub fn with_tag(mut self, tag: i64) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn with_magmom(mut self, magmom: f64) -> Self {
        self.magmom = Some(magmom);
        self
    }

    pub fn with_fixed(mut self, fixed: [bool; 3]) -> Self {
        self.fixed = Some(fixed);
        self
    }

    /// 是否有任一方向被固定
    pub fn is_constrained(&self) -> bool {
        self.fixed.map(|f| f.iter().any(|&x| x)).unwrap_or(false)
    }

    /// 受力大小
    pub fn rms_force(&self) -> Option<f64> {
        self.force.map(norm)
    }
}

/// 原子结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomicStructure {
    /// 结构名称（POSCAR 注释行）
    pub name: String,

    /// 晶格
    pub lattice: Lattice,

    /// 原子列表
    pub atoms: Vec<Atom>,
}

impl AtomicStructure {
    pub fn new(name: impl Into<String>, lattice: Lattice, atoms: Vec<Atom>) -> Self {
        AtomicStructure {
            name: name.into(),
            lattice,
            atoms,
        }
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// 元素符号列表（按原子顺序）
    pub fn symbols(&self) -> Vec<&str> {
        self.atoms.iter().map(|a| a.symbol.as_str()).collect()
    }

    /// 是否带有任何约束
    pub fn has_constraints(&self) -> bool {
        self.atoms.iter().any(|a| a.is_constrained())
    }

    /// 是否有受力数据
    pub fn has_forces(&self) -> bool {
        !self.atoms.is_empty() && self.atoms.iter().all(|a| a.force.is_some())
    }

    /// 清除受力数据
    pub fn clear_forces(&mut self) {
        for atom in &mut self.atoms {
            atom.force = None;
        }
    }

    /// 判断几何是否不同：元素、位置、晶胞、约束。受力与磁矩不参与比较。
    ///
    /// 坐标与晶胞按 `GEOMETRY_TOLERANCE` 比较，吸收 POSCAR 读写的舍入误差。
    pub fn geometry_differs(&self, other: &AtomicStructure) -> bool {
        if self.atoms.len() != other.atoms.len() {
            return true;
        }
        let cell_differs = self
            .lattice
            .matrix
            .iter()
            .zip(other.lattice.matrix.iter())
            .any(|(a, b)| !close(*a, *b));
        if cell_differs {
            return true;
        }
        self.atoms.iter().zip(other.atoms.iter()).any(|(a, b)| {
            a.symbol != b.symbol
                || !close(a.position, b.position)
                || a.fixed.unwrap_or_default() != b.fixed.unwrap_or_default()
        })
    }

    /// 采用另一结构的晶胞与坐标（原子数一致时）
    pub fn adopt_geometry(&mut self, other: &AtomicStructure) {
        if self.atoms.len() != other.atoms.len() {
            return;
        }
        self.lattice = other.lattice.clone();
        for (mine, theirs) in self.atoms.iter_mut().zip(other.atoms.iter()) {
            mine.position = theirs.position;
            mine.force = theirs.force;
        }
    }

    /// 按给定索引重新排列：结果第 i 个原子为 self.atoms[order[i]]
    pub fn reordered(&self, order: &[usize]) -> AtomicStructure {
        let atoms = order
            .iter()
            .filter_map(|&i| self.atoms.get(i).cloned())
            .collect();
        AtomicStructure::new(self.name.clone(), self.lattice.clone(), atoms)
    }

    /// 计算化学式
    pub fn formula(&self) -> String {
        use std::collections::BTreeMap;
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

        for atom in &self.atoms {
            *counts.entry(atom.symbol.as_str()).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .map(|(el, count)| {
                if count == 1 {
                    el.to_string()
                } else {
                    format!("{}{}", el, count)
                }
            })
            .collect::<Vec<_>>()
            .join("")
    }
}
