//! # VASP POSCAR 格式解析器
//!
//! 解析与写出 VASP POSCAR/CONTCAR 文件，以及记录原子排序的 `ase-sort.dat`。
//!
//! ## POSCAR 格式说明
//! ```text
//! Comment line (structure name)
//! 1.0                    # scaling factor
//! a1 a2 a3               # lattice vector a
//! b1 b2 b3               # lattice vector b
//! c1 c2 c3               # lattice vector c
//! Element1 Element2 ...  # element symbols (VASP 5+)
//! n1 n2 ...              # number of atoms per element
//! Selective dynamics     # optional
//! Direct/Cartesian       # coordinate type
//! x1 y1 z1 [T T F]       # atom positions
//! ...
//! ```
//!
//! 写出 POSCAR 时原子按元素分组，`ase-sort.dat` 每行记录
//! `sort[i] resort[i]`，用于把 CONTCAR 中的原子恢复为用户原始顺序。
//!
//! ## 依赖关系
//! - 被 `calculator/` 使用
//! - 使用 `models/structure.rs`

use crate::error::{JaspError, Result};
use crate::models::{Atom, AtomicStructure, Lattice};
use std::fs;
use std::path::Path;

/// 解析 POSCAR/CONTCAR 文件
///
/// `symbols` 用于 VASP 4 格式（无元素行）时按 POTCAR 顺序命名元素。
pub fn parse_poscar_file(path: &Path, symbols: Option<&[String]>) -> Result<AtomicStructure> {
    let content = fs::read_to_string(path).map_err(|e| JaspError::read(path, e))?;
    parse_poscar_content(&content, symbols).map_err(|reason| JaspError::parse("poscar", path, reason))
}

/// 从字符串内容解析 POSCAR 格式
pub fn parse_poscar_content(
    content: &str,
    symbols: Option<&[String]>,
) -> std::result::Result<AtomicStructure, String> {
    let lines: Vec<&str> = content.lines().collect();

    if lines.len() < 8 {
        return Err("File too short".to_string());
    }

    // Line 0: Comment/name
    let name = lines[0].trim().to_string();

    // Line 1: Scaling factor
    let scale: f64 = lines[1]
        .split_whitespace()
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| "Invalid scaling factor".to_string())?;

    // Lines 2-4: Lattice vectors
    let mut matrix = [[0.0; 3]; 3];
    for (i, row) in matrix.iter_mut().enumerate() {
        let parts: Vec<f64> = lines[2 + i]
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect();
        if parts.len() < 3 {
            return Err(format!("Invalid lattice vector at line {}", 3 + i));
        }
        *row = [parts[0] * scale, parts[1] * scale, parts[2] * scale];
    }
    let lattice = Lattice::from_vectors(matrix);

    // Line 5: Element symbols (VASP 5+) or atom counts (VASP 4)
    let line5_parts: Vec<&str> = lines[5].split_whitespace().collect();
    let first_is_count = line5_parts
        .first()
        .map(|s| s.parse::<usize>().is_ok())
        .unwrap_or(false);

    let (elements, counts, mut coord_line) = if first_is_count {
        let counts: Vec<usize> = line5_parts.iter().filter_map(|s| s.parse().ok()).collect();
        let elements: Vec<String> = match symbols {
            Some(s) if s.len() >= counts.len() => s[..counts.len()].to_vec(),
            _ => (0..counts.len()).map(|i| format!("X{}", i + 1)).collect(),
        };
        (elements, counts, 6)
    } else {
        // "Si_pv/abc123" 这类带后缀的符号只保留元素部分
        let elements: Vec<String> = line5_parts
            .iter()
            .map(|s| s.split(['_', '/']).next().unwrap_or(s).to_string())
            .collect();
        let counts: Vec<usize> = lines[6]
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect();
        (elements, counts, 7)
    };

    if elements.len() != counts.len() {
        return Err("Element and count lines disagree".to_string());
    }

    // Check for "Selective dynamics" line
    let selective = lines
        .get(coord_line)
        .map(|l| l.trim().to_lowercase().starts_with('s'))
        .unwrap_or(false);
    if selective {
        coord_line += 1;
    }

    let coord_type = lines
        .get(coord_line)
        .ok_or_else(|| "Missing coordinate type line".to_string())?
        .trim()
        .to_lowercase();
    let is_cartesian = coord_type.starts_with('c') || coord_type.starts_with('k');

    // Parse atom positions
    let mut atoms: Vec<Atom> = Vec::new();
    let mut line_idx = coord_line + 1;

    for (elem, &count) in elements.iter().zip(counts.iter()) {
        for _ in 0..count {
            let line = lines
                .get(line_idx)
                .ok_or_else(|| format!("Expected {} atoms", counts.iter().sum::<usize>()))?;
            let words: Vec<&str> = line.split_whitespace().collect();
            let coords: Vec<f64> = words
                .iter()
                .take(3)
                .filter_map(|s| s.parse().ok())
                .collect();
            if coords.len() < 3 {
                return Err(format!("Invalid position at line {}", line_idx + 1));
            }
            let raw = [coords[0], coords[1], coords[2]];
            let position = if is_cartesian {
                [raw[0] * scale, raw[1] * scale, raw[2] * scale]
            } else {
                lattice.to_cartesian(raw)
            };

            let mut atom = Atom::new(elem.clone(), position);
            if selective && words.len() >= 6 {
                let mut fixed = [false; 3];
                for (k, flag) in words[3..6].iter().enumerate() {
                    fixed[k] = flag.to_uppercase().starts_with('F');
                }
                if fixed.iter().any(|&x| x) {
                    atom.fixed = Some(fixed);
                }
            }
            atoms.push(atom);
            line_idx += 1;
        }
    }

    Ok(AtomicStructure::new(name, lattice, atoms))
}

/// 将结构转换为 POSCAR 格式字符串
///
/// 原子按给定顺序写出，相邻同种元素合并为一组；调用方负责事先排序。
pub fn to_poscar_string(structure: &AtomicStructure) -> String {
    // 相邻分组 (元素, 数量)
    let mut groups: Vec<(&str, usize)> = Vec::new();
    for atom in &structure.atoms {
        match groups.last_mut() {
            Some((symbol, count)) if *symbol == atom.symbol => *count += 1,
            _ => groups.push((atom.symbol.as_str(), 1)),
        }
    }

    let mut result = String::new();

    // Line 0: Comment
    let name = if structure.name.is_empty() {
        structure.formula()
    } else {
        structure.name.clone()
    };
    result.push_str(&format!("{}\n", name));

    // Line 1: Scale
    result.push_str("1.0\n");

    // Lines 2-4: Lattice
    for row in &structure.lattice.matrix {
        result.push_str(&format!(
            "  {:22.16}  {:22.16}  {:22.16}\n",
            row[0], row[1], row[2]
        ));
    }

    // Line 5-6: Elements & counts
    let symbols: Vec<&str> = groups.iter().map(|(s, _)| *s).collect();
    let counts: Vec<String> = groups.iter().map(|(_, n)| n.to_string()).collect();
    result.push_str(&format!("   {}\n", symbols.join("   ")));
    result.push_str(&format!("   {}\n", counts.join("   ")));

    let selective = structure.has_constraints();
    if selective {
        result.push_str("Selective dynamics\n");
    }

    result.push_str("Direct\n");

    for atom in &structure.atoms {
        let f = structure.lattice.to_fractional(atom.position);
        result.push_str(&format!("  {:22.16}  {:22.16}  {:22.16}", f[0], f[1], f[2]));
        if selective {
            let fixed = atom.fixed.unwrap_or([false; 3]);
            let flags: Vec<&str> = fixed.iter().map(|&x| if x { "F" } else { "T" }).collect();
            result.push_str(&format!("  {}", flags.join(" ")));
        }
        result.push('\n');
    }

    result
}

/// 写出 POSCAR 文件
pub fn write_poscar(path: &Path, structure: &AtomicStructure) -> Result<()> {
    fs::write(path, to_poscar_string(structure)).map_err(|e| JaspError::write(path, e))
}

// ─────────────────────────────────────────────────────────────
// ase-sort.dat
// ─────────────────────────────────────────────────────────────

/// 原子排序：`sort` 把用户顺序映射为 POSCAR 顺序，`resort` 为其逆
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    pub sort: Vec<usize>,
    pub resort: Vec<usize>,
}

impl SortOrder {
    /// 恒等排序
    pub fn identity(n: usize) -> Self {
        SortOrder {
            sort: (0..n).collect(),
            resort: (0..n).collect(),
        }
    }

    /// 按元素首次出现的顺序分组（组内保持原顺序）
    pub fn by_species(structure: &AtomicStructure) -> Self {
        let mut species: Vec<&str> = Vec::new();
        for atom in &structure.atoms {
            if !species.contains(&atom.symbol.as_str()) {
                species.push(atom.symbol.as_str());
            }
        }

        let sort: Vec<usize> = species
            .iter()
            .flat_map(|s| {
                structure
                    .atoms
                    .iter()
                    .enumerate()
                    .filter(move |(_, a)| a.symbol == *s)
                    .map(|(i, _)| i)
            })
            .collect();

        Self::from_sort(sort)
    }

    fn from_sort(sort: Vec<usize>) -> Self {
        let mut resort = vec![0; sort.len()];
        for (n, &m) in sort.iter().enumerate() {
            resort[m] = n;
        }
        SortOrder { sort, resort }
    }

    pub fn len(&self) -> usize {
        self.sort.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sort.is_empty()
    }

    /// 读取 ase-sort.dat
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| JaspError::read(path, e))?;
        let mut sort = Vec::new();
        let mut resort = Vec::new();
        for (n, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let cols: Vec<usize> = line
                .split_whitespace()
                .filter_map(|s| s.parse().ok())
                .collect();
            if cols.len() != 2 {
                return Err(JaspError::parse(
                    "ase-sort.dat",
                    path,
                    format!("expected two integers on line {}", n + 1),
                ));
            }
            sort.push(cols[0]);
            resort.push(cols[1]);
        }

        let n = sort.len();
        if sort.iter().chain(resort.iter()).any(|&i| i >= n) {
            return Err(JaspError::parse("ase-sort.dat", path, "index out of range"));
        }
        Ok(SortOrder { sort, resort })
    }

    /// 写出 ase-sort.dat
    pub fn write(&self, path: &Path) -> Result<()> {
        let content: String = self
            .sort
            .iter()
            .zip(self.resort.iter())
            .map(|(s, r)| format!("{:5} {:5}\n", s, r))
            .collect();
        fs::write(path, content).map_err(|e| JaspError::write(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_poscar_vasp5() {
        let content = r#"NaCl
1.0
5.64 0.0 0.0
0.0 5.64 0.0
0.0 0.0 5.64
Na Cl
4 4
Direct
0.0 0.0 0.0
0.5 0.5 0.0
0.5 0.0 0.5
0.0 0.5 0.5
0.5 0.0 0.0
0.0 0.5 0.0
0.0 0.0 0.5
0.5 0.5 0.5
"#;
        let s = parse_poscar_content(content, None).unwrap();
        assert_eq!(s.name, "NaCl");
        assert_eq!(s.len(), 8);
        assert_eq!(s.formula(), "Cl4Na4");
        assert!((s.atoms[7].position[0] - 2.82).abs() < 1e-12);
    }

    #[test]
    fn test_parse_poscar_vasp4_uses_potcar_symbols() {
        let content = "Si\n1.0\n5.4 0 0\n0 5.4 0\n0 0 5.4\n2\nDirect\n0 0 0\n0.25 0.25 0.25\n";
        let symbols = vec!["Si".to_string()];
        let s = parse_poscar_content(content, Some(&symbols)).unwrap();
        assert_eq!(s.symbols(), vec!["Si", "Si"]);

        let s = parse_poscar_content(content, None).unwrap();
        assert_eq!(s.symbols(), vec!["X1", "X1"]);
    }

    #[test]
    fn test_parse_poscar_with_scale() {
        let content = "Si\n2.0\n2.0 0.0 0.0\n0.0 2.0 0.0\n0.0 0.0 2.0\nSi\n2\nCartesian\n0.0 0.0 0.0\n1.0 1.0 1.0\n";
        let s = parse_poscar_content(content, None).unwrap();
        let (a, _, _, _, _, _) = s.lattice.parameters();
        assert!((a - 4.0).abs() < 0.01);
        assert_eq!(s.atoms[1].position, [2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_parse_poscar_selective_dynamics() {
        let content = r#"Fe with selective
1.0
2.87 0.0 0.0
0.0 2.87 0.0
0.0 0.0 2.87
Fe
2
Selective dynamics
Direct
0.0 0.0 0.0 T T T
0.5 0.5 0.5 F F T
"#;
        let s = parse_poscar_content(content, None).unwrap();
        assert_eq!(s.atoms[0].fixed, None);
        assert_eq!(s.atoms[1].fixed, Some([true, true, false]));
    }

    #[test]
    fn test_written_poscar_reads_back_same_geometry() {
        let lattice = Lattice::from_vectors([[4.0, 0.0, 0.0], [1.0, 4.0, 0.0], [0.0, 0.3, 4.0]]);
        let atoms = vec![
            Atom::new("Ti", [0.1, 0.2, 0.3]),
            Atom::new("O", [2.5, 2.1, 0.7]).with_fixed([true, false, false]),
            Atom::new("O", [1.3, 0.4, 2.2]),
        ];
        let s = AtomicStructure::new("TiO2", lattice, atoms);

        let text = to_poscar_string(&s);
        assert!(text.contains("Selective dynamics"));

        let parsed = parse_poscar_content(&text, None).unwrap();
        assert!(!s.geometry_differs(&parsed));
        assert_eq!(parsed.atoms[1].fixed, Some([true, false, false]));
        assert_eq!(parsed.atoms[0].fixed, None);
    }

    #[test]
    fn test_sort_by_species() {
        let s = AtomicStructure::new(
            "mix",
            Lattice::cubic(5.0),
            vec![
                Atom::new("O", [0.0; 3]),
                Atom::new("H", [1.0; 3]),
                Atom::new("O", [2.0; 3]),
                Atom::new("H", [3.0; 3]),
            ],
        );
        let order = SortOrder::by_species(&s);
        assert_eq!(order.sort, vec![0, 2, 1, 3]);
        assert_eq!(order.resort, vec![0, 2, 1, 3]);

        let sorted = s.reordered(&order.sort);
        assert_eq!(sorted.symbols(), vec!["O", "O", "H", "H"]);
        let restored = sorted.reordered(&order.resort);
        assert_eq!(restored, s);
    }

    #[test]
    fn test_sort_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ase-sort.dat");
        let order = SortOrder {
            sort: vec![2, 0, 1],
            resort: vec![1, 2, 0],
        };
        order.write(&path).unwrap();
        assert_eq!(SortOrder::read(&path).unwrap(), order);
    }
}
