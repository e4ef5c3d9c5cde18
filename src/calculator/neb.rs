//! # NEB 多映像计算
//!
//! 映像目录为 `00..NN`，`00` 与 `NN` 是端点。端点能量在初始化时从端点
//! 目录的计算结果中取得并记录在 METADATA 中，中间映像能量从各自的 OUTCAR 读取。

use crate::error::{JaspError, Result};
use crate::models::AtomicStructure;
use crate::parsers::outcar::parse_outcar;
use crate::parsers::poscar::{parse_poscar_file, write_poscar};
use crate::parsers::{Metadata, SortOrder};
use std::path::{Path, PathBuf};

const INITIAL_ENERGY_KEY: &str = "neb.initial_energy";
const FINAL_ENERGY_KEY: &str = "neb.final_energy";

/// NEB 初始化请求：完整映像序列与两个已完成的端点目录
#[derive(Debug, Clone)]
pub struct NebRequest {
    pub images: Vec<AtomicStructure>,
    pub initial_dir: PathBuf,
    pub final_dir: PathBuf,
}

/// NEB 映像与能量
#[derive(Debug, Clone, PartialEq)]
pub struct NebImages {
    /// 全部映像，含两个端点（用户原子顺序）
    pub images: Vec<AtomicStructure>,
    /// 每个映像的能量；未知时为 None
    pub energies: Vec<Option<f64>>,
}

/// 第 i 个映像的目录
pub fn image_dir(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("{:02}", index))
}

impl NebImages {
    /// 由映像序列和端点能量构造
    pub fn new(images: Vec<AtomicStructure>, initial: f64, last: f64) -> Self {
        let n = images.len();
        let mut energies = vec![None; n];
        if n > 0 {
            energies[0] = Some(initial);
            energies[n - 1] = Some(last);
        }
        NebImages { images, energies }
    }

    /// 中间映像数
    pub fn intermediate(&self) -> usize {
        self.images.len().saturating_sub(2)
    }

    /// 从目录恢复：`intermediate` 个中间映像加两个端点
    pub fn read(
        dir: &Path,
        intermediate: usize,
        sort: Option<&SortOrder>,
        metadata: &Metadata,
    ) -> Result<Self> {
        let count = intermediate + 2;
        let mut images = Vec::with_capacity(count);
        let mut energies = Vec::with_capacity(count);

        for i in 0..count {
            let image = image_dir(dir, i);
            let contcar = image.join("CONTCAR");
            let is_endpoint = i == 0 || i == count - 1;
            let path = if !is_endpoint && contcar.exists() {
                contcar
            } else {
                image.join("POSCAR")
            };
            if !path.exists() {
                return Err(JaspError::FileNotFound {
                    path: path.display().to_string(),
                });
            }

            let structure = parse_poscar_file(&path, None)?;
            images.push(match sort {
                Some(order) if order.len() == structure.len() => {
                    structure.reordered(&order.resort)
                }
                _ => structure,
            });

            let energy = if i == 0 {
                metadata.get_f64(INITIAL_ENERGY_KEY)
            } else if i == count - 1 {
                metadata.get_f64(FINAL_ENERGY_KEY)
            } else {
                let outcar = image.join("OUTCAR");
                if outcar.exists() {
                    parse_outcar(&outcar)?.energy_ev
                } else {
                    None
                }
            };
            energies.push(energy);
        }

        Ok(NebImages { images, energies })
    }

    /// 每个映像目录写一个按元素排序的 POSCAR，返回排序
    pub fn write_images(&self, dir: &Path) -> Result<SortOrder> {
        let first = self.images.first().ok_or_else(|| {
            JaspError::InvalidArgument("NEB calculation has no images".to_string())
        })?;
        let order = SortOrder::by_species(first);

        for (i, image) in self.images.iter().enumerate() {
            let target = image_dir(dir, i);
            std::fs::create_dir_all(&target).map_err(|e| JaspError::write(&target, e))?;
            write_poscar(&target.join("POSCAR"), &image.reordered(&order.sort))?;
        }
        Ok(order)
    }

    /// 端点能量写入 METADATA
    pub fn record_endpoints(&self, metadata: &mut Metadata) {
        if let Some(Some(e)) = self.energies.first() {
            metadata.set(INITIAL_ENERGY_KEY, *e);
        }
        if let Some(Some(e)) = self.energies.last() {
            metadata.set(FINAL_ENERGY_KEY, *e);
        }
    }

    /// 全部中间映像都完成并达到离子收敛
    pub fn converged(&self, dir: &Path, ediff: Option<f64>) -> Result<bool> {
        for i in 1..=self.intermediate() {
            let outcar = image_dir(dir, i).join("OUTCAR");
            if !outcar.exists() || !parse_outcar(&outcar)?.converged(ediff, true) {
                return Ok(false);
            }
        }
        Ok(self.intermediate() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Atom, Lattice};

    fn image(x: f64) -> AtomicStructure {
        AtomicStructure::new(
            "HCu",
            Lattice::cubic(8.0),
            vec![Atom::new("Cu", [0.0; 3]), Atom::new("H", [x, 0.5, 0.5])],
        )
    }

    #[test]
    fn test_write_and_read_images() {
        let dir = tempfile::tempdir().unwrap();
        let neb = NebImages::new(vec![image(1.0), image(1.5), image(2.0)], -10.0, -10.5);
        let order = neb.write_images(dir.path()).unwrap();
        assert!(dir.path().join("00/POSCAR").exists());
        assert!(dir.path().join("02/POSCAR").exists());

        let mut metadata = Metadata::default();
        neb.record_endpoints(&mut metadata);

        let restored = NebImages::read(dir.path(), 1, Some(&order), &metadata).unwrap();
        assert_eq!(restored.images.len(), 3);
        assert_eq!(restored.energies, vec![Some(-10.0), None, Some(-10.5)]);
        assert!(!restored.images[1].geometry_differs(&image(1.5)));
    }

    #[test]
    fn test_missing_image_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = NebImages::read(dir.path(), 2, None, &Metadata::default()).unwrap_err();
        assert!(matches!(err, JaspError::FileNotFound { .. }));
    }

    #[test]
    fn test_not_converged_without_outcars() {
        let dir = tempfile::tempdir().unwrap();
        let neb = NebImages::new(vec![image(1.0), image(1.5), image(2.0)], -1.0, -1.0);
        assert!(!neb.converged(dir.path(), None).unwrap());
    }
}
