//! 按图像或按病人划分 train/val/test.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::labels::patient_id;
use super::{copy_if_absent, ClassLabel, Manifest, ManifestKey, Split};
use crate::consts::{has_image_extension, DEFAULT_TRAIN_PCT, DEFAULT_VAL_PCT};
use crate::{Error, Result};

/// 划分的最小单元.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SplitUnit {
    /// 每张图像独立分配.
    Image,

    /// 同一病人的全部图像分配到同一个集合, 防止病人跨集合泄漏.
    #[default]
    Patient,
}

/// 训练集与验证集比例. 测试集为剩余部分.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SplitRatio {
    train: f64,
    val: f64,
}

impl SplitRatio {
    /// 构建划分比例. 两个比例都必须在 `[0, 1]` 内, 且和不超过 1.
    pub fn new(train: f64, val: f64) -> Result<SplitRatio> {
        let valid = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if valid(train) && valid(val) && train + val <= 1.0 + 1e-9 {
            Ok(Self { train, val })
        } else {
            Err(Error::InvalidSplit { train, val })
        }
    }

    /// 训练集比例.
    #[inline]
    pub fn train(&self) -> f64 {
        self.train
    }

    /// 验证集比例.
    #[inline]
    pub fn val(&self) -> f64 {
        self.val
    }

    /// 测试集比例.
    #[inline]
    pub fn test(&self) -> f64 {
        (1.0 - self.train - self.val).max(0.0)
    }

    /// `n` 个单元时 (train, val, test) 各自的个数.
    ///
    /// 前两者向下取整, 余数全部归入测试集, 三者之和恒为 `n`.
    pub fn counts(&self, n: usize) -> (usize, usize, usize) {
        let train = ((self.train * n as f64) as usize).min(n);
        let val = ((self.val * n as f64) as usize).min(n - train);
        (train, val, n - train - val)
    }
}

impl Default for SplitRatio {
    fn default() -> Self {
        Self {
            train: DEFAULT_TRAIN_PCT,
            val: DEFAULT_VAL_PCT,
        }
    }
}

/// 病人 ID -> 类别 -> 图像路径.
///
/// 同一个病人可以同时拥有良性和恶性图像. 文件名中不含病人 ID 的图像
/// 以 `{类别}/{文件名}` 作为一个单独的组.
#[derive(Clone, Debug, Default)]
pub struct PatientIndex {
    patients: BTreeMap<String, BTreeMap<ClassLabel, Vec<PathBuf>>>,
}

/// 一个划分单元: 按类别归档的图像.
type Unit = BTreeMap<ClassLabel, Vec<PathBuf>>;

impl PatientIndex {
    /// 空索引.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 扫描 `{root}/benign` 与 `{root}/malignant` 下的图像文件 (不递归).
    ///
    /// 不存在的类别目录被记录并视为空.
    pub fn from_class_dirs<P: AsRef<Path>>(root: P) -> Result<PatientIndex> {
        let mut index = Self::new();
        for class in ClassLabel::ALL {
            let dir = root.as_ref().join(class.as_str());
            if !dir.is_dir() {
                warn!("missing class directory: {}", dir.display());
                continue;
            }
            let mut files = vec![];
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.is_file() && has_image_extension(&path) {
                    files.push(path);
                }
            }
            files.sort();
            files.into_iter().for_each(|p| index.insert(class, p));
        }
        Ok(index)
    }

    /// 把一张图像加入索引. 分组键由文件名中的病人 ID 决定.
    pub fn insert(&mut self, class: ClassLabel, path: PathBuf) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let key = patient_id(&name).unwrap_or_else(|| format!("{class}/{name}"));
        self.patients
            .entry(key)
            .or_default()
            .entry(class)
            .or_default()
            .push(path);
    }

    /// 病人 (组) 总数. 同时拥有两类图像的病人只计一次.
    #[inline]
    pub fn patient_count(&self) -> usize {
        self.patients.len()
    }

    /// 分层类别为 `class` 的病人个数. 拥有任一恶性图像的病人分层为恶性.
    pub fn stratum_count(&self, class: ClassLabel) -> usize {
        self.patients
            .values()
            .filter(|images| stratum(images) == Some(class))
            .count()
    }

    /// 某一类别的图像个数.
    pub fn image_count(&self, class: ClassLabel) -> usize {
        self.patients
            .values()
            .filter_map(|images| images.get(&class))
            .map(Vec::len)
            .sum()
    }

    /// 以 `unit` 为粒度, 按确定的顺序列出分层类别为 `class` 的全部划分单元.
    ///
    /// 按病人划分时, 一个单元包含该病人两个类别的全部图像.
    fn units(&self, class: ClassLabel, unit: SplitUnit) -> Vec<Unit> {
        match unit {
            SplitUnit::Patient => self
                .patients
                .values()
                .filter(|images| stratum(images) == Some(class))
                .cloned()
                .collect(),
            SplitUnit::Image => {
                let mut files: Vec<PathBuf> = self
                    .patients
                    .values()
                    .filter_map(|images| images.get(&class))
                    .flatten()
                    .cloned()
                    .collect();
                files.sort();
                files
                    .into_iter()
                    .map(|p| BTreeMap::from([(class, vec![p])]))
                    .collect()
            }
        }
    }
}

/// 病人的分层类别: 有恶性图像即为恶性.
#[inline]
fn stratum(images: &BTreeMap<ClassLabel, Vec<PathBuf>>) -> Option<ClassLabel> {
    images
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(&c, _)| c)
        .max()
}

/// 六个 (划分, 类别) 集合.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DatasetSplit {
    parts: BTreeMap<ManifestKey, Vec<PathBuf>>,
}

impl DatasetSplit {
    /// 某一集合中的图像.
    pub fn get(&self, key: ManifestKey) -> &[PathBuf] {
        self.parts.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 按 [`ManifestKey::ALL`] 的顺序迭代全部集合.
    pub fn iter(&self) -> impl Iterator<Item = (ManifestKey, &[PathBuf])> + '_ {
        ManifestKey::ALL.into_iter().map(|k| (k, self.get(k)))
    }

    /// 某一划分 (两个类别合计) 的图像数.
    pub fn split_len(&self, split: Split) -> usize {
        ClassLabel::ALL
            .iter()
            .map(|&c| self.get(ManifestKey::new(split, c)).len())
            .sum()
    }

    /// 某一集合的清单.
    pub fn manifest(&self, key: ManifestKey) -> Manifest {
        self.get(key).iter().cloned().collect()
    }

    /// 把全部集合写成 `lists_dir` 下的六个标准清单.
    pub fn write_manifests<P: AsRef<Path>>(&self, lists_dir: P) -> Result<()> {
        for key in ManifestKey::ALL {
            self.manifest(key)
                .write(lists_dir.as_ref().join(key.file_name()))?;
        }
        Ok(())
    }

    /// 把图像按文件名复制到 `{out_root}/{split}/{class}`. 返回新复制的文件数.
    ///
    /// 已存在的目标文件保持不变.
    pub fn copy_into<P: AsRef<Path>>(&self, out_root: P) -> Result<usize> {
        let mut copied = 0;
        for (key, files) in self.iter() {
            let dir = key.split_dir(out_root.as_ref());
            fs::create_dir_all(&dir)?;
            for src in files {
                let Some(name) = src.file_name() else {
                    continue;
                };
                if copy_if_absent(src, &dir.join(name))? {
                    copied += 1;
                }
            }
        }
        info!("copied {copied} images into {}", out_root.as_ref().display());
        Ok(copied)
    }
}

/// 按分层类别打乱划分单元并按 `ratio` 切分.
///
/// 按病人划分时, 每个病人只被分配一次 (分层类别见 [`PatientIndex::stratum_count`]),
/// 其两个类别的全部图像都进入同一个划分, 因此任何病人都不会跨集合出现.
///
/// 打乱使用以 `seed` 初始化的 [`StdRng`], 分层按 [`ClassLabel::ALL`] 的顺序处理,
/// 因此相同的索引与种子总是得到相同的划分.
pub fn split_dataset(
    index: &PatientIndex,
    ratio: SplitRatio,
    unit: SplitUnit,
    seed: u64,
) -> DatasetSplit {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut parts: BTreeMap<ManifestKey, Vec<PathBuf>> =
        ManifestKey::ALL.into_iter().map(|k| (k, vec![])).collect();

    for class in ClassLabel::ALL {
        let mut units = index.units(class, unit);
        units.shuffle(&mut rng);
        let (train, val, test) = ratio.counts(units.len());
        info!("{class}: {train}/{val}/{test} {unit:?} units in train/val/test");

        for (i, images) in units.into_iter().enumerate() {
            let split = if i < train {
                Split::Train
            } else if i < train + val {
                Split::Val
            } else {
                Split::Test
            };
            for (image_class, files) in images {
                if let Some(part) = parts.get_mut(&ManifestKey::new(split, image_class)) {
                    part.extend(files);
                }
            }
        }
    }
    for part in parts.values_mut() {
        part.sort();
    }
    DatasetSplit { parts }
}
