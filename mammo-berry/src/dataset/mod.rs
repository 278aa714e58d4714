//! 数据集操作: 清单, 批量增强, 格式转换, 标签关联, 划分与重建.

use std::fmt;
use std::path::{Path, PathBuf};

mod batch;
mod convert;
pub mod labels;
mod manifest;
mod rebuild;
pub mod split;

pub use batch::{
    apply_pipeline_to_lists, apply_pipeline_to_manifest, apply_pipeline_to_manifest_with_root,
    apply_to_manifest, BatchReport, ManifestStats,
};
pub use convert::{crop_roi_file, stretch_dir, stretch_file};
pub use labels::{sort_by_labels, LabelIndex, SortReport};
pub use manifest::{relative_to_root, Manifest};
pub use rebuild::{clear_splits, rebuild_splits_from_lists, rebuild_splits_with_root, RebuildReport};
pub use split::{split_dataset, DatasetSplit, PatientIndex, SplitRatio, SplitUnit};

/// 获取 `{用户主目录}/dataset` 目录.
pub fn home_dataset_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = home_dataset_dir()?;
    ans.extend(it);
    Some(ans)
}

/// 二分类标签.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ClassLabel {
    /// 良性.
    Benign,

    /// 恶性.
    Malignant,
}

impl ClassLabel {
    /// 全部类别, 按目录处理顺序.
    pub const ALL: [ClassLabel; 2] = [Self::Benign, Self::Malignant];

    /// 类别目录名.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Benign => "benign",
            Self::Malignant => "malignant",
        }
    }

    /// 解析病理描述 (大小写与首尾空白不敏感). 只接受 `benign` 与 `malignant`.
    pub fn parse(s: &str) -> Option<ClassLabel> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("benign") {
            Some(Self::Benign)
        } else if s.eq_ignore_ascii_case("malignant") {
            Some(Self::Malignant)
        } else {
            None
        }
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 数据集划分.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Split {
    /// 训练集.
    Train,

    /// 验证集.
    Val,

    /// 测试集.
    Test,
}

impl Split {
    /// 全部划分.
    pub const ALL: [Split; 3] = [Self::Train, Self::Val, Self::Test];

    /// 划分目录名.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Val => "val",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// (划分, 类别) 二元组, 对应一个标准清单文件和一个划分目录.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ManifestKey {
    /// 划分.
    pub split: Split,

    /// 类别.
    pub class: ClassLabel,
}

impl ManifestKey {
    /// 六个标准清单, 顺序为 `train_benign, train_malignant, val_benign, ...`.
    pub const ALL: [ManifestKey; 6] = [
        Self::new(Split::Train, ClassLabel::Benign),
        Self::new(Split::Train, ClassLabel::Malignant),
        Self::new(Split::Val, ClassLabel::Benign),
        Self::new(Split::Val, ClassLabel::Malignant),
        Self::new(Split::Test, ClassLabel::Benign),
        Self::new(Split::Test, ClassLabel::Malignant),
    ];

    /// 直接初始化.
    #[inline]
    pub const fn new(split: Split, class: ClassLabel) -> Self {
        Self { split, class }
    }

    /// 清单文件名, 如 `train_benign.txt`.
    pub fn file_name(&self) -> String {
        format!("{self}.txt")
    }

    /// 划分目录 `{root}/{split}/{class}`.
    pub fn split_dir<P: AsRef<Path>>(&self, root: P) -> PathBuf {
        root.as_ref()
            .join(self.split.as_str())
            .join(self.class.as_str())
    }
}

impl fmt::Display for ManifestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.split, self.class)
    }
}

/// 若 `dst` 不存在, 则把 `src` 复制过去. 返回是否真的发生了复制.
///
/// 已存在的目标文件保持不变, 因此重复调用是幂等的.
pub(crate) fn copy_if_absent(src: &Path, dst: &Path) -> std::io::Result<bool> {
    if dst.exists() {
        return Ok(false);
    }
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(src, dst)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_keys() {
        let names: Vec<String> = ManifestKey::ALL.iter().map(|k| k.file_name()).collect();
        assert_eq!(
            names,
            [
                "train_benign.txt",
                "train_malignant.txt",
                "val_benign.txt",
                "val_malignant.txt",
                "test_benign.txt",
                "test_malignant.txt"
            ]
        );
        let key = ManifestKey::new(Split::Val, ClassLabel::Malignant);
        assert_eq!(key.split_dir("data"), Path::new("data/val/malignant"));
    }

    #[test]
    fn test_parse_label() {
        assert_eq!(ClassLabel::parse(" MALIGNANT "), Some(ClassLabel::Malignant));
        assert_eq!(ClassLabel::parse("benign"), Some(ClassLabel::Benign));
        assert_eq!(ClassLabel::parse("BENIGN_WITHOUT_CALLBACK"), None);
        assert_eq!(ClassLabel::parse(""), None);
    }

    #[test]
    fn test_copy_if_absent() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.png");
        let dst = dir.path().join("x/y/a.png");
        std::fs::write(&src, b"first").unwrap();
        assert!(copy_if_absent(&src, &dst).unwrap());

        std::fs::write(&src, b"second").unwrap();
        assert!(!copy_if_absent(&src, &dst).unwrap());
        assert_eq!(std::fs::read(&dst).unwrap(), b"first");
    }
}
