//! 对 `mammo-berry::dataset` 的更一层封装. 提供更直接的目录与清单加载器.

use mammo_berry::dataset::{Manifest, ManifestKey};
use std::path::{Path, PathBuf};

/// 数据根目录环境变量.
pub const DATA_DIR_ENV: &str = "MAMMO_DATA_DIR";

/// 缺省数据根目录.
///
/// 若 `$HOME/dataset/cbis-ddsm` 是已存在的目录则返回之, 否则返回相对路径 `data`.
/// 环境变量 `$MAMMO_DATA_DIR` 由 [`ExperimentConfig::with_overrides`] 另行处理.
///
/// [`ExperimentConfig::with_overrides`]: crate::config::ExperimentConfig::with_overrides
pub fn default_data_dir() -> PathBuf {
    mammo_berry::dataset::home_dataset_dir_with(["cbis-ddsm"])
        .filter(|d| d.is_dir())
        .unwrap_or_else(|| PathBuf::from("data"))
}

/// 按标准顺序加载 `lists_dir` 下的六个清单.
pub fn manifests<P: AsRef<Path>>(
    lists_dir: P,
) -> impl Iterator<Item = (ManifestKey, mammo_berry::Result<Manifest>)> {
    let lists_dir = lists_dir.as_ref().to_owned();
    ManifestKey::ALL
        .into_iter()
        .map(move |k| (k, Manifest::open(lists_dir.join(k.file_name()))))
}

/// 按标准顺序找到第一个存在且非空的清单.
pub fn first_manifest<P: AsRef<Path>>(lists_dir: P) -> Option<(ManifestKey, Manifest)> {
    manifests(lists_dir).find_map(|(k, m)| m.ok().filter(|m| !m.is_empty()).map(|m| (k, m)))
}
