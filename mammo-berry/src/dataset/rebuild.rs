//! 根据清单在新的源目录上重建 train/val/test 目录树.

use std::fs;
use std::path::Path;

use log::{debug, info, warn};

use super::{copy_if_absent, relative_to_root, Manifest, ManifestKey, Split};
use crate::consts::DEFAULT_SOURCE_ROOT;
use crate::{Error, Result};

/// 重建划分目录的统计结果.
#[derive(Debug, Default)]
pub struct RebuildReport {
    /// 新复制的文件数.
    pub copied: usize,

    /// 目标已存在而未复制的文件数.
    pub existing: usize,

    /// 在新的源目录下不存在的文件数.
    pub missing: usize,

    /// 无法读取的清单及原因.
    pub failed: Vec<(ManifestKey, Error)>,
}

/// 清单中的路径以 `data/preprocessed` 为根. 见 [`rebuild_splits_with_root`].
pub fn rebuild_splits_from_lists<L, S, O>(lists_dir: L, source_root: S, out_root: O) -> Result<RebuildReport>
where
    L: AsRef<Path>,
    S: AsRef<Path>,
    O: AsRef<Path>,
{
    rebuild_splits_with_root(lists_dir, DEFAULT_SOURCE_ROOT, source_root, out_root)
}

/// 读取 `lists_dir` 下的六个标准清单, 把每个路径从 `manifest_root` 换根到
/// `source_root`, 并按文件名复制到 `{out_root}/{split}/{class}`.
///
/// # 注意
///
/// 1. 新源目录下不存在的文件被跳过;
/// 2. 已存在的目标文件保持不变;
/// 3. 单个清单不存在不影响其它清单, 失败记录在返回的报告中.
pub fn rebuild_splits_with_root<L, M, S, O>(
    lists_dir: L,
    manifest_root: M,
    source_root: S,
    out_root: O,
) -> Result<RebuildReport>
where
    L: AsRef<Path>,
    M: AsRef<Path>,
    S: AsRef<Path>,
    O: AsRef<Path>,
{
    let mut report = RebuildReport::default();
    for key in ManifestKey::ALL {
        let dst_dir = key.split_dir(out_root.as_ref());
        fs::create_dir_all(&dst_dir)?;

        let manifest = match Manifest::open(lists_dir.as_ref().join(key.file_name())) {
            Ok(m) => m,
            Err(e) => {
                warn!("{key}: {e}");
                report.failed.push((key, e));
                continue;
            }
        };

        for entry in manifest.iter() {
            let src = source_root
                .as_ref()
                .join(relative_to_root(entry, manifest_root.as_ref()));
            let Some(name) = src.file_name().filter(|_| src.is_file()) else {
                debug!("missing {}", src.display());
                report.missing += 1;
                continue;
            };
            if copy_if_absent(&src, &dst_dir.join(name))? {
                report.copied += 1;
            } else {
                report.existing += 1;
            }
        }
    }
    info!(
        "rebuilt splits from {}: {} copied, {} existing, {} missing",
        source_root.as_ref().display(),
        report.copied,
        report.existing,
        report.missing
    );
    Ok(report)
}

/// 删除 `{out_root}/{train,val,test}` 目录树. 不存在的目录被忽略.
pub fn clear_splits<P: AsRef<Path>>(out_root: P) -> Result<()> {
    for split in Split::ALL {
        let dir = out_root.as_ref().join(split.as_str());
        if dir.is_dir() {
            fs::remove_dir_all(&dir)?;
            info!("removed {}", dir.display());
        }
    }
    Ok(())
}
