//! 按清单批量运行增强流水线.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::{relative_to_root, Manifest, ManifestKey};
use crate::consts::DEFAULT_SOURCE_ROOT;
use crate::{read_image, Error, ImgWrite, Pipeline, Result};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

        pub(super) fn count_written<F>(entries: &[PathBuf], op: F) -> usize
        where
            F: Fn(&Path) -> bool + Sync,
        {
            entries.par_iter().filter(|p| op(p)).count()
        }
    } else {
        pub(super) fn count_written<F>(entries: &[PathBuf], op: F) -> usize
        where
            F: Fn(&Path) -> bool,
        {
            entries.iter().filter(|p| op(p)).count()
        }
    }
}

/// 单个清单的处理统计.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ManifestStats {
    /// 成功写出的图像数.
    pub written: usize,

    /// 被跳过 (无法读取或为空) 的图像数.
    pub skipped: usize,
}

/// 对清单 `manifest` 中的每个图像运行名为 `pipeline` 的流水线,
/// 结果保存到 `output_root` 下, 保持相对 `data/preprocessed` 的路径.
///
/// 返回成功写出的图像数. 详见 [`apply_pipeline_to_manifest_with_root`].
pub fn apply_pipeline_to_manifest<P, Q>(manifest: P, output_root: Q, pipeline: &str) -> Result<usize>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    apply_pipeline_to_manifest_with_root(manifest, DEFAULT_SOURCE_ROOT, output_root, pipeline)
}

/// 对清单 `manifest` 中的每个图像运行名为 `pipeline` 的流水线.
///
/// # 注意
///
/// 1. 未知的 `pipeline` 在打开清单之前就返回 [`Error::UnknownPipelineKey`],
///   不会读写任何文件.
/// 2. 清单不存在时返回 [`Error::MissingManifest`].
/// 3. 图像从清单中记录的路径读取; 输出位置为
///   `{output_root}/{相对 source_root 的路径}`, 中间目录会被自动创建.
/// 4. 无法读取或为空的图像被记录并跳过, 不计入返回值. 没有任何成功输出不是错误.
pub fn apply_pipeline_to_manifest_with_root<P, R, Q>(
    manifest: P,
    source_root: R,
    output_root: Q,
    pipeline: &str,
) -> Result<usize>
where
    P: AsRef<Path>,
    R: AsRef<Path>,
    Q: AsRef<Path>,
{
    let pipeline: Pipeline = pipeline.parse()?;
    let stats = apply_to_manifest(
        manifest.as_ref(),
        source_root.as_ref(),
        output_root.as_ref(),
        &pipeline,
    )?;
    Ok(stats.written)
}

/// 以已经构建好的 (可能带自定义参数的) 流水线处理一个清单.
pub fn apply_to_manifest(
    manifest: &Path,
    source_root: &Path,
    output_root: &Path,
    pipeline: &Pipeline,
) -> Result<ManifestStats> {
    let entries = Manifest::open(manifest)?;
    let written = count_written(entries.entries(), |src| {
        match process_one(src, source_root, output_root, pipeline) {
            Ok(dst) => {
                debug!("{} -> {}", src.display(), dst.display());
                true
            }
            Err(e) => {
                warn!("skipped {}: {e}", src.display());
                false
            }
        }
    });
    let stats = ManifestStats {
        written,
        skipped: entries.len() - written,
    };
    info!(
        "{}: {} written, {} skipped by `{}`",
        manifest.display(),
        stats.written,
        stats.skipped,
        pipeline.name()
    );
    Ok(stats)
}

/// 读取, 增强, 写出一张图像. 返回输出路径.
fn process_one(
    src: &Path,
    source_root: &Path,
    output_root: &Path,
    pipeline: &Pipeline,
) -> Result<PathBuf> {
    let raw = read_image(src)?;
    let out = pipeline
        .apply(&raw)
        .ok_or_else(|| Error::EmptyImage(src.to_owned()))?;
    let dst = output_root.join(relative_to_root(src, source_root));
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    out.save(&dst)?;
    Ok(dst)
}

/// 对全部六个标准清单运行同一个流水线的结果.
#[derive(Debug)]
pub struct BatchReport {
    output_root: PathBuf,
    done: Vec<(ManifestKey, ManifestStats)>,
    failed: Vec<(ManifestKey, Error)>,
}

impl BatchReport {
    /// 实际的输出目录 `{enhanced_root}/{pipeline}`.
    #[inline]
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// 成功处理的清单及其统计.
    #[inline]
    pub fn done(&self) -> &[(ManifestKey, ManifestStats)] {
        &self.done
    }

    /// 处理失败的清单 (如清单不存在) 及其原因.
    #[inline]
    pub fn failed(&self) -> &[(ManifestKey, Error)] {
        &self.failed
    }

    /// 全部清单中成功写出的图像总数.
    pub fn total_written(&self) -> usize {
        self.done.iter().map(|(_, s)| s.written).sum()
    }

    /// 全部清单中被跳过的图像总数.
    pub fn total_skipped(&self) -> usize {
        self.done.iter().map(|(_, s)| s.skipped).sum()
    }

    /// 是否所有清单都被成功处理.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// 对 `lists_dir` 下的六个标准清单 (`train_benign.txt` 等) 运行名为 `pipeline` 的流水线,
/// 输出到 `{enhanced_root}/{pipeline}`.
///
/// 未知的流水线名称立即返回错误. 单个清单的失败被记录在报告中, 不影响其它清单.
pub fn apply_pipeline_to_lists<L, R, E>(
    lists_dir: L,
    source_root: R,
    enhanced_root: E,
    pipeline: &str,
) -> Result<BatchReport>
where
    L: AsRef<Path>,
    R: AsRef<Path>,
    E: AsRef<Path>,
{
    let pipeline: Pipeline = pipeline.parse()?;
    let output_root = enhanced_root.as_ref().join(pipeline.name().as_str());
    let mut report = BatchReport {
        output_root,
        done: Vec::with_capacity(ManifestKey::ALL.len()),
        failed: vec![],
    };

    for key in ManifestKey::ALL {
        let manifest = lists_dir.as_ref().join(key.file_name());
        match apply_to_manifest(&manifest, source_root.as_ref(), &report.output_root, &pipeline) {
            Ok(stats) => report.done.push((key, stats)),
            Err(e) => {
                warn!("{key}: {e}");
                report.failed.push((key, e));
            }
        }
    }
    info!(
        "wrote {} enhanced images to {}",
        report.total_written(),
        report.output_root.display()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GrayImage, PipelineName};
    use std::fs;

    /// 在 `root` 下创建 `n` 张图像并写出引用它们的清单 (另加一个不存在的路径).
    fn fixture(root: &Path, n: usize) -> PathBuf {
        let src_root = root.join("data/preprocessed");
        let mut lines = vec![];
        for i in 0..n {
            let rel = format!("benign/P_{:05}_LEFT_CC.png", i);
            let path = src_root.join(&rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            GrayImage::from_fn((12, 10), |(h, w)| (h * 20 + w + i) as u8)
                .save(&path)
                .unwrap();
            lines.push(path.display().to_string());
        }
        lines.insert(1, src_root.join("benign/missing.png").display().to_string());
        let manifest = root.join("lists/train_benign.txt");
        fs::create_dir_all(manifest.parent().unwrap()).unwrap();
        fs::write(&manifest, lines.join("\n\n")).unwrap();
        manifest
    }

    fn read_dir_sorted(dir: &Path) -> Vec<(String, Vec<u8>)> {
        let mut files: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| {
                let p = e.unwrap().path();
                (p.file_name().unwrap().to_string_lossy().into_owned(), fs::read(&p).unwrap())
            })
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_resilient_and_idempotent() {
        let _ = simple_logger::init_with_level(log::Level::Debug);
        let dir = tempfile::tempdir().unwrap();
        let manifest = fixture(dir.path(), 3);
        let source_root = dir.path().join("data/preprocessed");
        let out = dir.path().join("enhanced/clahe");

        let n = apply_pipeline_to_manifest_with_root(&manifest, &source_root, &out, "clahe").unwrap();
        assert_eq!(n, 3);
        let first = read_dir_sorted(&out.join("benign"));
        assert_eq!(first.len(), 3);

        let n = apply_pipeline_to_manifest_with_root(&manifest, &source_root, &out, "clahe").unwrap();
        assert_eq!(n, 3);
        assert_eq!(read_dir_sorted(&out.join("benign")), first);
    }

    #[test]
    fn test_unknown_key_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let missing_manifest = dir.path().join("nope.txt");
        let res = apply_pipeline_to_manifest(&missing_manifest, &out, "not_a_real_key");
        assert!(matches!(res, Err(Error::UnknownPipelineKey(k)) if k == "not_a_real_key"));
        assert!(!out.exists());

        let res = apply_pipeline_to_manifest(&missing_manifest, &out, "median");
        assert!(matches!(res, Err(Error::MissingManifest(_))));
        assert!(!out.exists());
    }

    #[test]
    fn test_output_matches_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = fixture(dir.path(), 1);
        let source_root = dir.path().join("data/preprocessed");
        let out = dir.path().join("o");
        apply_pipeline_to_manifest_with_root(&manifest, &source_root, &out, "gamma_08").unwrap();

        let src = crate::read_image(source_root.join("benign/P_00000_LEFT_CC.png")).unwrap();
        let want = PipelineName::Gamma08.apply(&src).unwrap();
        let got = crate::read_image(out.join("benign/P_00000_LEFT_CC.png")).unwrap();
        assert_eq!(crate::normalize_to_gray_u8(&got).unwrap(), want);
    }

    #[test]
    fn test_lists_report() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path(), 2);
        let report = apply_pipeline_to_lists(
            dir.path().join("lists"),
            dir.path().join("data/preprocessed"),
            dir.path().join("enhanced"),
            "hist_eq",
        )
        .unwrap();

        assert_eq!(report.output_root(), dir.path().join("enhanced/hist_eq"));
        assert_eq!(report.done().len(), 1);
        assert_eq!(report.failed().len(), 5);
        assert!(!report.is_complete());
        assert_eq!(report.total_written(), 2);
        assert_eq!(report.total_skipped(), 1);
        assert!(report.output_root().join("benign/P_00001_LEFT_CC.png").is_file());
    }
}
