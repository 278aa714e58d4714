//! 路径到路径的单图转换: ROI 裁剪与 min-max 拉伸.

use std::fs;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use log::{debug, info, warn};

use super::batch::count_written;
use super::ManifestStats;
use crate::{normalize_to_gray_u8, read_image, stretch_min_max, Error, ImgWrite, Result, RoiRect};

/// 读取 `src`, 转为 8-bit 灰度后裁剪 `roi`, 保存到 `dst`.
///
/// 裁剪结果为空时返回 [`Error::EmptyImage`]. 不会创建 `dst` 的父目录.
pub fn crop_roi_file<P: AsRef<Path>, Q: AsRef<Path>>(src: P, roi: RoiRect, dst: Q) -> Result<()> {
    let src = src.as_ref();
    let roi = normalize_to_gray_u8(&read_image(src)?)
        .and_then(|img| img.crop(roi))
        .ok_or_else(|| Error::EmptyImage(src.to_owned()))?;
    roi.save(dst)?;
    Ok(())
}

/// 读取 `src`, 以其自身最小/最大强度线性拉伸到 `[0, 255]`, 保存到 `dst`.
///
/// 常数图像写出全 0. 不会创建 `dst` 的父目录.
pub fn stretch_file<P: AsRef<Path>, Q: AsRef<Path>>(src: P, dst: Q) -> Result<()> {
    let src = src.as_ref();
    let out = stretch_min_max(&read_image(src)?).ok_or_else(|| Error::EmptyImage(src.to_owned()))?;
    out.save(dst)?;
    Ok(())
}

/// 对 `input_dir` 下 (不递归) 每个可识别格式的图像做 [`stretch_file`],
/// 输出为 `output_dir` 下同名的 `.png`. `output_dir` 会被自动创建.
///
/// 无法读取的图像被记录并跳过. 输入目录不存在时返回 [`Error::Io`].
pub fn stretch_dir<P: AsRef<Path>, Q: AsRef<Path>>(input_dir: P, output_dir: Q) -> Result<ManifestStats> {
    let (input_dir, output_dir) = (input_dir.as_ref(), output_dir.as_ref());
    fs::create_dir_all(output_dir)?;

    let mut sources: Vec<PathBuf> = fs::read_dir(input_dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && ImageFormat::from_path(p).is_ok())
        .collect();
    sources.sort();

    let written = count_written(&sources, |src| {
        let Some(name) = src.file_name() else {
            return false;
        };
        let dst = output_dir.join(name).with_extension("png");
        match stretch_file(src, &dst) {
            Ok(()) => {
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
        skipped: sources.len() - written,
    };
    info!(
        "{}: {} converted, {} skipped",
        input_dir.display(),
        stats.written,
        stats.skipped
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GrayImage;
    use image::{ImageBuffer, Luma};

    #[test]
    fn test_crop_roi_file() {
        let dir = tempfile::tempdir().unwrap();
        let (src, dst) = (dir.path().join("full.png"), dir.path().join("roi.png"));
        GrayImage::from_fn((10, 12), |(h, w)| (h * 12 + w) as u8).save(&src).unwrap();

        crop_roi_file(&src, RoiRect::new(3, 2, 4, 5), &dst).unwrap();
        let roi = normalize_to_gray_u8(&read_image(&dst).unwrap()).unwrap();
        assert_eq!(roi.shape(), (5, 4));
        assert_eq!(roi[(0, 0)], 27);

        let out_of_bounds = crop_roi_file(&src, RoiRect::new(20, 0, 4, 4), dir.path().join("x.png"));
        assert!(matches!(out_of_bounds, Err(Error::EmptyImage(_))));
        let missing = crop_roi_file(dir.path().join("gone.png"), RoiRect::new(0, 0, 1, 1), &dst);
        assert!(matches!(missing, Err(Error::UnreadableImage { .. })));
    }

    #[test]
    fn test_stretch_dir() {
        let dir = tempfile::tempdir().unwrap();
        let (input, output) = (dir.path().join("raw"), dir.path().join("out/preprocessed"));
        fs::create_dir_all(&input).unwrap();

        let deep: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_fn(4, 2, |x, y| Luma([1000 + 1000 * (x + 4 * y) as u16]));
        deep.save(input.join("a.png")).unwrap();
        GrayImage::filled((3, 3), 90).save(input.join("b.tif")).unwrap();
        fs::write(input.join("notes.txt"), "not an image").unwrap();
        fs::write(input.join("broken.png"), "not a png").unwrap();

        let stats = stretch_dir(&input, &output).unwrap();
        assert_eq!(stats, ManifestStats { written: 2, skipped: 1 });

        let a = normalize_to_gray_u8(&read_image(output.join("a.png")).unwrap()).unwrap();
        assert_eq!(a.shape(), (2, 4));
        assert_eq!(a[(0, 0)], 0);
        assert_eq!(a[(1, 3)], 255);
        let b = normalize_to_gray_u8(&read_image(output.join("b.png")).unwrap()).unwrap();
        assert!(b.iter().all(|&p| p == 0));
        assert!(!output.join("notes.png").exists());

        assert!(matches!(stretch_dir(dir.path().join("gone"), &output), Err(Error::Io(_))));
    }
}
