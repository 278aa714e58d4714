//! 图像的读取与持久化存储.

use std::path::Path;

use image::{DynamicImage, ImageResult, Luma};
use ndarray::{Array2, Array3};

use super::{GrayImage, RawImage};
use crate::{Error, Result};

/// 表明一个可以按原样持久化存储的单通道图像对象.
///
/// 输出格式由 `path` 的扩展名决定. 对相同的图像和路径, 输出字节确定.
pub trait ImgWrite {
    /// 按原样将图片保存到 `path` 路径. 不会创建父目录.
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

impl ImgWrite for GrayImage {
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        let (height, width) = self.shape();
        let mut buf = image::GrayImage::new(width as u32, height as u32);
        for ((h, w), &pix) in self.data.indexed_iter() {
            buf.put_pixel(w as u32, h as u32, Luma([pix]));
        }
        buf.save(path)
    }
}

/// 读取 `path` 处的图像, 保留其位深和通道信息.
///
/// 彩色图像转换为 BGR 顺序, alpha 通道被丢弃, 浮点图像被放大到 `[0, 255]` 区间.
/// 文件不存在或无法解码时返回 [`Error::UnreadableImage`].
pub fn read_image<P: AsRef<Path>>(path: P) -> Result<RawImage> {
    let path = path.as_ref();
    let img = image::open(path).map_err(|e| Error::UnreadableImage {
        path: path.to_owned(),
        reason: e.to_string(),
    })?;
    Ok(RawImage::from(img))
}

impl From<DynamicImage> for RawImage {
    fn from(img: DynamicImage) -> Self {
        let (w, h) = (img.width() as usize, img.height() as usize);
        if w == 0 || h == 0 {
            return RawImage::Empty;
        }
        let raw = match &img {
            DynamicImage::ImageLuma8(buf) => {
                gray_plane(h, w, buf.as_raw().clone()).map(RawImage::Gray8)
            }
            DynamicImage::ImageLumaA8(_) => {
                gray_plane(h, w, img.to_luma8().into_raw()).map(RawImage::Gray8)
            }
            DynamicImage::ImageLuma16(buf) => {
                gray_plane(h, w, buf.as_raw().clone()).map(RawImage::Gray16)
            }
            DynamicImage::ImageLumaA16(_) => {
                gray_plane(h, w, img.to_luma16().into_raw()).map(RawImage::Gray16)
            }
            DynamicImage::ImageRgb16(_) | DynamicImage::ImageRgba16(_) => {
                bgr_planes(h, w, img.to_rgb16().into_raw()).map(RawImage::Bgr16)
            }
            DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
                let scaled = img.to_rgb32f().into_raw().into_iter().map(|v| v * 255.0);
                bgr_planes(h, w, scaled.collect()).map(RawImage::BgrF32)
            }
            _ => bgr_planes(h, w, img.to_rgb8().into_raw()).map(RawImage::Bgr8),
        };
        raw.unwrap_or(RawImage::Empty)
    }
}

#[inline]
fn gray_plane<T>(h: usize, w: usize, raw: Vec<T>) -> Option<Array2<T>> {
    Array2::from_shape_vec((h, w), raw).ok()
}

/// 交错存储的 RGB 缓冲区 -> `(h, w, 3)` BGR 数组.
fn bgr_planes<T: Copy>(h: usize, w: usize, raw: Vec<T>) -> Option<Array3<T>> {
    let mut rgb = Array3::from_shape_vec((h, w, 3), raw).ok()?;
    for mut px in rgb.rows_mut() {
        px.swap(0, 2);
    }
    Some(rgb)
}
