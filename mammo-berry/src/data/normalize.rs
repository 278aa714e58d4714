//! 输入图像规范化: 任意通道数/样本类型 -> 单通道 8-bit.

use ndarray::{Array2, Array3, Axis};
use num::{Float, ToPrimitive};

use super::{GrayImage, IntensityWindow, RawImage};

/// BGR -> 灰度的定点权重, 精度为 14 位. 对应 `0.114 B + 0.587 G + 0.299 R`.
const LUMA_SHIFT: u32 = 14;
const LUMA_B: u32 = 1868;
const LUMA_G: u32 = 9617;
const LUMA_R: u32 = 4899;

/// 浮点 BGR -> 灰度权重.
const LUMA_F: [f64; 3] = [0.114, 0.587, 0.299];

/// 将任意图像规范化为单通道 8-bit 灰度图.
///
/// 1. 三通道输入按 BGR 解释, 以标准亮度权重转换为灰度;
/// 2. 非 8-bit 样本先截断到 `[0, 255]` 再向零取整.
///
/// 空图像 (没有通道, 任一维度为 0, 或 BGR 通道轴长度不为 3) 返回 `None`,
/// 调用方必须显式处理.
/// 对已经规范化的图像调用该函数不会改变任何像素.
pub fn normalize_to_gray_u8(img: &RawImage) -> Option<GrayImage> {
    if img.is_empty() {
        return None;
    }
    let data = match img {
        RawImage::Empty => return None,
        RawImage::Gray8(a) => a.clone(),
        RawImage::Gray16(a) => a.mapv(saturate_u8),
        RawImage::GrayF32(a) => a.mapv(saturate_u8),
        RawImage::Bgr8(a) => bgr8_to_gray(a),
        RawImage::Bgr16(a) => bgr_to_gray_f64(a).mapv(saturate_u8),
        RawImage::BgrF32(a) => bgr_to_gray_f64(a).mapv(saturate_u8),
    };
    Some(GrayImage::new(data))
}

/// 以图像自身的最小/最大强度为窗, 线性拉伸到 `[0, 255]`.
///
/// 用于把 16-bit (DICOM 导出) 图像转换为 8-bit. 常数图像映射为全 0.
/// 空图像返回 `None`.
pub fn stretch_min_max(img: &RawImage) -> Option<GrayImage> {
    let plane = luma_plane_f64(img)?;
    let window = IntensityWindow::from_plane(plane.view())?;
    Some(GrayImage::new(
        plane.mapv(|v| window.eval(v as f32).unwrap_or(u8::MIN)),
    ))
}

/// 不截断的浮点亮度平面. 空图像返回 `None`.
pub(crate) fn luma_plane_f64(img: &RawImage) -> Option<Array2<f64>> {
    if img.is_empty() {
        return None;
    }
    let plane = match img {
        RawImage::Empty => return None,
        RawImage::Gray8(a) => a.mapv(|p| p as f64),
        RawImage::Gray16(a) => a.mapv(|p| p as f64),
        RawImage::GrayF32(a) => a.mapv(|p| p as f64),
        RawImage::Bgr8(a) => bgr_to_gray_f64(a),
        RawImage::Bgr16(a) => bgr_to_gray_f64(a),
        RawImage::BgrF32(a) => bgr_to_gray_f64(a),
    };
    Some(plane)
}

/// 截断到 `[0, 255]` 并向零取整. NaN 映射为 0.
#[inline]
pub(crate) fn saturate_u8<T: ToPrimitive>(v: T) -> u8 {
    match v.to_f64() {
        Some(f) if f.is_nan() => 0,
        Some(f) => f.clamp(0.0, 255.0) as u8,
        None => 0,
    }
}

/// 四舍五入后截断到 `[0, 255]`. 滤波类算子使用.
#[inline]
pub(crate) fn round_u8<F: Float>(v: F) -> u8 {
    saturate_u8(v.round())
}

/// 8-bit BGR -> 灰度, 定点运算.
fn bgr8_to_gray(a: &Array3<u8>) -> Array2<u8> {
    let (h, w, _) = a.dim();
    Array2::from_shape_fn((h, w), |(y, x)| {
        let b = a[(y, x, 0)] as u32;
        let g = a[(y, x, 1)] as u32;
        let r = a[(y, x, 2)] as u32;
        let luma = (b * LUMA_B + g * LUMA_G + r * LUMA_R + (1 << (LUMA_SHIFT - 1))) >> LUMA_SHIFT;
        luma as u8
    })
}

/// 任意样本类型的 BGR -> 灰度, 浮点运算, 不截断.
fn bgr_to_gray_f64<T: ToPrimitive + Copy>(a: &Array3<T>) -> Array2<f64> {
    a.map_axis(Axis(2), |px| {
        px.iter()
            .zip(LUMA_F)
            .map(|(v, k)| v.to_f64().unwrap_or(0.0) * k)
            .sum()
    })
}
