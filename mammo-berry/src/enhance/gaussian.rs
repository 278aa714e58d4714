//! 高斯模糊与反锐化掩模.

use ndarray::{Array2, ArrayView2};

use super::border::reflect101;
use crate::data::round_u8;
use crate::{normalize_to_gray_u8, GrayImage, RawImage};

/// 反锐化掩模使用的高斯标准差.
pub const UNSHARP_SIGMA: f64 = 2.0;

/// 高斯模糊参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GaussianParams {
    /// 核边长. 偶数会被加一, 小于 3 时取 3; 为 0 时由 `sigma` 推导.
    pub k: usize,

    /// 标准差. 不大于 0 时由 `k` 推导.
    pub sigma: f64,
}

impl Default for GaussianParams {
    fn default() -> Self {
        Self { k: 5, sigma: 0.0 }
    }
}

/// 反锐化掩模参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct UnsharpParams {
    /// 锐化强度 `k`.
    pub amount: f64,
}

impl Default for UnsharpParams {
    fn default() -> Self {
        Self { amount: 1.0 }
    }
}

/// 高斯模糊, 边界按 reflect-101 外推.
pub fn gaussian(img: &RawImage, params: &GaussianParams) -> Option<GrayImage> {
    let src = normalize_to_gray_u8(img)?;
    Some(gaussian_blur(&src, params.k, params.sigma))
}

/// 反锐化掩模: `(1 + k) * I - k * gauss(I, sigma = 2)`, 四舍五入并截断到 `[0, 255]`.
pub fn unsharp(img: &RawImage, params: &UnsharpParams) -> Option<GrayImage> {
    let src = normalize_to_gray_u8(img)?;
    let blur = gaussian_blur(&src, 0, UNSHARP_SIGMA);
    let k = params.amount;
    Some(GrayImage::from_fn(src.shape(), |pos| {
        round_u8((1.0 + k) * src[pos] as f64 - k * blur[pos] as f64)
    }))
}

pub(crate) fn gaussian_blur(src: &GrayImage, k: usize, sigma: f64) -> GrayImage {
    let k = kernel_size(k, sigma);
    let kernel = gaussian_kernel(k, sigma);
    GrayImage::new(separable_filter(src.array_view(), &kernel).mapv(round_u8))
}

/// 实际使用的核边长, 总是不小于 3 的奇数.
fn kernel_size(k: usize, sigma: f64) -> usize {
    match k {
        0 if sigma > 0.0 => (((sigma * 6.0 + 1.0).round() as usize) | 1).max(3),
        0 => 3,
        k => (k | 1).max(3),
    }
}

/// 归一化的一维高斯核.
///
/// `sigma <= 0` 时取 `0.3 * ((k - 1) * 0.5 - 1) + 0.8`.
pub(crate) fn gaussian_kernel(k: usize, sigma: f64) -> Vec<f64> {
    let sigma = if sigma > 0.0 {
        sigma
    } else {
        0.3 * ((k as f64 - 1.0) * 0.5 - 1.0) + 0.8
    };
    let r = (k / 2) as f64;
    let scale = -0.5 / (sigma * sigma);
    let mut kernel: Vec<f64> = (0..k)
        .map(|i| {
            let x = i as f64 - r;
            (scale * x * x).exp()
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    kernel.iter_mut().for_each(|v| *v /= sum);
    kernel
}

/// 先水平后垂直地用同一个一维核做卷积, 不取整.
fn separable_filter(src: ArrayView2<u8>, kernel: &[f64]) -> Array2<f64> {
    let (h, w) = src.dim();
    let r = (kernel.len() / 2) as isize;
    let horizontal = Array2::from_shape_fn((h, w), |(y, x)| {
        kernel
            .iter()
            .enumerate()
            .map(|(i, c)| c * src[(y, reflect101(x as isize + i as isize - r, w))] as f64)
            .sum::<f64>()
    });
    Array2::from_shape_fn((h, w), |(y, x)| {
        kernel
            .iter()
            .enumerate()
            .map(|(i, c)| c * horizontal[(reflect101(y as isize + i as isize - r, h), x)])
            .sum::<f64>()
    })
}
