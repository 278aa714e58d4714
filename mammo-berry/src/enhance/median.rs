//! 中值滤波.

use ndarray::{Array2, ArrayView2};

use super::border::replicate;
use crate::consts::gray::LEVELS;
use crate::{normalize_to_gray_u8, GrayImage, RawImage};

/// 中值滤波参数.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MedianParams {
    /// 窗口边长. 偶数会被加一, 小于 3 时取 3.
    pub k: usize,
}

impl Default for MedianParams {
    fn default() -> Self {
        Self { k: 3 }
    }
}

/// 中值滤波, 边界按复制方式外推.
pub fn median(img: &RawImage, params: &MedianParams) -> Option<GrayImage> {
    let src = normalize_to_gray_u8(img)?;
    Some(median_blur(&src, params.k))
}

pub(crate) fn median_blur(src: &GrayImage, k: usize) -> GrayImage {
    let k = (k | 1).max(3);
    GrayImage::new(sliding_median(src.array_view(), k / 2))
}

/// 逐行滑动直方图 (Huang) 求中值.
fn sliding_median(src: ArrayView2<u8>, r: usize) -> Array2<u8> {
    let (h, w) = src.dim();
    let r = r as isize;
    let rank = ((2 * r + 1) * (2 * r + 1) / 2) as u32;
    let at = |y: isize, x: isize| src[(replicate(y, h), replicate(x, w))] as usize;

    let mut out = Array2::zeros((h, w));
    for y in 0..h as isize {
        let mut hist = [0u32; LEVELS];
        for dy in -r..=r {
            for dx in -r..=r {
                hist[at(y + dy, dx)] += 1;
            }
        }
        for x in 0..w as isize {
            if x > 0 {
                for dy in -r..=r {
                    hist[at(y + dy, x - r - 1)] -= 1;
                    hist[at(y + dy, x + r)] += 1;
                }
            }
            out[(y as usize, x as usize)] = kth(&hist, rank);
        }
    }
    out
}

/// 直方图中第 `rank` 个 (从 0 开始) 样本的灰度.
#[inline]
fn kth(hist: &[u32; LEVELS], rank: u32) -> u8 {
    let mut acc = 0;
    for (level, &n) in hist.iter().enumerate() {
        acc += n;
        if acc > rank {
            return level as u8;
        }
    }
    u8::MAX
}
