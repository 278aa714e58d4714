//! 双边滤波.

use itertools::iproduct;

use super::border::pad_reflect101;
use crate::consts::gray::LEVELS;
use crate::data::round_u8;
use crate::{normalize_to_gray_u8, GrayImage, RawImage};

/// 双边滤波参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BilateralParams {
    /// 邻域直径. 为 0 时由 `sigma_space` 推导.
    pub d: usize,

    /// 灰度域标准差.
    pub sigma_color: f64,

    /// 空间域标准差.
    pub sigma_space: f64,
}

impl Default for BilateralParams {
    fn default() -> Self {
        Self {
            d: 7,
            sigma_color: 50.0,
            sigma_space: 50.0,
        }
    }
}

/// 保边平滑. 邻域为半径 `d / 2` 的圆盘, 边界按 reflect-101 外推.
pub fn bilateral(img: &RawImage, params: &BilateralParams) -> Option<GrayImage> {
    let src = normalize_to_gray_u8(img)?;
    let sigma_color = if params.sigma_color <= 0.0 { 1.0 } else { params.sigma_color };
    let sigma_space = if params.sigma_space <= 0.0 { 1.0 } else { params.sigma_space };
    let radius = match params.d {
        0 => (sigma_space * 1.5).round() as isize,
        d => (d / 2) as isize,
    }
    .max(1);

    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let color_weight: Vec<f64> = (0..LEVELS)
        .map(|i| ((i * i) as f64 * color_coeff).exp())
        .collect();

    // (dy, dx, 空间权重)
    let space_coeff = -0.5 / (sigma_space * sigma_space);
    let taps: Vec<(isize, isize, f64)> = iproduct!(-radius..=radius, -radius..=radius)
        .filter_map(|(dy, dx)| {
            let r2 = (dy * dy + dx * dx) as f64;
            (r2.sqrt() <= radius as f64).then(|| (dy, dx, (r2 * space_coeff).exp()))
        })
        .collect();

    let r = radius as usize;
    let padded = pad_reflect101(src.array_view(), (r, r, r, r));
    Some(GrayImage::from_fn(src.shape(), |(y, x)| {
        let (cy, cx) = (y + r, x + r);
        let center = padded[(cy, cx)];
        let (mut num, mut den) = (0.0, 0.0);
        for &(dy, dx, ws) in taps.iter() {
            let v = padded[((cy as isize + dy) as usize, (cx as isize + dx) as usize)];
            let wt = ws * color_weight[center.abs_diff(v) as usize];
            num += wt * v as f64;
            den += wt;
        }
        round_u8(num / den)
    }))
}
