//! 非局部均值去噪.

use ndarray::Array2;

use super::border::pad_reflect101;
use crate::data::round_u8;
use crate::{normalize_to_gray_u8, GrayImage, RawImage};

/// 模板窗口边长.
pub const TEMPLATE_WINDOW: usize = 7;

/// 搜索窗口边长.
pub const SEARCH_WINDOW: usize = 21;

/// 非局部均值参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NlmParams {
    /// 滤波强度. 越大越平滑.
    pub h: f64,
}

impl Default for NlmParams {
    fn default() -> Self {
        Self { h: 10.0 }
    }
}

/// 非局部均值去噪, 模板窗口 7, 搜索窗口 21.
///
/// 每个像素取搜索窗口内所有像素的加权平均. 权重为
/// `exp(-mean_sq_diff / h^2)`, 其中 `mean_sq_diff` 是两个模板窗口逐像素差平方的均值.
pub fn nlm(img: &RawImage, params: &NlmParams) -> Option<GrayImage> {
    let src = normalize_to_gray_u8(img)?;
    let (h, w) = src.shape();
    let t = TEMPLATE_WINDOW / 2;
    let s = SEARCH_WINDOW / 2;
    let p = t + s;
    let padded = pad_reflect101(src.array_view(), (p, p, p, p)).mapv(|v| v as i64);

    let inv_h2 = if params.h > 0.0 {
        1.0 / (params.h * params.h)
    } else {
        f64::INFINITY
    };
    let area = (TEMPLATE_WINDOW * TEMPLATE_WINDOW) as f64;

    let mut num = Array2::<f64>::zeros((h, w));
    let mut den = Array2::<f64>::zeros((h, w));
    // 差平方的积分图, 覆盖所有模板窗口.
    let (ih, iw) = (h + 2 * t, w + 2 * t);
    let mut integral = Array2::<u64>::zeros((ih + 1, iw + 1));

    let s = s as isize;
    for dy in -s..=s {
        for dx in -s..=s {
            for y in 0..ih {
                let mut row = 0u64;
                for x in 0..iw {
                    let (py, px) = (y + s as usize, x + s as usize);
                    let qy = (py as isize + dy) as usize;
                    let qx = (px as isize + dx) as usize;
                    let d = padded[(py, px)] - padded[(qy, qx)];
                    row += (d * d) as u64;
                    integral[(y + 1, x + 1)] = integral[(y, x + 1)] + row;
                }
            }

            for y in 0..h {
                for x in 0..w {
                    let (y1, x1) = (y + TEMPLATE_WINDOW, x + TEMPLATE_WINDOW);
                    let ssd = integral[(y1, x1)] + integral[(y, x)]
                        - integral[(y, x1)]
                        - integral[(y1, x)];
                    let weight = if ssd == 0 {
                        1.0
                    } else {
                        (-(ssd as f64 / area) * inv_h2).exp()
                    };
                    let qy = (y as isize + p as isize + dy) as usize;
                    let qx = (x as isize + p as isize + dx) as usize;
                    num[(y, x)] += weight * padded[(qy, qx)] as f64;
                    den[(y, x)] += weight;
                }
            }
        }
    }

    Some(GrayImage::from_fn((h, w), |pos| round_u8(num[pos] / den[pos])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn mae(a: &GrayImage, b: &GrayImage) -> f64 {
        let s: u32 = a.iter().zip(b.iter()).map(|(&x, &y)| x.abs_diff(y) as u32).sum();
        s as f64 / a.size() as f64
    }

    #[test]
    fn test_flat_is_fixed() {
        let img = GrayImage::filled((5, 9), 201);
        let out = nlm(&RawImage::from(&img), &NlmParams::default()).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn test_denoise() {
        let clean = GrayImage::from_fn((24, 24), |(h, _)| if h < 12 { 70 } else { 170 });
        let mut rng = StdRng::seed_from_u64(7);
        let noisy = GrayImage::from_fn(clean.shape(), |pos| {
            (clean[pos] as i32 + rng.gen_range(-8..=8)) as u8
        });
        let out = nlm(&RawImage::from(&noisy), &NlmParams::default()).unwrap();
        assert_eq!(out.shape(), clean.shape());
        assert!(mae(&out, &clean) < mae(&noisy, &clean));
    }
}
