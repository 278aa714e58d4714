//! 频域 Wiener 反卷积.

use ndarray::{Array2, Zip};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::consts::WIENER_MAX_DIM;
use crate::data::saturate_u8;
use crate::{normalize_to_gray_u8, GrayImage, RawImage};

/// 正则项下限, 避免在 `|H|` 接近 0 处除法发散.
const MIN_NOISE_RATIO: f64 = 1e-6;

/// Wiener 反卷积参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WienerParams {
    /// 盒式 PSF 的边长. 会被调整为不小于 3 的奇数.
    pub k: usize,

    /// 噪声/信号功率比 `K`.
    pub noise_ratio: f64,

    /// 是否把滤波器缩放到直流增益为 1. 为 `false` 时使用未缩放的
    /// `conj(H) / (|H|^2 + K)`, 此时常数图像会被整体压暗为原来的 `1 / (1 + K)`.
    pub unit_dc_gain: bool,
}

impl Default for WienerParams {
    fn default() -> Self {
        Self {
            k: 7,
            noise_ratio: 0.01,
            unit_dc_gain: true,
        }
    }
}

/// 假设图像被 `k x k` 盒式模糊退化, 在频域中做带正则项的反卷积.
///
/// # 注意
///
/// 1. 长边超过 [`WIENER_MAX_DIM`] 的图像不做处理, 直接返回规范化后的输入.
/// 2. 缺省情况下滤波器 `conj(H) / (|H|^2 + K)` 被缩放到直流增益为 1,
///   因此常数图像对任意 `K` 都保持不变. `unit_dc_gain = false` 时不缩放,
///   输出直接向零取整.
/// 3. 空图像返回 `None`.
pub fn wiener(img: &RawImage, params: &WienerParams) -> Option<GrayImage> {
    let src = normalize_to_gray_u8(img)?;
    let (h, w) = src.shape();
    if h.max(w) > WIENER_MAX_DIM {
        return Some(src);
    }

    let k = odd_kernel_size(params.k);
    let noise = params.noise_ratio.max(MIN_NOISE_RATIO);

    let mut planner = FftPlanner::<f64>::new();
    let mut spectrum = src.to_unit_f64().mapv(|v| Complex::new(v, 0.0));
    let mut otf = box_psf((h, w), k);
    fft2(&mut spectrum, &mut planner, false);
    fft2(&mut otf, &mut planner, false);

    // H(0) = 1, 故 W(0) = 1 / (1 + K).
    let (dc_gain, nudge) = if params.unit_dc_gain {
        (1.0 + noise, 1e-6)
    } else {
        (1.0, 0.0)
    };
    Zip::from(&mut spectrum).and(&otf).for_each(|g, &hk| {
        *g *= hk.conj() * (dc_gain / (hk.norm_sqr() + noise));
    });
    fft2(&mut spectrum, &mut planner, true);

    let scale = (h * w) as f64;
    Some(GrayImage::new(spectrum.mapv(|c| {
        let v = (c.re / scale).clamp(0.0, 1.0);
        saturate_u8(v * 255.0 + nudge)
    })))
}

/// 调整为不小于 3 的奇数.
#[inline]
fn odd_kernel_size(k: usize) -> usize {
    (k / 2 * 2 + 1).max(3)
}

/// 以原点为中心的 `k x k` 盒式 PSF, 每个抽头为 `1 / k^2`.
///
/// 等价于先把核居中放置, 再循环移位使核中心落在 `(0, 0)`.
/// 图像小于核时, 越界的抽头循环折回, PSF 之和仍为 1.
fn box_psf((h, w): (usize, usize), k: usize) -> Array2<Complex<f64>> {
    let mut psf = Array2::<Complex<f64>>::zeros((h, w));
    let tap = 1.0 / (k * k) as f64;
    let r = (k / 2) as isize;
    for dy in -r..=r {
        let y = dy.rem_euclid(h as isize) as usize;
        for dx in -r..=r {
            let x = dx.rem_euclid(w as isize) as usize;
            psf[(y, x)].re += tap;
        }
    }
    psf
}

/// 原地二维 DFT: 先逐行, 再逐列. 逆变换不做归一化.
fn fft2(data: &mut Array2<Complex<f64>>, planner: &mut FftPlanner<f64>, inverse: bool) {
    let (h, w) = data.dim();
    let plan = |planner: &mut FftPlanner<f64>, n: usize| {
        if inverse {
            planner.plan_fft_inverse(n)
        } else {
            planner.plan_fft_forward(n)
        }
    };

    let rows = plan(planner, w);
    for mut row in data.rows_mut() {
        let mut buf = row.to_vec();
        rows.process(&mut buf);
        row.iter_mut().zip(buf).for_each(|(dst, v)| *dst = v);
    }

    let cols = plan(planner, h);
    for mut col in data.columns_mut() {
        let mut buf = col.to_vec();
        cols.process(&mut buf);
        col.iter_mut().zip(buf).for_each(|(dst, v)| *dst = v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::gray::{BLACK, GRAY, WHITE};

    fn mae(a: &GrayImage, b: &GrayImage) -> f64 {
        let s: u32 = a.iter().zip(b.iter()).map(|(&x, &y)| x.abs_diff(y) as u32).sum();
        s as f64 / a.size() as f64
    }

    /// 循环盒式模糊, 向零取整.
    fn circular_box_blur(img: &GrayImage, k: usize) -> GrayImage {
        let (h, w) = img.shape();
        let r = (k / 2) as isize;
        GrayImage::from_fn((h, w), |(y, x)| {
            let mut sum = 0u32;
            for dy in -r..=r {
                for dx in -r..=r {
                    let yy = (y as isize + dy).rem_euclid(h as isize) as usize;
                    let xx = (x as isize + dx).rem_euclid(w as isize) as usize;
                    sum += img[(yy, xx)] as u32;
                }
            }
            (sum / (k * k) as u32) as u8
        })
    }

    #[test]
    fn test_kernel_size() {
        assert_eq!(odd_kernel_size(0), 3);
        assert_eq!(odd_kernel_size(2), 3);
        assert_eq!(odd_kernel_size(4), 5);
        assert_eq!(odd_kernel_size(7), 7);
    }

    #[test]
    fn test_psf_sums_to_one() {
        for (shape, k) in [((16, 16), 7), ((9, 12), 5), ((2, 3), 7), ((1, 1), 3)] {
            let psf = box_psf(shape, k);
            let sum: f64 = psf.iter().map(|c| c.re).sum();
            assert!((sum - 1.0).abs() < 1e-12);
        }
        let psf = box_psf((16, 16), 3);
        assert!(psf[(0, 0)].re > 0.0);
        assert!(psf[(15, 15)].re > 0.0);
        assert_eq!(psf[(2, 2)].re, 0.0);
    }

    #[test]
    fn test_size_guard() {
        let img = GrayImage::from_fn((4, WIENER_MAX_DIM + 1), |(h, w)| ((h * 7 + w) % 256) as u8);
        let out = wiener(&RawImage::from(&img), &WienerParams::default()).unwrap();
        assert_eq!(out, img);
        assert!(wiener(&RawImage::Empty, &WienerParams::default()).is_none());
    }

    #[test]
    fn test_flat_field() {
        for value in [BLACK, 37, GRAY, 200, WHITE] {
            let img = GrayImage::filled((20, 33), value);
            for noise_ratio in [1.0, 5.0, 0.01] {
                let params = WienerParams {
                    k: 7,
                    noise_ratio,
                    ..Default::default()
                };
                let out = wiener(&RawImage::from(&img), &params).unwrap();
                assert_eq!(out, img);
            }
        }
    }

    #[test]
    fn test_plain_filter_darkens_flat_field() {
        let img = GrayImage::filled((16, 16), WHITE);
        let params = WienerParams {
            k: 7,
            noise_ratio: 1.0,
            unit_dc_gain: false,
        };
        let out = wiener(&RawImage::from(&img), &params).unwrap();
        assert!(out.iter().all(|&p| p == 127));

        let params = WienerParams {
            noise_ratio: 1e-3,
            ..params
        };
        let out = wiener(&RawImage::from(&GrayImage::filled((16, 16), GRAY)), &params).unwrap();
        assert!(out.iter().all(|&p| p.abs_diff(GRAY) <= 1));
    }

    #[test]
    fn test_inverts_blur() {
        let sharp = GrayImage::from_fn((32, 32), |(h, w)| {
            if (12..20).contains(&h) && (12..20).contains(&w) {
                200
            } else {
                40
            }
        });
        let blurred = circular_box_blur(&sharp, 5);
        let params = WienerParams {
            k: 5,
            noise_ratio: 0.01,
            ..Default::default()
        };
        let restored = wiener(&RawImage::from(&blurred), &params).unwrap();
        assert_eq!(restored.shape(), sharp.shape());
        assert!(mae(&restored, &sharp) < mae(&blurred, &sharp));
    }

    #[test]
    fn test_deterministic() {
        let img = GrayImage::from_fn((17, 23), |(h, w)| ((h * 13 + w * 29) % 251) as u8);
        let raw = RawImage::from(&img);
        let a = wiener(&raw, &WienerParams::default()).unwrap();
        let b = wiener(&raw, &WienerParams::default()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.shape(), (17, 23));
    }

    #[test]
    fn test_tiny_image_is_identity() {
        let img = GrayImage::filled((1, 1), 99);
        let out = wiener(&RawImage::from(&img), &WienerParams::default()).unwrap();
        assert_eq!(out, img);
    }
}
