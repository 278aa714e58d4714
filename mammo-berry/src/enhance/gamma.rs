//! 伽马校正查找表.

use once_cell::sync::Lazy;

use crate::consts::gray::LEVELS;
use crate::data::round_u8;
use crate::{normalize_to_gray_u8, GrayImage, RawImage};

/// `gamma = 0.8` 的查找表, 首次使用时计算, 之后只读.
pub static GAMMA_08_LUT: Lazy<[u8; LEVELS]> = Lazy::new(|| gamma_lut(0.8));

/// `gamma = 1.2` 的查找表, 首次使用时计算, 之后只读.
pub static GAMMA_12_LUT: Lazy<[u8; LEVELS]> = Lazy::new(|| gamma_lut(1.2));

/// 构建查找表 `LUT[i] = round((i / 255)^gamma * 255)`.
pub fn gamma_lut(gamma: f64) -> [u8; LEVELS] {
    let mut lut = [0u8; LEVELS];
    for (i, v) in lut.iter_mut().enumerate() {
        *v = round_u8((i as f64 / 255.0).powf(gamma) * 255.0);
    }
    lut
}

/// 以 `gamma = 0.8` 提亮暗部.
pub fn gamma_08(img: &RawImage) -> Option<GrayImage> {
    Some(normalize_to_gray_u8(img)?.map_lut(&GAMMA_08_LUT))
}

/// 以 `gamma = 1.2` 压暗暗部.
pub fn gamma_12(img: &RawImage) -> Option<GrayImage> {
    Some(normalize_to_gray_u8(img)?.map_lut(&GAMMA_12_LUT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lut_values() {
        for (lut, gamma) in [(&*GAMMA_08_LUT, 0.8f64), (&*GAMMA_12_LUT, 1.2)] {
            assert_eq!(lut[0], 0);
            assert_eq!(lut[255], 255);
            for i in 0..LEVELS {
                let want = ((i as f64 / 255.0).powf(gamma) * 255.0).round() as u8;
                assert_eq!(lut[i], want);
            }
        }
        assert!(GAMMA_08_LUT[128] > 128);
        assert!(GAMMA_12_LUT[128] < 128);
    }

    #[test]
    fn test_gamma_per_pixel() {
        let img = GrayImage::from_fn((16, 16), |(h, w)| (h * 16 + w) as u8);
        let raw = RawImage::from(&img);
        let a = gamma_08(&raw).unwrap();
        let b = gamma_12(&raw).unwrap();
        for ((&x, &p), &q) in img.iter().zip(a.iter()).zip(b.iter()) {
            let v = x as f64 / 255.0;
            assert_eq!(p, (v.powf(0.8) * 255.0).round() as u8);
            assert_eq!(q, (v.powf(1.2) * 255.0).round() as u8);
        }
    }
}
