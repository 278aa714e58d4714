//! 图像增强算子与流水线注册表.
//!
//! 所有算子都是纯函数: 先把任意输入规范化为单通道 8-bit 灰度图,
//! 再输出形状相同的单通道 8-bit 灰度图. 空输入得到 `None`.

use std::fmt;
use std::str::FromStr;

use crate::{Error, GrayImage, RawImage};

mod bilateral;
mod border;
mod gamma;
mod gaussian;
mod histogram;
mod median;
mod nlm;
mod wiener;

pub use bilateral::{bilateral, BilateralParams};
pub use gamma::{gamma_08, gamma_12, gamma_lut, GAMMA_08_LUT, GAMMA_12_LUT};
pub use gaussian::{gaussian, unsharp, GaussianParams, UnsharpParams, UNSHARP_SIGMA};
pub use histogram::{clahe, hist_eq, ClaheParams};
pub use median::{median, MedianParams};
pub use nlm::{nlm, NlmParams, SEARCH_WINDOW, TEMPLATE_WINDOW};
pub use wiener::{wiener, WienerParams};

/// `histeq_median` 中中值滤波的窗口边长.
const HISTEQ_MEDIAN_K: usize = 3;

/// 注册表中的流水线名称. 字符串形式是对外稳定的键.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PipelineName {
    /// 双边滤波.
    Bilateral,
    /// CLAHE.
    Clahe,
    /// 全局直方图均衡化.
    HistEq,
    /// 反锐化掩模.
    Unsharp,
    /// 中值滤波.
    Median,
    /// 非局部均值去噪.
    Nlm,
    /// 伽马 0.8.
    #[cfg_attr(feature = "serde", serde(rename = "gamma_08"))]
    Gamma08,
    /// 伽马 1.2.
    #[cfg_attr(feature = "serde", serde(rename = "gamma_12"))]
    Gamma12,
    /// Wiener 反卷积.
    Wiener,
    /// 直方图均衡化后接 3x3 中值滤波.
    HisteqMedian,
    /// 高斯模糊.
    Gaussian,
}

impl PipelineName {
    /// 注册表中的全部流水线, 按对外文档的顺序.
    pub const ALL: [PipelineName; 11] = [
        Self::Bilateral,
        Self::Clahe,
        Self::HistEq,
        Self::Unsharp,
        Self::Median,
        Self::Nlm,
        Self::Gamma08,
        Self::Gamma12,
        Self::Wiener,
        Self::HisteqMedian,
        Self::Gaussian,
    ];

    /// 稳定的字符串键.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bilateral => "bilateral",
            Self::Clahe => "clahe",
            Self::HistEq => "hist_eq",
            Self::Unsharp => "unsharp",
            Self::Median => "median",
            Self::Nlm => "nlm",
            Self::Gamma08 => "gamma_08",
            Self::Gamma12 => "gamma_12",
            Self::Wiener => "wiener",
            Self::HisteqMedian => "histeq_median",
            Self::Gaussian => "gaussian",
        }
    }

    /// 以默认参数对 `img` 运行该流水线.
    #[inline]
    pub fn apply(self, img: &RawImage) -> Option<GrayImage> {
        Pipeline::from(self).apply(img)
    }
}

impl fmt::Display for PipelineName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| Error::UnknownPipelineKey(s.to_owned()))
    }
}

/// 带参数的流水线.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Pipeline {
    /// 双边滤波.
    Bilateral(BilateralParams),
    /// CLAHE.
    Clahe(ClaheParams),
    /// 全局直方图均衡化.
    HistEq,
    /// 反锐化掩模.
    Unsharp(UnsharpParams),
    /// 中值滤波.
    Median(MedianParams),
    /// 非局部均值去噪.
    Nlm(NlmParams),
    /// 伽马 0.8.
    Gamma08,
    /// 伽马 1.2.
    Gamma12,
    /// Wiener 反卷积.
    Wiener(WienerParams),
    /// 直方图均衡化后接 3x3 中值滤波.
    HisteqMedian,
    /// 高斯模糊.
    Gaussian(GaussianParams),
}

impl Pipeline {
    /// 对应的注册表名称.
    pub fn name(&self) -> PipelineName {
        match self {
            Self::Bilateral(_) => PipelineName::Bilateral,
            Self::Clahe(_) => PipelineName::Clahe,
            Self::HistEq => PipelineName::HistEq,
            Self::Unsharp(_) => PipelineName::Unsharp,
            Self::Median(_) => PipelineName::Median,
            Self::Nlm(_) => PipelineName::Nlm,
            Self::Gamma08 => PipelineName::Gamma08,
            Self::Gamma12 => PipelineName::Gamma12,
            Self::Wiener(_) => PipelineName::Wiener,
            Self::HisteqMedian => PipelineName::HisteqMedian,
            Self::Gaussian(_) => PipelineName::Gaussian,
        }
    }

    /// 对 `img` 运行流水线. 空图像返回 `None`.
    pub fn apply(&self, img: &RawImage) -> Option<GrayImage> {
        match self {
            Self::Bilateral(p) => bilateral(img, p),
            Self::Clahe(p) => clahe(img, p),
            Self::HistEq => hist_eq(img),
            Self::Unsharp(p) => unsharp(img, p),
            Self::Median(p) => median(img, p),
            Self::Nlm(p) => nlm(img, p),
            Self::Gamma08 => gamma_08(img),
            Self::Gamma12 => gamma_12(img),
            Self::Wiener(p) => wiener(img, p),
            Self::HisteqMedian => {
                let eq = hist_eq(img)?;
                Some(median::median_blur(&eq, HISTEQ_MEDIAN_K))
            }
            Self::Gaussian(p) => gaussian(img, p),
        }
    }
}

impl From<PipelineName> for Pipeline {
    fn from(name: PipelineName) -> Self {
        match name {
            PipelineName::Bilateral => Self::Bilateral(Default::default()),
            PipelineName::Clahe => Self::Clahe(Default::default()),
            PipelineName::HistEq => Self::HistEq,
            PipelineName::Unsharp => Self::Unsharp(Default::default()),
            PipelineName::Median => Self::Median(Default::default()),
            PipelineName::Nlm => Self::Nlm(Default::default()),
            PipelineName::Gamma08 => Self::Gamma08,
            PipelineName::Gamma12 => Self::Gamma12,
            PipelineName::Wiener => Self::Wiener(Default::default()),
            PipelineName::HisteqMedian => Self::HisteqMedian,
            PipelineName::Gaussian => Self::Gaussian(Default::default()),
        }
    }
}

impl FromStr for Pipeline {
    type Err = Error;

    /// 以默认参数构建名为 `s` 的流水线.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<PipelineName>().map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};

    fn sample() -> GrayImage {
        GrayImage::from_fn((19, 26), |(h, w)| ((h * 37 + w * 11 + (h * w) % 7) % 256) as u8)
    }

    #[test]
    fn test_keys_round_trip() {
        let keys = [
            "bilateral",
            "clahe",
            "hist_eq",
            "unsharp",
            "median",
            "nlm",
            "gamma_08",
            "gamma_12",
            "wiener",
            "histeq_median",
            "gaussian",
        ];
        for (key, name) in keys.iter().zip(PipelineName::ALL) {
            assert_eq!(key.parse::<PipelineName>().unwrap(), name);
            assert_eq!(name.to_string(), *key);
            assert_eq!(Pipeline::from(name).name(), name);
        }
    }

    #[test]
    fn test_unknown_key() {
        for key in ["not_a_real_key", "", "Gaussian", "gamma08"] {
            match key.parse::<PipelineName>() {
                Err(Error::UnknownPipelineKey(k)) => assert_eq!(k, key),
                other => panic!("`{key}` 应当是未知键, 实际得到 {other:?}"),
            }
        }
        assert!("wiener ".parse::<Pipeline>().is_err());
    }

    #[test]
    fn test_dims_and_determinism() {
        let inputs = [
            RawImage::from(sample()),
            RawImage::Gray16(Array2::from_shape_fn((7, 5), |(h, w)| (h * 1000 + w * 90) as u16)),
            RawImage::BgrF32(Array3::from_shape_fn((6, 9, 3), |(h, w, c)| {
                (h * 30 + w * 20 + c * 5) as f32 + 0.5
            })),
            RawImage::Gray8(Array2::from_elem((1, 1), 77)),
        ];
        for name in PipelineName::ALL {
            for img in inputs.iter() {
                let a = name.apply(img).unwrap();
                let b = name.apply(img).unwrap();
                assert_eq!(a.shape(), img.shape(), "{name}");
                assert_eq!(a, b, "{name}");
            }
            assert!(name.apply(&RawImage::Empty).is_none());
        }
    }

    #[test]
    fn test_histeq_median_composite() {
        let img = RawImage::from(sample());
        let eq = hist_eq(&img).unwrap();
        let want = median(&RawImage::from(eq), &MedianParams { k: 3 }).unwrap();
        assert_eq!(PipelineName::HisteqMedian.apply(&img).unwrap(), want);
    }

    #[test]
    fn test_custom_params() {
        let img = RawImage::from(sample());
        let weak = Pipeline::Unsharp(UnsharpParams { amount: 0.0 });
        assert_eq!(weak.apply(&img).unwrap(), sample());
        assert_ne!(Pipeline::Unsharp(UnsharpParams { amount: 2.0 }).apply(&img), Some(sample()));
    }
}
