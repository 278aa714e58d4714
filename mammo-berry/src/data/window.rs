use ndarray::ArrayView2;

use super::normalize::luma_plane_f64;
use super::RawImage;

/// 强度窗口, 包含窗位 (level) 和窗宽 (width).
///
/// 用于把高位深 (如 16-bit DICOM 导出) 的强度映射到 8-bit 灰度.
/// 该窗口是只读的. 若要修改窗口参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IntensityWindow {
    level: f32,
    width: f32,
}

impl IntensityWindow {
    /// 构建强度窗.
    ///
    /// `level` 和 `width` 必须在合理范围内, 否则返回 `None`.
    pub fn new(level: f32, width: f32) -> Option<IntensityWindow> {
        if level.is_finite() && width.is_finite() && 0.0 < width {
            Some(Self { level, width })
        } else {
            None
        }
    }

    /// 以图像自身的最小/最大亮度构建窗口. 空图像返回 `None`.
    ///
    /// 常数图像得到宽度为 0 的窗口, 所有像素都映射为 0.
    pub fn min_max(img: &RawImage) -> Option<IntensityWindow> {
        Self::from_plane(luma_plane_f64(img)?.view())
    }

    pub(crate) fn from_plane(plane: ArrayView2<f64>) -> Option<IntensityWindow> {
        let (lo, hi) = plane
            .iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f64, f64)>, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })?;
        Some(Self {
            level: ((lo + hi) / 2.0) as f32,
            width: (hi - lo) as f32,
        })
    }

    /// 窗下限.
    #[inline]
    pub fn lower_bound(&self) -> f32 {
        self.level - self.width / 2.0
    }

    /// 窗上限.
    #[inline]
    pub fn upper_bound(&self) -> f32 {
        self.level + self.width / 2.0
    }

    /// 窗位.
    #[inline]
    pub fn level(&self) -> f32 {
        self.level
    }

    /// 窗宽.
    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    /// 求在当前窗设置下, 强度 `v` 对应的灰度图像素整数值 (0 <= value <= 255).
    ///
    /// 如果 `v` 无意义 (如 inf, NaN), 则返回 `None`.
    pub fn eval(&self, v: f32) -> Option<u8> {
        if !v.is_finite() {
            return None;
        }
        let lb = self.lower_bound();
        if v <= lb {
            Some(u8::MIN)
        } else if v >= self.upper_bound() {
            Some(u8::MAX)
        } else {
            // 255, not 256.
            Some((((v - lb) / self.width()) * 255.0) as u8)
        }
    }
}
