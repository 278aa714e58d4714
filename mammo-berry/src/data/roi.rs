use ndarray::s;

use super::GrayImage;

/// 矩形感兴趣区域. `(x, y)` 为左上角的列/行坐标, `(w, h)` 为宽高.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoiRect {
    /// 左上角列坐标.
    pub x: usize,
    /// 左上角行坐标.
    pub y: usize,
    /// 宽度.
    pub w: usize,
    /// 高度.
    pub h: usize,
}

impl RoiRect {
    /// 以 `(x, y, w, h)` 构建.
    #[inline]
    pub fn new(x: usize, y: usize, w: usize, h: usize) -> Self {
        Self { x, y, w, h }
    }
}

impl From<(usize, usize, usize, usize)> for RoiRect {
    #[inline]
    fn from((x, y, w, h): (usize, usize, usize, usize)) -> Self {
        Self::new(x, y, w, h)
    }
}

impl GrayImage {
    /// 裁剪出 `roi` 覆盖的区域. 超出图像的部分被截掉.
    ///
    /// 截断后为空 (如 `roi` 完全位于图像之外) 时返回 `None`.
    pub fn crop(&self, roi: RoiRect) -> Option<GrayImage> {
        let (height, width) = self.shape();
        let (y0, x0) = (roi.y.min(height), roi.x.min(width));
        let y1 = roi.y.saturating_add(roi.h).min(height);
        let x1 = roi.x.saturating_add(roi.w).min(width);
        if y0 >= y1 || x0 >= x1 {
            return None;
        }
        Some(GrayImage::new(self.data.slice(s![y0..y1, x0..x1]).to_owned()))
    }
}
