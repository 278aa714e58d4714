use std::ops::{Index, IndexMut};

use ndarray::iter::Iter;
use ndarray::{Array2, Array3, ArrayView2, Ix2};

use crate::Idx2d;

mod io;
mod normalize;
mod roi;
pub mod window;

pub use io::{read_image, ImgWrite};
pub(crate) use normalize::{round_u8, saturate_u8};
pub use normalize::{normalize_to_gray_u8, stretch_min_max};
pub use roi::RoiRect;
pub use window::IntensityWindow;

/// 拥有所有权的单通道 8-bit 灰度图像. 以 `(高, 宽)` 索引.
///
/// 所有增强算子的输入和输出都是该类型.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GrayImage {
    data: Array2<u8>,
}

impl GrayImage {
    /// 直接初始化.
    #[inline]
    pub fn new(data: Array2<u8>) -> Self {
        Self { data }
    }

    /// 以常数 `value` 填充形状为 `(h, w)` 的图像.
    #[inline]
    pub fn filled((h, w): Idx2d, value: u8) -> Self {
        Self::new(Array2::from_elem((h, w), value))
    }

    /// 以 `f(位置)` 计算每个像素.
    #[inline]
    pub fn from_fn<F: FnMut(Idx2d) -> u8>(shape: Idx2d, f: F) -> Self {
        Self::new(Array2::from_shape_fn(shape, f))
    }

    /// 图像的分辨率 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }

    /// 图像高度.
    #[inline]
    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    /// 图像宽度.
    #[inline]
    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    /// 图像的像素个数.
    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 图像是否不含任何像素.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 获取可以迭代图像像素的迭代器 (行优先).
    #[inline]
    pub fn iter(&self) -> Iter<'_, u8, Ix2> {
        self.data.iter()
    }

    /// 获得底层数据的一份不可变 shallow copy.
    #[inline]
    pub fn array_view(&self) -> ArrayView2<u8> {
        self.data.view()
    }

    /// 消费自我, 获得底层数据.
    #[inline]
    pub fn into_array(self) -> Array2<u8> {
        self.data
    }

    /// 按 256 项查找表逐像素映射.
    pub fn map_lut(&self, lut: &[u8; 256]) -> Self {
        Self::new(self.data.mapv(|p| lut[p as usize]))
    }

    /// 灰度直方图.
    pub fn histogram(&self) -> [u32; 256] {
        let mut hist = [0u32; 256];
        self.data.iter().for_each(|&p| hist[p as usize] += 1);
        hist
    }

    /// 转换为 `[0, 1]` 浮点平面.
    pub fn to_unit_f64(&self) -> Array2<f64> {
        self.data.mapv(|p| p as f64 / 255.0)
    }
}

impl Index<Idx2d> for GrayImage {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx2d> for GrayImage {
    #[inline]
    fn index_mut(&mut self, index: Idx2d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

/// 尚未规范化的任意图像.
///
/// 对应 "0, 1, 3 通道, 任意样本类型" 的输入. 三通道数据按 BGR 顺序存储,
/// 形状为 `(高, 宽, 3)`.
#[derive(Clone, Debug)]
pub enum RawImage {
    /// 空图像 (读取失败或没有通道).
    Empty,

    /// 单通道 8-bit.
    Gray8(Array2<u8>),

    /// 单通道 16-bit.
    Gray16(Array2<u16>),

    /// 单通道浮点.
    GrayF32(Array2<f32>),

    /// 三通道 8-bit, BGR.
    Bgr8(Array3<u8>),

    /// 三通道 16-bit, BGR.
    Bgr16(Array3<u16>),

    /// 三通道浮点, BGR.
    BgrF32(Array3<f32>),
}

impl RawImage {
    /// 图像的分辨率 (高, 宽). 空图像为 `(0, 0)`.
    pub fn shape(&self) -> Idx2d {
        match self {
            RawImage::Empty => (0, 0),
            RawImage::Gray8(a) => a.dim(),
            RawImage::Gray16(a) => a.dim(),
            RawImage::GrayF32(a) => a.dim(),
            RawImage::Bgr8(a) => (a.dim().0, a.dim().1),
            RawImage::Bgr16(a) => (a.dim().0, a.dim().1),
            RawImage::BgrF32(a) => (a.dim().0, a.dim().1),
        }
    }

    /// 通道个数. 空图像为 0.
    pub fn channels(&self) -> usize {
        match self {
            RawImage::Empty => 0,
            RawImage::Gray8(_) | RawImage::Gray16(_) | RawImage::GrayF32(_) => 1,
            RawImage::Bgr8(_) | RawImage::Bgr16(_) | RawImage::BgrF32(_) => 3,
        }
    }

    /// 是否不含任何像素. 通道轴长度不为 3 的 BGR 数据同样视为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        let (h, w) = self.shape();
        h == 0 || w == 0 || !self.has_bgr_channels()
    }

    fn has_bgr_channels(&self) -> bool {
        match self {
            RawImage::Bgr8(a) => a.dim().2 == 3,
            RawImage::Bgr16(a) => a.dim().2 == 3,
            RawImage::BgrF32(a) => a.dim().2 == 3,
            _ => true,
        }
    }
}

impl From<GrayImage> for RawImage {
    #[inline]
    fn from(value: GrayImage) -> Self {
        RawImage::Gray8(value.into_array())
    }
}

impl From<&GrayImage> for RawImage {
    #[inline]
    fn from(value: &GrayImage) -> Self {
        RawImage::Gray8(value.data.clone())
    }
}
