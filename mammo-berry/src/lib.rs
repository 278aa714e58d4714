#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 为 CBIS-DDSM 乳腺钼靶数据集提供图像增强流水线, 批量处理,
//! 以及按病人划分训练/验证/测试集的基础算法.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 所有增强算子都只处理单通道 8-bit 灰度图. 任意输入 (单通道/三通道, 任意样本类型)
//!   都会先经过 [`normalize_to_gray_u8`] 规范化.
//! 2. 对固定的输入图像和参数, 所有算子的输出逐字节确定, 与调用顺序和并行度无关.
//! 3. 单张图像的失败 (无法读取, 空图像) 不会中断批处理; 未知的流水线名称会在任何
//!   文件 I/O 之前直接报错.
//!
//! # 开发计划
//!
//! ### 图像规范化 ✅
//!
//! 三通道 (BGR) 转灰度, 非 8-bit 样本截断到 `[0, 255]`.
//! 另提供 min-max 强度窗, 用于把 16-bit DICOM 导出图拉伸到 8-bit.
//!
//! 实现位于 `mammo-berry/src/data`.
//!
//! ### 增强算子与注册表 ✅
//!
//! bilateral, clahe, hist_eq, unsharp, median, nlm, gamma_08, gamma_12,
//! wiener, histeq_median, gaussian. 以 [`PipelineName`] 枚举作为稳定的字符串键.
//!
//! 实现位于 `mammo-berry/src/enhance`.
//!
//! ### 频域 Wiener 反卷积 ✅
//!
//! 盒式 PSF, 循环移位到原点, 二维 DFT, 带正则项的除法.
//! 超过 1024 像素边长的图像原样返回 (性能上限).
//!
//! 实现位于 `mammo-berry/src/enhance/wiener.rs`.
//!
//! ### 清单批处理 ✅
//!
//! 按清单文件 (每行一个路径) 批量增强, 保持相对路径, 跳过无法读取的图像.
//!
//! 实现位于 `mammo-berry/src/dataset/batch.rs`.
//!
//! ### 标签关联与数据集划分 ✅
//!
//! 1. 从病例描述 CSV 中提取病人 ID / DICOM UID 与良恶性标签. ✅
//! 2. 按图像或按病人 (防止同一病人跨集合泄漏) 划分 train/val/test. ✅
//! 3. 根据清单在新的根目录上重建划分目录树. ✅
//!
//! 实现位于 `mammo-berry/src/dataset/*`.

/// 二维索引 `(高, 宽)`.
pub type Idx2d = (usize, usize);

/// 灰度图像基础数据结构.
mod data;

pub use data::{
    normalize_to_gray_u8, read_image, stretch_min_max, GrayImage, ImgWrite, IntensityWindow,
    RawImage, RoiRect,
};

pub mod consts;

pub mod dataset;
pub mod enhance;

mod error;

pub use enhance::{Pipeline, PipelineName};
pub use error::{Error, Result};

pub mod prelude;
