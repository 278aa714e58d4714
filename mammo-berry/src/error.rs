//! 运行时错误.

use std::path::PathBuf;

/// 增强、批处理与数据集划分的运行时错误.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// 流水线名称不在注册表中. 对整个调用是致命的.
    #[error("unknown pipeline key `{0}`")]
    UnknownPipelineKey(String),

    /// 源文件不存在或无法解码. 批处理时只跳过该图像.
    #[error("unreadable image {path:?}: {reason}")]
    UnreadableImage {
        /// 源文件路径.
        path: PathBuf,
        /// 底层原因.
        reason: String,
    },

    /// 退化输入 (空图像). 批处理时与 [`Error::UnreadableImage`] 同等对待.
    #[error("empty image {0:?}")]
    EmptyImage(PathBuf),

    /// 清单文件不存在.
    #[error("manifest {0:?} does not exist")]
    MissingManifest(PathBuf),

    /// 标签 CSV 文件不存在.
    #[error("csv file {0:?} does not exist")]
    MissingCsv(PathBuf),

    /// 划分比例不合法.
    ///
    /// 两个参数分别为训练集和验证集比例.
    #[error("invalid split ratio: train = {train}, val = {val}")]
    InvalidSplit {
        /// 训练集比例.
        train: f64,
        /// 验证集比例.
        val: f64,
    },

    /// 底层 I/O 错误.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// 图像编码错误.
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// CSV 解析错误.
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// 本 crate 的结果类型.
pub type Result<T> = std::result::Result<T, Error>;
