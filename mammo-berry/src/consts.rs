//! 通用常量.

/// 单通道颜色.
pub mod gray {
    /// 单通道黑色.
    pub const BLACK: u8 = 0b_0000_0000;

    /// 单通道灰色.
    pub const GRAY: u8 = 0b_1000_0000;

    /// 单通道白色.
    pub const WHITE: u8 = 0b_1111_1111;

    /// 灰度级个数.
    pub const LEVELS: usize = 256;
}

/// 清单中所有路径共同的相对根目录.
pub const DEFAULT_SOURCE_ROOT: &str = "data/preprocessed";

/// 增强结果的默认根目录. 实际输出位于 `{DEFAULT_ENHANCED_ROOT}/{pipeline}`.
pub const DEFAULT_ENHANCED_ROOT: &str = "data/enhanced";

/// 基线实验清单目录.
pub const DEFAULT_LISTS_DIR: &str = "experiments/exp0_baseline/config";

/// Wiener 滤波能处理的最大边长. 超过该值的图像原样返回.
pub const WIENER_MAX_DIM: usize = 1024;

/// 默认训练集比例.
pub const DEFAULT_TRAIN_PCT: f64 = 0.70;

/// 默认验证集比例. 测试集比例为剩余部分.
pub const DEFAULT_VAL_PCT: f64 = 0.15;

/// 数据集划分的默认随机种子.
pub const DEFAULT_SEED: u64 = 42;

/// 数据集中被认为是图像的文件扩展名 (小写).
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "tif", "tiff", "bmp"];

/// 判断 `path` 是否带有受支持的图像扩展名 (大小写不敏感).
pub fn has_image_extension(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::has_image_extension;
    use std::path::Path;

    #[test]
    fn test_image_extension() {
        assert!(has_image_extension(Path::new("a/b/P_00001_LEFT_CC.JPG")));
        assert!(has_image_extension(Path::new("x.tiff")));
        assert!(!has_image_extension(Path::new("x.dcm")));
        assert!(!has_image_extension(Path::new("benign")));
    }
}
