//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::Idx2d;
pub use crate::{normalize_to_gray_u8, read_image, stretch_min_max};
pub use crate::{GrayImage, ImgWrite, IntensityWindow, RawImage, RoiRect};
pub use crate::{Error, Result};

pub use crate::enhance::{Pipeline, PipelineName};

pub use crate::consts::{DEFAULT_ENHANCED_ROOT, DEFAULT_LISTS_DIR, DEFAULT_SOURCE_ROOT};

pub use crate::dataset::{self, home_dataset_dir_with};
pub use crate::dataset::{
    apply_pipeline_to_lists, apply_pipeline_to_manifest, rebuild_splits_from_lists,
    split_dataset, stretch_dir,
};
pub use crate::dataset::{ClassLabel, Manifest, ManifestKey, Split};
