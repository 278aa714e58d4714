//! 全局直方图均衡化与 CLAHE.

use ndarray::{s, Array2};

use super::border::pad_reflect101;
use crate::consts::gray::LEVELS;
use crate::data::round_u8;
use crate::{normalize_to_gray_u8, GrayImage, RawImage};

/// CLAHE 参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClaheParams {
    /// 对比度限制. 不大于 0 时不做裁剪 (即普通的分块均衡).
    pub clip_limit: f64,

    /// 分块网格 `(列数, 行数)`. 0 按 1 处理.
    pub tile_grid: (usize, usize),
}

impl Default for ClaheParams {
    fn default() -> Self {
        Self {
            clip_limit: 2.0,
            tile_grid: (8, 8),
        }
    }
}

/// 全局直方图均衡化.
pub fn hist_eq(img: &RawImage) -> Option<GrayImage> {
    let src = normalize_to_gray_u8(img)?;
    Some(equalize(&src))
}

pub(crate) fn equalize(src: &GrayImage) -> GrayImage {
    let hist = src.histogram();
    let total = src.size() as u32;

    let Some(first) = hist.iter().position(|&n| n != 0) else {
        return src.clone();
    };
    // 常数图像.
    if hist[first] == total {
        return src.clone();
    }

    let scale = 255.0 / (total - hist[first]) as f64;
    let mut lut = [0u8; LEVELS];
    let mut acc = 0u32;
    for (level, &n) in hist.iter().enumerate().skip(first + 1) {
        acc += n;
        lut[level] = round_u8(acc as f64 * scale);
    }
    src.map_lut(&lut)
}

/// 限制对比度的自适应直方图均衡化.
///
/// 每个分块单独计算裁剪后的直方图及其映射表,
/// 像素值由相邻 4 个分块的映射结果双线性插值得到.
pub fn clahe(img: &RawImage, params: &ClaheParams) -> Option<GrayImage> {
    let src = normalize_to_gray_u8(img)?;
    let (h, w) = src.shape();
    let tiles_x = params.tile_grid.0.max(1);
    let tiles_y = params.tile_grid.1.max(1);

    // 直方图在补齐到分块整数倍的图像上统计.
    let pad_y = (tiles_y - h % tiles_y) % tiles_y;
    let pad_x = (tiles_x - w % tiles_x) % tiles_x;
    let padded = pad_reflect101(src.array_view(), (0, pad_y, 0, pad_x));
    let (tile_h, tile_w) = ((h + pad_y) / tiles_y, (w + pad_x) / tiles_x);
    let tile_area = (tile_h * tile_w) as u32;

    let clip = if params.clip_limit > 0.0 {
        ((params.clip_limit * tile_area as f64 / LEVELS as f64) as u32).max(1)
    } else {
        0
    };

    let lut_scale = 255.0 / tile_area as f64;
    let mut luts = Array2::<u8>::zeros((tiles_y * tiles_x, LEVELS));
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let tile = padded.slice(s![
                ty * tile_h..(ty + 1) * tile_h,
                tx * tile_w..(tx + 1) * tile_w
            ]);
            let mut hist = [0u32; LEVELS];
            tile.iter().for_each(|&p| hist[p as usize] += 1);
            if clip > 0 {
                clip_histogram(&mut hist, clip);
            }

            let mut lut = luts.row_mut(ty * tiles_x + tx);
            let mut acc = 0u32;
            for (level, &n) in hist.iter().enumerate() {
                acc += n;
                lut[level] = round_u8(acc as f64 * lut_scale);
            }
        }
    }

    let (inv_th, inv_tw) = (1.0 / tile_h as f32, 1.0 / tile_w as f32);
    let cols: Vec<(usize, usize, f32)> = (0..w)
        .map(|x| neighbours(x as f32 * inv_tw - 0.5, tiles_x))
        .collect();
    Some(GrayImage::from_fn((h, w), |(y, x)| {
        let (ty1, ty2, ya) = neighbours(y as f32 * inv_th - 0.5, tiles_y);
        let (tx1, tx2, xa) = cols[x];
        let v = src[(y, x)] as usize;
        let lut = |ty: usize, tx: usize| luts[(ty * tiles_x + tx, v)] as f32;
        let top = lut(ty1, tx1) * (1.0 - xa) + lut(ty1, tx2) * xa;
        let bottom = lut(ty2, tx1) * (1.0 - xa) + lut(ty2, tx2) * xa;
        round_u8(top * (1.0 - ya) + bottom * ya)
    }))
}

/// 裁剪直方图, 将超出部分平均分配回所有灰度级.
fn clip_histogram(hist: &mut [u32; LEVELS], clip: u32) {
    let mut clipped = 0;
    for n in hist.iter_mut() {
        if *n > clip {
            clipped += *n - clip;
            *n = clip;
        }
    }

    let batch = clipped / LEVELS as u32;
    let mut residual = clipped as usize - batch as usize * LEVELS;
    hist.iter_mut().for_each(|n| *n += batch);
    if residual != 0 {
        let step = (LEVELS / residual).max(1);
        let mut level = 0;
        while level < LEVELS && residual > 0 {
            hist[level] += 1;
            level += step;
            residual -= 1;
        }
    }
}

/// 浮点分块坐标 -> (左/上分块, 右/下分块, 插值权重).
#[inline]
fn neighbours(t: f32, tiles: usize) -> (usize, usize, f32) {
    let t1 = t.floor();
    let alpha = t - t1;
    let t1 = t1 as isize;
    let lo = t1.max(0) as usize;
    let hi = ((t1 + 1) as usize).min(tiles - 1);
    (lo, hi, alpha)
}
