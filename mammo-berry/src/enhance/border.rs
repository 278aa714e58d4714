//! 图像边界外推.

use ndarray::{Array2, ArrayView2};

/// `gfedcb|abcdefgh|gfedcba` 式外推 (边界像素不重复), 返回 `[0, n)` 内的索引.
///
/// `n` 必须大于 0. 对任意远的越界索引都有效.
#[inline]
pub(crate) fn reflect101(i: isize, n: usize) -> usize {
    debug_assert!(n > 0, "长度必须为正");
    if n == 1 {
        return 0;
    }
    let n = n as isize;
    let period = 2 * (n - 1);
    let mut i = i.rem_euclid(period);
    if i >= n {
        i = period - i;
    }
    i as usize
}

/// `aaaaaa|abcdefgh|hhhhhhh` 式外推, 返回 `[0, n)` 内的索引.
#[inline]
pub(crate) fn replicate(i: isize, n: usize) -> usize {
    debug_assert!(n > 0, "长度必须为正");
    i.clamp(0, n as isize - 1) as usize
}

/// 以 reflect-101 方式在四周填充图像. 参数依次为上, 下, 左, 右的填充宽度.
pub(crate) fn pad_reflect101(
    src: ArrayView2<u8>,
    (top, bottom, left, right): (usize, usize, usize, usize),
) -> Array2<u8> {
    let (h, w) = src.dim();
    Array2::from_shape_fn((h + top + bottom, w + left + right), |(y, x)| {
        let sy = reflect101(y as isize - top as isize, h);
        let sx = reflect101(x as isize - left as isize, w);
        src[(sy, sx)]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_reflect101() {
        let got: Vec<usize> = (-4..9).map(|i| reflect101(i, 5)).collect();
        assert_eq!(got, vec![4, 3, 2, 1, 0, 1, 2, 3, 4, 3, 2, 1, 0]);
        assert_eq!(reflect101(-7, 1), 0);
        assert_eq!(reflect101(100, 2), 0);
        assert_eq!(reflect101(101, 2), 1);
    }

    #[test]
    fn test_replicate() {
        assert_eq!(replicate(-3, 4), 0);
        assert_eq!(replicate(2, 4), 2);
        assert_eq!(replicate(9, 4), 3);
    }

    #[test]
    fn test_pad() {
        let a = arr2(&[[1u8, 2, 3], [4, 5, 6]]);
        let p = pad_reflect101(a.view(), (1, 0, 2, 1));
        assert_eq!(
            p,
            arr2(&[[6u8, 5, 4, 5, 6, 5], [3, 2, 1, 2, 3, 2], [6, 5, 4, 5, 6, 5]])
        );
    }
}
