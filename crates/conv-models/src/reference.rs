//! CPU reference path
//!
//! Everything here uses [`conv_chip::compute`], the same 16-bit wrapping
//! arithmetic the accelerator implements, so accelerator output and reference
//! output are comparable bit for bit.

use conv_chip::kernel::{Weights, Window, SIDE};

/// Valid-mode 3×3 convolution of a row-major `width × height` map
///
/// Returns `(width - 2) × (height - 2)` outputs, or an empty vector when the
/// map is smaller than the kernel or `map.len()` does not match.
pub fn conv2d_valid(map: &[i8], width: usize, height: usize, weights: &Weights) -> Vec<i16> {
    if width < SIDE || height < SIDE || map.len() != width * height {
        return Vec::new();
    }
    let out_w = width - SIDE + 1;
    let out_h = height - SIDE + 1;
    let mut out = Vec::with_capacity(out_w * out_h);
    for y in 0..out_h {
        for x in 0..out_w {
            // In bounds by construction.
            if let Some(window) = Window::from_patch(map, width, x, y) {
                out.push(conv_chip::compute(&window, weights));
            }
        }
    }
    out
}

/// Clamp negatives to zero
pub fn relu(values: &[i16]) -> Vec<i16> {
    values.iter().map(|&v| v.max(0)).collect()
}

/// Non-overlapping `pool × pool` max pooling
///
/// Trailing rows and columns that do not fill a whole pool are dropped.
/// Returns the pooled map and its dimensions.
pub fn max_pool(
    map: &[i16],
    width: usize,
    height: usize,
    pool: usize,
) -> (Vec<i16>, usize, usize) {
    if pool == 0 || map.len() != width * height {
        return (Vec::new(), 0, 0);
    }
    let out_w = width / pool;
    let out_h = height / pool;
    let mut out = Vec::with_capacity(out_w * out_h);
    for oy in 0..out_h {
        for ox in 0..out_w {
            let mut best = i16::MIN;
            for dy in 0..pool {
                let row = (oy * pool + dy) * width;
                for dx in 0..pool {
                    best = best.max(map[row + ox * pool + dx]);
                }
            }
            out.push(best);
        }
    }
    (out, out_w, out_h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_over_ramp() {
        // 4x4 map 0..16, box kernel: each output is the 3x3 neighbourhood sum.
        let map: Vec<i8> = (0..16).collect();
        let out = conv2d_valid(&map, 4, 4, &Weights::BOX);
        assert_eq!(out, vec![45, 54, 81, 90]);
    }

    #[test]
    fn identity_kernel_picks_centre() {
        let map: Vec<i8> = (0..25).map(|i| i - 12).collect();
        let out = conv2d_valid(&map, 5, 5, &Weights::IDENTITY);
        assert_eq!(out, vec![-6, -5, -4, -1, 0, 1, 4, 5, 6]);
    }

    #[test]
    fn reference_wraps_like_hardware() {
        let map = [127i8; 9];
        let out = conv2d_valid(&map, 3, 3, &Weights::splat(127));
        assert_eq!(out, vec![14_089]);
    }

    #[test]
    fn undersized_or_mismatched_maps_give_nothing() {
        assert!(conv2d_valid(&[0; 4], 2, 2, &Weights::BOX).is_empty());
        assert!(conv2d_valid(&[0; 8], 3, 3, &Weights::BOX).is_empty());
    }

    #[test]
    fn relu_zeroes_negatives() {
        assert_eq!(relu(&[-5, 0, 7, i16::MIN]), vec![0, 0, 7, 0]);
    }

    #[test]
    fn max_pool_drops_ragged_edge() {
        #[rustfmt::skip]
        let map = [
            1, 2, 3, 4, 9,
            5, 6, 7, 8, 9,
            -1, -2, -3, -4, 9,
        ];
        let (out, w, h) = max_pool(&map, 5, 3, 2);
        assert_eq!((w, h), (2, 1));
        assert_eq!(out, vec![6, 8]);
    }

    #[test]
    fn max_pool_zero_is_empty() {
        assert_eq!(max_pool(&[1, 2, 3, 4], 2, 2, 0), (Vec::new(), 0, 0));
    }
}
