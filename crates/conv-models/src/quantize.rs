//! Pixel quantization and image preprocessing
//!
//! Grayscale pixels are `u8` in `0..=255`; the accelerator takes `i8`.
//! [`Quantization::Scale`] maps linearly onto `0..=127` and never produces a
//! negative tap. [`Quantization::Centered`] subtracts a mean first so dark
//! pixels become negative, which is what edge kernels want.

use crate::error::{ModelError, Result};
use crate::image::GrayImage;
use conv_chip::kernel::{Window, SIDE, TAPS};
use tracing::debug;

/// Side length of the square the preprocessor resizes to
pub const DEFAULT_SIDE: usize = 32;

/// Pixel → int8 mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quantization {
    /// `q = p * 127 / 255`, floored; range `0..=127`
    #[default]
    Scale,
    /// `q = floor((p - mean) / scale)`, clamped to `i8`
    ///
    /// A `scale` of zero is treated as one.
    Centered {
        /// Value mapped to zero
        mean: i16,
        /// Divisor applied after centring
        scale: i16,
    },
}

impl Quantization {
    /// Centred mapping onto roughly `-64..=63`
    pub const CENTERED: Self = Self::Centered {
        mean: 128,
        scale: 2,
    };

    /// Quantize one pixel
    #[allow(clippy::cast_possible_truncation)]
    pub fn quantize_pixel(self, p: u8) -> i8 {
        let q = match self {
            Self::Scale => i32::from(p) * 127 / 255,
            Self::Centered { mean, scale } => {
                let scale = if scale == 0 { 1 } else { scale };
                (i32::from(p) - i32::from(mean)).div_euclid(i32::from(scale))
            }
        };
        q.clamp(i32::from(i8::MIN), i32::from(i8::MAX)) as i8
    }

    /// Quantize every pixel in row-major order
    pub fn quantize_image(self, image: &GrayImage) -> Vec<i8> {
        image
            .pixels()
            .iter()
            .map(|&p| self.quantize_pixel(p))
            .collect()
    }
}

/// Image → accelerator operands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preprocessor {
    side: usize,
    quantization: Quantization,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self {
            side: DEFAULT_SIDE,
            quantization: Quantization::Scale,
        }
    }
}

impl Preprocessor {
    /// Resize to `side × side`, then quantize
    ///
    /// # Errors
    ///
    /// Returns `InvalidImage` if `side` is smaller than the 3×3 kernel.
    pub fn new(side: usize, quantization: Quantization) -> Result<Self> {
        if side < SIDE {
            return Err(ModelError::invalid_image(format!(
                "preprocess side {side} is smaller than the kernel"
            )));
        }
        Ok(Self { side, quantization })
    }

    /// Same geometry, different quantization
    #[must_use]
    pub const fn with_quantization(mut self, quantization: Quantization) -> Self {
        self.quantization = quantization;
        self
    }

    /// Target side length
    pub const fn side(&self) -> usize {
        self.side
    }

    /// Quantization in use
    pub const fn quantization(&self) -> Quantization {
        self.quantization
    }

    /// Quantized `side × side` map, row-major
    pub fn feature_map(&self, image: &GrayImage) -> Vec<i8> {
        let resized = image.resize(self.side, self.side);
        debug!(
            "Preprocess {}x{} -> {}x{} ({:?})",
            image.width(),
            image.height(),
            self.side,
            self.side,
            self.quantization
        );
        self.quantization.quantize_image(&resized)
    }

    /// The top-left 3×3 patch of the resized image, quantized
    pub fn window(&self, image: &GrayImage) -> Window {
        let resized = image.resize(self.side, self.side);
        let mut taps = [0i8; TAPS];
        for (i, tap) in taps.iter_mut().enumerate() {
            let p = resized.pixels()[(i / SIDE) * self.side + i % SIDE];
            *tap = self.quantization.quantize_pixel(p);
        }
        Window(taps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_covers_zero_to_127() {
        let q = Quantization::Scale;
        assert_eq!(q.quantize_pixel(0), 0);
        assert_eq!(q.quantize_pixel(1), 0);
        assert_eq!(q.quantize_pixel(2), 0);
        assert_eq!(q.quantize_pixel(3), 1);
        assert_eq!(q.quantize_pixel(128), 63);
        assert_eq!(q.quantize_pixel(255), 127);
        assert!((0..=255u8).all(|p| (0..=127).contains(&q.quantize_pixel(p))));
    }

    #[test]
    fn centered_floors_toward_negative() {
        let q = Quantization::CENTERED;
        assert_eq!(q.quantize_pixel(128), 0);
        assert_eq!(q.quantize_pixel(129), 0);
        assert_eq!(q.quantize_pixel(127), -1);
        assert_eq!(q.quantize_pixel(0), -64);
        assert_eq!(q.quantize_pixel(255), 63);
    }

    #[test]
    fn centered_clamps_to_i8() {
        let q = Quantization::Centered { mean: 0, scale: 1 };
        assert_eq!(q.quantize_pixel(200), 127);
        let q = Quantization::Centered {
            mean: 255,
            scale: 0,
        };
        assert_eq!(q.quantize_pixel(0), -128);
    }

    #[test]
    fn window_is_top_left_patch() {
        let pixels: Vec<u8> = (0..32 * 32).map(|i| (i % 256) as u8).collect();
        let img = GrayImage::new(32, 32, pixels).unwrap();
        let pre = Preprocessor::default();
        let w = pre.window(&img);
        let q = Quantization::Scale;
        assert_eq!(w.0[0], q.quantize_pixel(0));
        assert_eq!(w.0[1], q.quantize_pixel(1));
        assert_eq!(w.0[3], q.quantize_pixel(32));
        assert_eq!(w.0[8], q.quantize_pixel(66));
    }

    #[test]
    fn feature_map_has_side_squared_entries() {
        let img = GrayImage::filled(100, 60, 255);
        let map = Preprocessor::default().feature_map(&img);
        assert_eq!(map.len(), 32 * 32);
        assert!(map.iter().all(|&v| v == 127));
    }

    #[test]
    fn rejects_side_below_kernel() {
        assert!(Preprocessor::new(2, Quantization::Scale).is_err());
        assert_eq!(
            Preprocessor::new(8, Quantization::CENTERED).unwrap().side(),
            8
        );
    }
}
