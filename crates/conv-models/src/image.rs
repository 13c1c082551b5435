//! 8-bit grayscale images
//!
//! Two on-disk formats are understood:
//!
//! - **Text matrix**: one row per line, whitespace-separated integers in
//!   `0..=255` (what `numpy.savetxt(..., fmt="%d")` writes)
//! - **PGM**: binary `P5` or ASCII `P2`, `maxval` up to 255
//!
//! Resizing is bilinear with half-pixel centres, the same sampling grid
//! OpenCV's `INTER_LINEAR` uses, rounded to the nearest integer.

use crate::error::{ModelError, Result};
use std::fmt::Write as _;
use std::path::Path;
use tracing::debug;

/// Row-major 8-bit grayscale image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayImage {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl GrayImage {
    /// Wrap row-major pixels
    ///
    /// # Errors
    ///
    /// Returns `InvalidImage` if a dimension is zero or the pixel count does
    /// not match.
    pub fn new(width: usize, height: usize, pixels: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ModelError::invalid_image(format!(
                "empty image {width}x{height}"
            )));
        }
        if pixels.len() != width * height {
            return Err(ModelError::invalid_image(format!(
                "{} pixels for {width}x{height}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Image with every pixel set to `value`
    ///
    /// # Panics
    ///
    /// Panics if a dimension is zero.
    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        assert!(width > 0 && height > 0, "empty image");
        Self {
            width,
            height,
            pixels: vec![value; width * height],
        }
    }

    /// Width in pixels
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Row-major pixels
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Pixel at `(x, y)`
    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        (x < self.width && y < self.height).then(|| self.pixels[y * self.width + x])
    }

    /// Load from disk, choosing the format by extension (`.txt`, `.pgm`)
    /// or, failing that, by content
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing or cannot be parsed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ModelError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let bytes = std::fs::read(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let image = match ext.as_deref() {
            Some("pgm" | "pnm") => Self::from_pgm(&bytes)?,
            Some("txt") => Self::from_text(&String::from_utf8_lossy(&bytes))?,
            _ if bytes.starts_with(b"P5") || bytes.starts_with(b"P2") => Self::from_pgm(&bytes)?,
            _ => Self::from_text(&String::from_utf8_lossy(&bytes))?,
        };

        debug!(
            "Loaded {} ({}x{})",
            path.display(),
            image.width,
            image.height
        );
        Ok(image)
    }

    /// Parse a whitespace-separated integer matrix
    ///
    /// # Errors
    ///
    /// Returns `ParseError` on non-numeric or out-of-range values and on
    /// ragged rows.
    pub fn from_text(text: &str) -> Result<Self> {
        let mut width = 0;
        let mut pixels = Vec::new();
        let mut height = 0;

        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let row_start = pixels.len();
            for tok in line.split_whitespace() {
                let value: u8 = tok.parse().map_err(|_| {
                    ModelError::parse_error(format!(
                        "line {}: '{tok}' is not a pixel value in 0..=255",
                        line_no + 1
                    ))
                })?;
                pixels.push(value);
            }
            let row_len = pixels.len() - row_start;
            if height == 0 {
                width = row_len;
            } else if row_len != width {
                return Err(ModelError::parse_error(format!(
                    "line {}: {row_len} values, previous rows have {width}",
                    line_no + 1
                )));
            }
            height += 1;
        }

        if height == 0 {
            return Err(ModelError::parse_error("no pixel rows"));
        }
        Self::new(width, height, pixels)
    }

    /// Parse a `P5` (binary) or `P2` (ASCII) portable graymap
    ///
    /// # Errors
    ///
    /// Returns `ParseError` on malformed headers, unsupported `maxval`, or
    /// truncated pixel data.
    pub fn from_pgm(bytes: &[u8]) -> Result<Self> {
        let mut cursor = PgmCursor { bytes, pos: 0 };

        let magic = cursor.token()?;
        let binary = match magic.as_str() {
            "P5" => true,
            "P2" => false,
            other => {
                return Err(ModelError::parse_error(format!(
                    "unsupported PGM magic '{other}'"
                )))
            }
        };
        let width = cursor.number()?;
        let height = cursor.number()?;
        let maxval = cursor.number()?;
        if maxval == 0 || maxval > 255 {
            return Err(ModelError::parse_error(format!(
                "maxval {maxval} not supported (1..=255)"
            )));
        }

        // Every sample takes at least one byte, which bounds any honest header.
        let count = width
            .checked_mul(height)
            .filter(|&n| n <= bytes.len())
            .ok_or_else(|| {
                ModelError::parse_error(format!(
                    "{width}x{height} raster cannot fit in {} bytes",
                    bytes.len()
                ))
            })?;
        let raw: Vec<usize> = if binary {
            // Exactly one whitespace byte separates the header from the raster.
            let start = cursor.pos + 1;
            let data = start
                .checked_add(count)
                .and_then(|end| bytes.get(start..end))
                .ok_or_else(|| {
                    ModelError::parse_error(format!(
                        "raster truncated: need {count} bytes after header"
                    ))
                })?;
            data.iter().map(|&b| usize::from(b)).collect()
        } else {
            (0..count)
                .map(|_| cursor.number())
                .collect::<Result<_>>()?
        };

        let mut pixels = Vec::with_capacity(raw.len());
        for v in raw {
            if v > maxval {
                return Err(ModelError::parse_error(format!(
                    "sample {v} exceeds maxval {maxval}"
                )));
            }
            // Stretch to the full 8-bit range.
            #[allow(clippy::cast_possible_truncation)]
            pixels.push(((v * 255 + maxval / 2) / maxval) as u8);
        }
        Self::new(width, height, pixels)
    }

    /// Serialize as a text matrix (inverse of [`Self::from_text`])
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity(self.pixels.len() * 4);
        for row in self.pixels.chunks_exact(self.width) {
            for (i, p) in row.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                let _ = write!(out, "{p}");
            }
            out.push('\n');
        }
        out
    }

    /// Bilinear resize to `width × height`
    ///
    /// # Panics
    ///
    /// Panics if a target dimension is zero.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn resize(&self, width: usize, height: usize) -> Self {
        assert!(width > 0 && height > 0, "empty resize target");
        if width == self.width && height == self.height {
            return self.clone();
        }

        let sx = self.width as f32 / width as f32;
        let sy = self.height as f32 / height as f32;
        let mut pixels = Vec::with_capacity(width * height);

        for dy in 0..height {
            let (y0, y1, fy) = sample_axis(dy, sy, self.height);
            for dx in 0..width {
                let (x0, x1, fx) = sample_axis(dx, sx, self.width);
                let p = |x: usize, y: usize| f32::from(self.pixels[y * self.width + x]);
                let top = p(x0, y0) * (1.0 - fx) + p(x1, y0) * fx;
                let bottom = p(x0, y1) * (1.0 - fx) + p(x1, y1) * fx;
                let v = top * (1.0 - fy) + bottom * fy;
                pixels.push(v.round().clamp(0.0, 255.0) as u8);
            }
        }

        Self {
            width,
            height,
            pixels,
        }
    }
}

/// Source indices and blend factor for destination index `d`
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn sample_axis(d: usize, scale: f32, len: usize) -> (usize, usize, f32) {
    let src = ((d as f32 + 0.5) * scale - 0.5).max(0.0);
    let i0 = (src.floor() as usize).min(len - 1);
    let i1 = (i0 + 1).min(len - 1);
    let frac = if i0 == i1 { 0.0 } else { src - i0 as f32 };
    (i0, i1, frac)
}

struct PgmCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl PgmCursor<'_> {
    fn skip_space_and_comments(&mut self) {
        while let Some(&b) = self.bytes.get(self.pos) {
            if b == b'#' {
                while let Some(&c) = self.bytes.get(self.pos) {
                    self.pos += 1;
                    if c == b'\n' {
                        break;
                    }
                }
            } else if b.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn token(&mut self) -> Result<String> {
        self.skip_space_and_comments();
        let start = self.pos;
        while self
            .bytes
            .get(self.pos)
            .is_some_and(|b| !b.is_ascii_whitespace())
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(ModelError::parse_error("unexpected end of PGM data"));
        }
        Ok(String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned())
    }

    fn number(&mut self) -> Result<usize> {
        let tok = self.token()?;
        tok.parse()
            .map_err(|_| ModelError::parse_error(format!("'{tok}' is not a number")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_matrix_round_trip() {
        let text = "0 1 2\n255 128 7\n";
        let img = GrayImage::from_text(text).unwrap();
        assert_eq!((img.width(), img.height()), (3, 2));
        assert_eq!(img.get(0, 1), Some(255));
        assert_eq!(img.to_text(), text);
    }

    #[test]
    fn text_rejects_ragged_rows_and_bad_values() {
        assert!(GrayImage::from_text("1 2 3\n4 5\n").is_err());
        assert!(GrayImage::from_text("1 2 256\n").is_err());
        assert!(GrayImage::from_text("1 -2\n").is_err());
        assert!(GrayImage::from_text("\n\n").is_err());
    }

    #[test]
    fn binary_pgm() {
        let mut data = b"P5\n# sample\n3 2\n255\n".to_vec();
        data.extend_from_slice(&[0, 10, 20, 30, 40, 250]);
        let img = GrayImage::from_pgm(&data).unwrap();
        assert_eq!((img.width(), img.height()), (3, 2));
        assert_eq!(img.pixels(), &[0, 10, 20, 30, 40, 250]);
    }

    #[test]
    fn ascii_pgm_with_small_maxval_is_stretched() {
        let img = GrayImage::from_pgm(b"P2 2 1 15\n0 15\n").unwrap();
        assert_eq!(img.pixels(), &[0, 255]);
    }

    #[test]
    fn truncated_pgm_is_an_error() {
        let data = b"P5 4 4 255\n\x00\x01";
        assert!(matches!(
            GrayImage::from_pgm(data),
            Err(ModelError::ParseError { .. })
        ));
    }

    #[test]
    fn oversized_pgm_header_is_an_error() {
        for data in [
            &b"P5 4294967296 4294967296 255\n\x00"[..],
            &b"P5 18446744073709551615 2 255\n\x00"[..],
            &b"P2 100000 100000 255\n0 0 0"[..],
        ] {
            assert!(matches!(
                GrayImage::from_pgm(data),
                Err(ModelError::ParseError { .. })
            ));
        }
    }

    #[test]
    fn resize_constant_image_stays_constant() {
        let img = GrayImage::filled(64, 48, 77).resize(32, 32);
        assert_eq!((img.width(), img.height()), (32, 32));
        assert!(img.pixels().iter().all(|&p| p == 77));
    }

    #[test]
    fn downscale_by_two_averages_pairs() {
        // Half-pixel centres land exactly between source pixels.
        let img = GrayImage::new(4, 1, vec![0, 100, 200, 50]).unwrap();
        let small = img.resize(2, 1);
        assert_eq!(small.pixels(), &[50, 125]);
    }

    #[test]
    fn upscale_keeps_corners() {
        let img = GrayImage::new(2, 2, vec![0, 255, 255, 0]).unwrap();
        let big = img.resize(8, 8);
        assert_eq!(big.get(0, 0), Some(0));
        assert_eq!(big.get(7, 0), Some(255));
        assert_eq!(big.get(0, 7), Some(255));
        assert_eq!(big.get(7, 7), Some(0));
    }

    #[test]
    fn new_validates_dimensions() {
        assert!(GrayImage::new(0, 3, vec![]).is_err());
        assert!(GrayImage::new(2, 2, vec![0; 3]).is_err());
    }
}
