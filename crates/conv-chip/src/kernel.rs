//! Arithmetic contract of the 3×3 MAC array.
//!
//! The HLS kernel multiplies nine int8 pairs and accumulates them into an
//! `int16_t`. The accumulator is **not** widened: the worst case
//! (`9 × 127 × 127 = 145_161`) does not fit, and the hardware keeps the low
//! 16 bits. Every software path that claims parity with the accelerator must
//! use [`compute`], never a wider sum.
//!
//! Evaluation order is ascending tap index, starting from zero. Modular
//! addition makes the final value independent of that order; it is fixed
//! anyway so intermediate values are reproducible when tracing.

/// Taps per window (3 × 3).
pub const TAPS: usize = 9;

/// Side of the square window.
pub const SIDE: usize = 3;

/// A 3×3 int8 input patch, row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Window(pub [i8; TAPS]);

/// A 3×3 int8 kernel, row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Weights(pub [i8; TAPS]);

macro_rules! grid_common {
    ($ty:ident) => {
        impl $ty {
            /// Every tap set to `value`.
            #[must_use]
            pub const fn splat(value: i8) -> Self {
                Self([value; TAPS])
            }

            /// Build from three rows, top to bottom.
            #[must_use]
            pub const fn from_rows(rows: [[i8; SIDE]; SIDE]) -> Self {
                let mut taps = [0i8; TAPS];
                let mut r = 0;
                while r < SIDE {
                    let mut c = 0;
                    while c < SIDE {
                        taps[r * SIDE + c] = rows[r][c];
                        c += 1;
                    }
                    r += 1;
                }
                Self(taps)
            }

            /// Row-major taps.
            #[must_use]
            pub const fn as_array(&self) -> &[i8; TAPS] {
                &self.0
            }

            /// Tap at `(row, col)`.
            ///
            /// # Panics
            ///
            /// Panics if `row` or `col` is 3 or more.
            #[must_use]
            pub const fn at(&self, row: usize, col: usize) -> i8 {
                assert!(row < SIDE && col < SIDE, "tap outside 3x3 grid");
                self.0[row * SIDE + col]
            }
        }

        impl From<[i8; TAPS]> for $ty {
            fn from(taps: [i8; TAPS]) -> Self {
                Self(taps)
            }
        }

        impl TryFrom<&[i8]> for $ty {
            type Error = usize;

            /// Fails with the slice length unless it is exactly nine.
            fn try_from(taps: &[i8]) -> Result<Self, Self::Error> {
                <[i8; TAPS]>::try_from(taps).map(Self).map_err(|_| taps.len())
            }
        }
    };
}

grid_common!(Window);
grid_common!(Weights);

impl Window {
    /// Extract the patch whose top-left corner is `(x, y)` from a row-major
    /// `width`-wide map.
    ///
    /// Returns `None` if the patch would leave the map.
    #[must_use]
    pub fn from_patch(map: &[i8], width: usize, x: usize, y: usize) -> Option<Self> {
        if width < SIDE || x.checked_add(SIDE)? > width {
            return None;
        }
        let last = y
            .checked_add(SIDE - 1)?
            .checked_mul(width)?
            .checked_add(x + SIDE)?;
        if last > map.len() {
            return None;
        }
        let mut taps = [0i8; TAPS];
        for (r, row) in taps.chunks_exact_mut(SIDE).enumerate() {
            let start = (y + r) * width + x;
            row.copy_from_slice(&map[start..start + SIDE]);
        }
        Some(Self(taps))
    }
}

impl Weights {
    /// Passes the centre tap through unchanged.
    pub const IDENTITY: Self = Self::from_rows([[0, 0, 0], [0, 1, 0], [0, 0, 0]]);

    /// All ones: 3×3 box sum.
    pub const BOX: Self = Self::splat(1);

    /// `[1, 0, -1]` on every row: vertical edge response.
    pub const VERTICAL_EDGE: Self = Self::from_rows([[1, 0, -1], [1, 0, -1], [1, 0, -1]]);
}

/// Convolve one window with one kernel exactly as the accelerator does.
///
/// Each product is formed in 16 bits (`|-128 × -128| = 16_384` fits) and
/// accumulated with 16-bit two's-complement wraparound.
#[must_use]
pub fn compute(window: &Window, weights: &Weights) -> i16 {
    window
        .0
        .iter()
        .zip(weights.0.iter())
        .fold(0i16, |acc, (&x, &w)| {
            acc.wrapping_add(i16::from(x) * i16::from(w))
        })
}

/// Mathematically exact sum of products, without truncation.
///
/// Diagnostic only; never compare this against hardware output.
#[must_use]
pub fn compute_wide(window: &Window, weights: &Weights) -> i32 {
    window
        .0
        .iter()
        .zip(weights.0.iter())
        .map(|(&x, &w)| i32::from(x) * i32::from(w))
        .sum()
}

/// Whether the 16-bit accumulator wrapped for this pair.
#[must_use]
pub fn overflowed(window: &Window, weights: &Weights) -> bool {
    i32::from(compute(window, weights)) != compute_wide(window, weights)
}
