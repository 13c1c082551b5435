#![deny(unsafe_code)]

//! Host-side data for the 3×3 convolution accelerator
//!
//! Everything the driver does not: turning images into int8 operands, a CPU
//! reference convolution with the accelerator's exact arithmetic, and a small
//! seeded sample dataset for parity runs.
//!
//! # Pipeline
//!
//! ```text
//! GrayImage ──resize 32×32──▶ quantize (u8 → i8) ──▶ Window / feature map
//!                                                    │
//!                         accelerator ◀──────────────┤
//!                         reference::conv2d_valid ◀──┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use conv_models::{GrayImage, Preprocessor};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let image = GrayImage::open("sample.pgm")?;
//! let window = Preprocessor::default().window(&image);
//! println!("taps: {:?}", window.0);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod dataset;
mod error;
mod image;
pub mod kernels;
mod quantize;
pub mod reference;

pub use dataset::{generate_dataset, load_dataset, Sample};
pub use error::{ModelError, Result};
pub use image::GrayImage;
pub use quantize::{Preprocessor, Quantization, DEFAULT_SIDE};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{GrayImage, ModelError, Preprocessor, Quantization, Result, Sample};
}
