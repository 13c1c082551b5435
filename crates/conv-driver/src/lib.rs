//! Host driver for the 3×3 int8 convolution accelerator.
//!
//! The accelerator is an AXI4-Lite slave in programmable logic: nine input
//! registers, nine weight registers, a control/status word and a result word.
//! This crate sequences those registers from Linux user space, with a
//! register-accurate software model for machines without the fabric.
//!
//! # Backend hierarchy
//!
//! ```text
//! Hardware:
//!   MmioRegion          : /dev/mem (O_SYNC) or UIO mapping of the register file
//!
//! Development / CI:
//!   SoftwareAccelerator : simulated PL, same offsets, same state machine
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use conv_driver::{Accelerator, DriverConfig};
//! use conv_chip::{Weights, Window};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DriverConfig::from_env()?;
//! let acc = Accelerator::open(&config)?;
//!
//! let result = acc.convolve(&Window::splat(1), &Weights::splat(1))?;
//! assert_eq!(result, 9);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

mod accelerator;
mod backend;
pub mod backends;
pub mod config;
mod driver;
mod error;
mod inference;

pub use accelerator::Accelerator;
pub use backend::{select_backend, BackendSelection, BackendType, RegisterBus};
pub use backends::{MmioRegion, SoftwareAccelerator};
pub use config::{DriverConfig, MmioConfig};
pub use driver::ConvDriver;
pub use error::{ConvError, Result};
pub use inference::{FeatureMapExecutor, InferenceResult};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        Accelerator, BackendSelection, ConvDriver, ConvError, DriverConfig, FeatureMapExecutor,
        RegisterBus, Result, SoftwareAccelerator,
    };
    pub use conv_chip::{Weights, Window};
}
