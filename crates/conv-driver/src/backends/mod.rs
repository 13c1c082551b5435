//! Register bus implementations
//!
//! Two backends:
//! - **MMIO**: the accelerator's AXI4-Lite registers mapped from `/dev/mem`
//!   or a UIO node (requires the bitstream to be loaded)
//! - **Software**: a register-accurate simulator of the same block, used for
//!   CI, parity checks and development away from the board

pub mod mmap;
pub mod software;

pub use mmap::MmioRegion;
pub use software::SoftwareAccelerator;
