//! Silicon model for the 3×3 int8 convolution accelerator.
//!
//! This crate has **no dependencies** and **no hardware access**; it is a
//! pure model of the programmable-logic block: register offsets, control bits,
//! the arithmetic contract of the MAC array, and the pipeline timing model.
//!
//! Everything the host driver and the CPU reference path must agree on lives
//! here, so both sides compute bit-identical results.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`regs`] | AXI4-Lite register map, control/status bits, tap encoding |
//! | [`kernel`] | `Window`, `Weights`, 16-bit wrapping `compute` |
//! | [`pipeline`] | HLS pipeline latency / initiation-interval model |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod kernel;
pub mod pipeline;
pub mod regs;

pub use kernel::{compute, compute_wide, Weights, Window, TAPS};
