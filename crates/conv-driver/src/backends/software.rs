// SPDX-License-Identifier: AGPL-3.0-only

//! Software (simulated PL) backend
//!
//! Implements [`RegisterBus`] with a register-accurate model of the
//! accelerator block. It answers the same offsets with the same encodings as
//! the AXI4-Lite slave, so the driver cannot tell it apart from the fabric.
//! This enables:
//!
//! 1. **CI without a board**: every protocol test runs against this model.
//! 2. **Parity checks**: `validate_all` runs the same windows through the
//!    simulator and the real block and compares bit for bit.
//! 3. **Fault injection**: a hung accelerator (done never rises) can be
//!    modelled to exercise bounded waits.
//!
//! ## State machine
//!
//! ```text
//!            start                 latency elapsed
//!   IDLE ───────────▶ RUNNING ─────────────────────▶ DONE
//!                        ▲                             │
//!                        └────────────  start  ────────┘
//! ```
//!
//! Pipeline latency is counted in status-register polls: after `start`, the
//! first `latency_polls` reads of `CTRL` return `done = 0`. Operands are
//! latched on `start`, so writes while RUNNING do not affect the in-flight
//! result (on the fabric that is a race; here it is simply ignored).

use crate::backend::{BackendType, RegisterBus};
use conv_chip::kernel::{compute, Weights, Window, TAPS};
use conv_chip::regs::{self, control};
use std::cell::Cell;
use tracing::{debug, trace};

/// Accelerator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccelState {
    /// Power-on: done = 0, output undefined
    Idle,
    /// Computing: done = 0
    Running,
    /// Result valid: done = 1
    Done,
}

/// Software (simulated PL) accelerator.
#[derive(Debug)]
pub struct SoftwareAccelerator {
    /// Operand registers as last written by the host (raw words)
    inputs: [u32; TAPS],
    weights: [u32; TAPS],

    /// Raw OUTPUT word; holds the last completed result
    output: u32,

    state: Cell<AccelState>,
    /// Status polls left before the in-flight result lands
    remaining: Cell<u32>,
    /// Result computed from the operands latched at `start`
    in_flight: Cell<i16>,

    latency_polls: u32,
    /// Never complete (hang fault)
    hung: bool,
    /// Computations started since power-on
    starts: u64,
}

impl Default for SoftwareAccelerator {
    fn default() -> Self {
        Self::with_latency(crate::config::DEFAULT_LATENCY_POLLS)
    }
}

impl SoftwareAccelerator {
    /// Accelerator that stays busy for `latency_polls` status reads after each
    /// start (clamped to at least one).
    pub fn with_latency(latency_polls: u32) -> Self {
        Self {
            inputs: [0; TAPS],
            weights: [0; TAPS],
            output: 0,
            state: Cell::new(AccelState::Idle),
            remaining: Cell::new(0),
            in_flight: Cell::new(0),
            latency_polls: latency_polls.max(1),
            hung: false,
            starts: 0,
        }
    }

    /// Accelerator whose `done` bit never rises.
    pub fn hung() -> Self {
        Self {
            hung: true,
            ..Self::with_latency(1)
        }
    }

    /// Current state machine state.
    pub fn state(&self) -> AccelState {
        self.state.get()
    }

    /// Number of `start` pulses seen.
    pub fn start_count(&self) -> u64 {
        self.starts
    }

    /// Window currently held in the input registers.
    pub fn latched_window(&self) -> Window {
        Window(self.inputs.map(regs::decode_tap))
    }

    /// Kernel currently held in the weight registers.
    pub fn latched_weights(&self) -> Weights {
        Weights(self.weights.map(regs::decode_tap))
    }

    fn start(&mut self) {
        let window = self.latched_window();
        let weights = self.latched_weights();
        let result = compute(&window, &weights);
        self.starts += 1;
        self.in_flight.set(result);
        self.remaining.set(self.latency_polls);
        self.state.set(AccelState::Running);
        debug!(
            "SoftwareAccelerator: start #{} window={:?} weights={:?} -> {result}",
            self.starts, window.0, weights.0
        );
    }

    /// One status poll: the simulated clock advances only while RUNNING.
    fn poll_status(&self) -> u32 {
        match self.state.get() {
            AccelState::Idle => 0,
            AccelState::Done => control::DONE,
            AccelState::Running => {
                if self.hung {
                    return 0;
                }
                let left = self.remaining.get().saturating_sub(1);
                self.remaining.set(left);
                if left == 0 {
                    // Completion lands after this read returned busy, so the
                    // first poll after start always sees done = 0.
                    self.state.set(AccelState::Done);
                    trace!("SoftwareAccelerator: done");
                }
                0
            }
        }
    }

    fn output_word(&self) -> u32 {
        // OUTPUT updates when the result lands, which may be between two
        // status polls; a read after completion must see it.
        if self.state.get() == AccelState::Done {
            regs::encode_result(self.in_flight.get())
        } else {
            self.output
        }
    }
}

impl RegisterBus for SoftwareAccelerator {
    fn read32(&self, offset: usize) -> u32 {
        let value = match offset {
            regs::CONTROL => self.poll_status(),
            regs::OUTPUT => self.output_word(),
            o if (regs::INPUT_BASE..regs::WEIGHT_BASE).contains(&o) => {
                self.inputs[(o - regs::INPUT_BASE) / regs::REG_STRIDE]
            }
            o if (regs::WEIGHT_BASE..regs::OUTPUT).contains(&o) => {
                self.weights[(o - regs::WEIGHT_BASE) / regs::REG_STRIDE]
            }
            _ => 0,
        };
        trace!("SW read u32 @ {offset:#x} = {value:#x}");
        value
    }

    fn write32(&mut self, offset: usize, value: u32) {
        trace!("SW write u32 @ {offset:#x} = {value:#x}");
        match offset {
            regs::CONTROL => {
                if value & control::START != 0 {
                    // A result that completed but was never read still lands in OUTPUT.
                    self.output = self.output_word();
                    self.start();
                }
            }
            o if (regs::INPUT_BASE..regs::WEIGHT_BASE).contains(&o) => {
                // Only the low byte is implemented.
                self.inputs[(o - regs::INPUT_BASE) / regs::REG_STRIDE] = value & 0xFF;
            }
            o if (regs::WEIGHT_BASE..regs::OUTPUT).contains(&o) => {
                self.weights[(o - regs::WEIGHT_BASE) / regs::REG_STRIDE] = value & 0xFF;
            }
            // OUTPUT is read-only; unmapped offsets are ignored.
            _ => {}
        }
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Software
    }
}
