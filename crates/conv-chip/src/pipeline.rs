//! Timing model of the pipelined MAC array.
//!
//! The HLS kernel is fully unrolled and pipelined. Streaming `n` windows
//! through it costs `latency + (n - 1) × II` cycles. These figures are synthesis
//! targets, not measurements; `bench_latency` prints them next to measured
//! CPU numbers.
//!
//! ```text
//! clock          100 MHz    (conservative for Artix-7 fabric)
//! latency        12 cycles  (pipeline fill)
//! II             1          (one output per cycle)
//! 32×32 image    30×30 = 900 valid outputs → 911 cycles → 9.11 µs
//! ```

use std::time::Duration;

/// Default fabric clock.
pub const DEFAULT_CLOCK_MHZ: f64 = 100.0;
/// Default pipeline fill latency.
pub const DEFAULT_LATENCY_CYCLES: u64 = 12;
/// Default initiation interval.
pub const DEFAULT_INITIATION_INTERVAL: u64 = 1;

/// Pipeline parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineModel {
    /// Fabric clock in MHz.
    pub clock_mhz: f64,
    /// Cycles from first input to first output.
    pub latency_cycles: u64,
    /// Cycles between successive outputs once the pipeline is full.
    pub initiation_interval: u64,
}

impl Default for PipelineModel {
    fn default() -> Self {
        Self {
            clock_mhz: DEFAULT_CLOCK_MHZ,
            latency_cycles: DEFAULT_LATENCY_CYCLES,
            initiation_interval: DEFAULT_INITIATION_INTERVAL,
        }
    }
}

impl PipelineModel {
    /// Cycles to produce `outputs` results back to back.
    #[must_use]
    pub const fn total_cycles(&self, outputs: u64) -> u64 {
        if outputs == 0 {
            return 0;
        }
        self.latency_cycles
            .saturating_add((outputs - 1).saturating_mul(self.initiation_interval))
    }

    /// Wall time to produce `outputs` results.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn duration(&self, outputs: u64) -> Duration {
        let period_ns = 1_000.0 / self.clock_mhz;
        let ns = self.total_cycles(outputs) as f64 * period_ns;
        Duration::from_nanos(ns.round() as u64)
    }

    /// Results per second once the pipeline is saturated.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn steady_state_throughput(&self) -> f64 {
        self.clock_mhz * 1e6 / self.initiation_interval.max(1) as f64
    }

    /// How many times faster the modelled fabric is than a measured CPU run
    /// producing the same number of outputs.
    #[must_use]
    pub fn speedup_over(&self, cpu: Duration, outputs: u64) -> f64 {
        let fabric = self.duration(outputs).as_secs_f64();
        if fabric == 0.0 {
            return 0.0;
        }
        cpu.as_secs_f64() / fabric
    }
}

/// Valid-mode output count for a square image: `(n - k + 1)²`.
#[must_use]
pub const fn valid_output_count(image_side: u64, kernel_side: u64) -> u64 {
    if image_side < kernel_side {
        return 0;
    }
    let side = image_side - kernel_side + 1;
    side.saturating_mul(side)
}
