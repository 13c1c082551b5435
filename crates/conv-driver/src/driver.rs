//! Register-level protocol driver
//!
//! Sequences the accelerator exactly as the bare-metal driver does:
//!
//! ```text
//! write IN0..IN8 → write W0..W8 → CTRL.start = 1 → poll CTRL.done → read OUT
//! ```
//!
//! At most one computation may be in flight. `ConvDriver` methods that touch
//! the control register take `&mut self`, so a single owner is enforced by the
//! borrow checker; [`crate::Accelerator`] adds a lock for shared use.

use crate::backend::{BackendType, RegisterBus};
use crate::error::{ConvError, Result};
use conv_chip::kernel::{Weights, Window};
use conv_chip::regs::{self, control};
use std::sync::atomic::{fence, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Polls between clock reads in a bounded wait
const POLLS_PER_CLOCK_CHECK: u32 = 64;

/// Host-side driver for one accelerator instance
#[derive(Debug)]
pub struct ConvDriver<B: RegisterBus> {
    bus: B,
}

impl<B: RegisterBus> ConvDriver<B> {
    /// Drive the accelerator reachable through `bus`
    pub fn new(bus: B) -> Self {
        debug!("ConvDriver on {} backend", bus.backend_type());
        Self { bus }
    }

    /// Backend in use
    pub fn backend_type(&self) -> BackendType {
        self.bus.backend_type()
    }

    /// Borrow the register bus (diagnostics)
    pub const fn bus(&self) -> &B {
        &self.bus
    }

    /// Give the register bus back
    pub fn into_inner(self) -> B {
        self.bus
    }

    /// Write window tap `index`; indices outside `0..9` are ignored
    pub fn write_input(&mut self, index: usize, value: i8) {
        match regs::input_offset(index) {
            Some(offset) => self.bus.write32(offset, regs::encode_tap(value)),
            None => trace!("write_input: index {index} out of range, ignored"),
        }
    }

    /// Write kernel weight `index`; indices outside `0..9` are ignored
    pub fn write_weight(&mut self, index: usize, value: i8) {
        match regs::weight_offset(index) {
            Some(offset) => self.bus.write32(offset, regs::encode_tap(value)),
            None => trace!("write_weight: index {index} out of range, ignored"),
        }
    }

    /// Write all nine taps, index 0 first
    pub fn write_inputs(&mut self, window: &Window) {
        for (i, &v) in window.0.iter().enumerate() {
            self.write_input(i, v);
        }
    }

    /// Write all nine weights, index 0 first
    pub fn write_weights(&mut self, weights: &Weights) {
        for (i, &v) in weights.0.iter().enumerate() {
            self.write_weight(i, v);
        }
    }

    /// Pulse `start`
    ///
    /// The previous result is lost if it has not been read yet.
    pub fn start(&mut self) {
        // Operand stores must reach the device before the start strobe.
        fence(Ordering::Release);
        self.bus.write32(regs::CONTROL, control::START);
    }

    /// Single non-blocking read of the `done` bit
    ///
    /// The driver writes nothing here. The software accelerator counts its
    /// latency in these reads, so on that backend a poll is what advances
    /// RUNNING towards DONE; the fabric runs on its own clock instead.
    pub fn is_done(&self) -> bool {
        self.bus.read32(regs::CONTROL) & control::DONE != 0
    }

    /// Spin until `done` reads 1
    ///
    /// There is no bound: a hung accelerator blocks the caller forever. Use
    /// [`Self::wait_done_timeout`] outside single-purpose firmware.
    pub fn wait_done(&self) {
        while !self.is_done() {
            std::hint::spin_loop();
        }
        fence(Ordering::Acquire);
    }

    /// Spin until `done` reads 1 or `timeout` elapses
    ///
    /// # Errors
    ///
    /// Returns `ConvError::Timeout` if `done` was not observed in time.
    pub fn wait_done_timeout(&self, timeout: Duration) -> Result<()> {
        let begin = Instant::now();
        let mut polls: u32 = 0;
        loop {
            if self.is_done() {
                fence(Ordering::Acquire);
                trace!("done after {polls} polls");
                return Ok(());
            }
            polls = polls.wrapping_add(1);
            if polls % POLLS_PER_CLOCK_CHECK == 0 && begin.elapsed() >= timeout {
                // One last look so a completion racing the deadline is not lost.
                if self.is_done() {
                    fence(Ordering::Acquire);
                    return Ok(());
                }
                return Err(ConvError::timeout(timeout));
            }
            std::hint::spin_loop();
        }
    }

    /// Single read of the result register
    ///
    /// Only meaningful after `done` has been observed for the latest `start`.
    pub fn read_result(&self) -> i16 {
        regs::decode_result(self.bus.read32(regs::OUTPUT))
    }

    /// Full protocol: inputs, weights, start, wait, read
    ///
    /// Blocks without bound, like the firmware driver.
    pub fn convolve(&mut self, window: &Window, weights: &Weights) -> i16 {
        self.write_inputs(window);
        self.write_weights(weights);
        self.start();
        self.wait_done();
        let result = self.read_result();
        debug!("convolve -> {result}");
        result
    }

    /// Full protocol with a bounded wait
    ///
    /// # Errors
    ///
    /// Returns `ConvError::Timeout` if the accelerator does not finish in time.
    pub fn convolve_with_timeout(
        &mut self,
        window: &Window,
        weights: &Weights,
        timeout: Duration,
    ) -> Result<i16> {
        self.write_inputs(window);
        self.write_weights(weights);
        self.start();
        self.wait_done_timeout(timeout)?;
        let result = self.read_result();
        debug!("convolve -> {result}");
        Ok(result)
    }

    /// Run a window against the weights already loaded
    ///
    /// Weights outlive individual windows; streaming a map through a fixed
    /// kernel only rewrites the nine input registers per output.
    pub(crate) fn convolve_loaded(
        &mut self,
        window: &Window,
        timeout: Option<Duration>,
    ) -> Result<i16> {
        self.write_inputs(window);
        self.start();
        match timeout {
            Some(t) => self.wait_done_timeout(t)?,
            None => self.wait_done(),
        }
        Ok(self.read_result())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::software::{AccelState, SoftwareAccelerator};

    fn driver(latency: u32) -> ConvDriver<SoftwareAccelerator> {
        ConvDriver::new(SoftwareAccelerator::with_latency(latency))
    }

    #[test]
    fn scenario_all_ones() {
        let mut d = driver(4);
        assert_eq!(d.convolve(&Window::splat(1), &Weights::splat(1)), 9);
    }

    #[test]
    fn scenario_zero_weights() {
        let mut d = driver(4);
        assert_eq!(d.convolve(&Window::splat(1), &Weights::splat(0)), 0);
    }

    #[test]
    fn scenario_wraparound() {
        let mut d = driver(4);
        let r = d.convolve(&Window::splat(127), &Weights::splat(127));
        assert_eq!(r, 14_089);
    }

    #[test]
    fn step_wise_protocol_matches_convolve() {
        let mut d = driver(2);
        let w = Window([5, -3, 2, 0, 9, -9, 1, 1, 1]);
        let k = Weights([1, 1, 1, -1, -1, -1, 2, 2, 2]);
        d.write_inputs(&w);
        d.write_weights(&k);
        d.start();
        assert!(!d.is_done(), "done must read 0 right after start");
        d.wait_done();
        let stepwise = d.read_result();
        assert_eq!(stepwise, d.convolve(&w, &k));
        assert_eq!(stepwise, conv_chip::compute(&w, &k));
    }

    #[test]
    fn out_of_range_writes_are_no_ops() {
        let mut d = driver(1);
        d.write_inputs(&Window::splat(3));
        d.write_weights(&Weights::splat(2));
        d.write_input(9, 100);
        d.write_weight(9, 100);
        d.write_input(usize::MAX, -1);
        assert_eq!(d.bus().latched_window(), Window::splat(3));
        assert_eq!(d.bus().latched_weights(), Weights::splat(2));
        d.start();
        d.wait_done();
        assert_eq!(d.read_result(), 54);
    }

    #[test]
    fn single_writes_land_in_order() {
        let mut d = driver(1);
        for i in 0..9 {
            d.write_input(i, i as i8);
            d.write_weight(i, 1);
        }
        assert_eq!(d.bus().latched_window(), Window([0, 1, 2, 3, 4, 5, 6, 7, 8]));
        d.start();
        d.wait_done();
        assert_eq!(d.read_result(), 36);
    }

    #[test]
    fn reads_after_done_are_stable() {
        let mut d = driver(3);
        d.convolve(&Window::splat(2), &Weights::splat(3));
        for _ in 0..10 {
            assert!(d.is_done());
            assert_eq!(d.read_result(), 54);
        }
        assert_eq!(d.bus().state(), AccelState::Done);
        assert_eq!(d.bus().start_count(), 1);
    }

    #[test]
    fn is_done_only_reads_control() {
        let mut d = driver(2);
        d.write_inputs(&Window::splat(1));
        d.write_weights(&Weights::splat(1));
        d.start();
        assert_eq!(d.bus().state(), AccelState::Running);
        assert!(!d.is_done());
        assert!(!d.is_done());
        // Latency elapsed through polling alone; operands and starts untouched.
        assert!(d.is_done());
        assert_eq!(d.bus().latched_window(), Window::splat(1));
        assert_eq!(d.bus().start_count(), 1);
        assert_eq!(d.read_result(), 9);
    }

    #[test]
    fn bounded_wait_reports_hang() {
        let mut d = ConvDriver::new(SoftwareAccelerator::hung());
        let err = d
            .convolve_with_timeout(&Window::splat(1), &Weights::splat(1), Duration::from_millis(5))
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(matches!(err, ConvError::Timeout { duration_ms: 5 }));
    }

    #[test]
    fn bounded_wait_succeeds_on_healthy_device() {
        let mut d = driver(16);
        let r = d
            .convolve_with_timeout(&Window::splat(-2), &Weights::splat(5), Duration::from_secs(1))
            .unwrap();
        assert_eq!(r, -90);
    }

    #[test]
    fn loaded_weights_are_reused() {
        let mut d = driver(1);
        d.write_weights(&Weights::splat(2));
        assert_eq!(d.convolve_loaded(&Window::splat(1), None).unwrap(), 18);
        assert_eq!(d.convolve_loaded(&Window::splat(3), None).unwrap(), 54);
        assert_eq!(d.bus().start_count(), 2);
    }
}
