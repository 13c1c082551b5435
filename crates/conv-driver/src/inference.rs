// SPDX-License-Identifier: AGPL-3.0-only

//! Whole feature-map convolution through the accelerator
//!
//! The block computes one output per `start`. A valid-mode 3×3 convolution
//! of a `w × h` map yields `(w - 2) × (h - 2)` outputs; the executor loads the
//! kernel once and streams every window through the input registers in
//! row-major output order.

use crate::accelerator::Accelerator;
use crate::backend::RegisterBus;
use crate::error::{ConvError, Result};
use conv_chip::kernel::{Weights, Window, SIDE};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Output of one feature-map run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceResult {
    /// Row-major results, `width × height`
    pub outputs: Vec<i16>,
    /// Output width
    pub width: usize,
    /// Output height
    pub height: usize,
    /// Windows pushed through the accelerator
    pub windows: usize,
    /// Wall time spent, register traffic included
    pub elapsed: Duration,
}

impl InferenceResult {
    /// Result at output coordinate `(x, y)`
    pub fn get(&self, x: usize, y: usize) -> Option<i16> {
        (x < self.width && y < self.height).then(|| self.outputs[y * self.width + x])
    }

    /// Mean time per window
    pub fn per_window(&self) -> Duration {
        u32::try_from(self.windows)
            .ok()
            .filter(|&n| n > 0)
            .map_or(Duration::ZERO, |n| self.elapsed / n)
    }
}

/// Runs valid-mode 3×3 convolution of a quantized map on the accelerator
#[derive(Debug)]
pub struct FeatureMapExecutor<B: RegisterBus> {
    accelerator: Accelerator<B>,
    weights: Weights,
}

impl<B: RegisterBus> FeatureMapExecutor<B> {
    /// Executor applying `weights` on `accelerator`
    pub fn new(accelerator: Accelerator<B>, weights: Weights) -> Self {
        Self {
            accelerator,
            weights,
        }
    }

    /// Kernel applied to every window
    pub const fn weights(&self) -> &Weights {
        &self.weights
    }

    /// Convolve a row-major `width × height` int8 map
    ///
    /// The accelerator lock is held for the whole map so the loaded weights
    /// cannot be replaced by another caller halfway through.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The map is smaller than 3×3 or its length is not `width × height`
    /// - A window times out (when a poll timeout is configured)
    pub fn run(&self, map: &[i8], width: usize, height: usize) -> Result<InferenceResult> {
        if width < SIDE || height < SIDE {
            return Err(ConvError::invalid_input(format!(
                "map {width}x{height} is smaller than the 3x3 kernel"
            )));
        }
        if map.len() != width * height {
            return Err(ConvError::invalid_input(format!(
                "map has {} values, expected {width}x{height}={}",
                map.len(),
                width * height
            )));
        }

        let out_w = width - SIDE + 1;
        let out_h = height - SIDE + 1;
        let timeout = self.accelerator.poll_timeout();
        debug!("Feature map {width}x{height} -> {out_w}x{out_h}");

        let begin = Instant::now();
        let mut outputs = Vec::with_capacity(out_w * out_h);
        {
            let mut driver = self.accelerator.lock();
            driver.write_weights(&self.weights);
            for y in 0..out_h {
                for x in 0..out_w {
                    let window = Window::from_patch(map, width, x, y).ok_or_else(|| {
                        ConvError::invalid_input(format!("window ({x},{y}) leaves the map"))
                    })?;
                    outputs.push(driver.convolve_loaded(&window, timeout)?);
                }
            }
        }
        let elapsed = begin.elapsed();

        info!(
            "Convolved {width}x{height} map: {} windows in {:.1} µs",
            outputs.len(),
            elapsed.as_secs_f64() * 1e6
        );

        Ok(InferenceResult {
            windows: outputs.len(),
            outputs,
            width: out_w,
            height: out_h,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::software::SoftwareAccelerator;

    fn executor(weights: Weights) -> FeatureMapExecutor<SoftwareAccelerator> {
        FeatureMapExecutor::new(
            Accelerator::new(SoftwareAccelerator::with_latency(1), None),
            weights,
        )
    }

    #[test]
    fn box_filter_over_constant_map() {
        let exec = executor(Weights::BOX);
        let r = exec.run(&[2i8; 25], 5, 5).unwrap();
        assert_eq!((r.width, r.height, r.windows), (3, 3, 9));
        assert!(r.outputs.iter().all(|&v| v == 18));
    }

    #[test]
    fn matches_per_window_kernel() {
        let map: Vec<i8> = (0..36).map(|i| (i * 7 % 23) as i8 - 11).collect();
        let exec = executor(Weights::VERTICAL_EDGE);
        let r = exec.run(&map, 6, 6).unwrap();
        for y in 0..4 {
            for x in 0..4 {
                let w = Window::from_patch(&map, 6, x, y).unwrap();
                assert_eq!(r.get(x, y), Some(conv_chip::compute(&w, &Weights::VERTICAL_EDGE)));
            }
        }
        assert_eq!(r.get(4, 0), None);
    }

    #[test]
    fn rejects_bad_shapes() {
        let exec = executor(Weights::BOX);
        assert!(matches!(
            exec.run(&[0; 4], 2, 2),
            Err(ConvError::InvalidInput { .. })
        ));
        assert!(matches!(
            exec.run(&[0; 10], 3, 3),
            Err(ConvError::InvalidInput { .. })
        ));
    }

    #[test]
    fn hang_aborts_the_run() {
        let exec = FeatureMapExecutor::new(
            Accelerator::new(SoftwareAccelerator::hung(), Some(Duration::from_millis(1))),
            Weights::BOX,
        );
        assert!(exec.run(&[1; 9], 3, 3).unwrap_err().is_timeout());
    }
}
