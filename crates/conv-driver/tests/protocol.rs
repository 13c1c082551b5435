//! Register protocol properties, exercised against the software accelerator
//!
//! Every test here drives the public API only, the way an application would.

use conv_chip::{compute, compute_wide, Weights, Window};
use conv_driver::{Accelerator, ConvDriver, SoftwareAccelerator};
use std::time::Duration;

/// Small deterministic generator for operand sweeps
struct Lcg(u64);

impl Lcg {
    fn next_i8(&mut self) -> i8 {
        self.0 = self.0.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 56) as u8 as i8
    }

    fn taps(&mut self) -> [i8; 9] {
        std::array::from_fn(|_| self.next_i8())
    }
}

fn driver() -> ConvDriver<SoftwareAccelerator> {
    ConvDriver::new(SoftwareAccelerator::with_latency(3))
}

#[test]
fn accelerator_matches_wrapping_reference_on_random_operands() {
    let mut rng = Lcg(0x5eed);
    let mut d = driver();
    let mut wrapped = 0;
    for _ in 0..2_000 {
        let w = Window(rng.taps());
        let k = Weights(rng.taps());
        let hw = d.convolve(&w, &k);
        assert_eq!(hw, compute(&w, &k), "window={w:?} weights={k:?}");
        #[allow(clippy::cast_possible_truncation)]
        let truncated = compute_wide(&w, &k) as i16;
        assert_eq!(hw, truncated);
        if i32::from(hw) != compute_wide(&w, &k) {
            wrapped += 1;
        }
    }
    assert!(wrapped > 0, "sweep should include overflowing operands");
}

#[test]
fn scenario_1_all_ones() {
    assert_eq!(driver().convolve(&Window::splat(1), &Weights::splat(1)), 9);
}

#[test]
fn scenario_2_zero_weights() {
    assert_eq!(driver().convolve(&Window::splat(1), &Weights::splat(0)), 0);
}

#[test]
fn scenario_3_overflow_wraps() {
    let r = driver().convolve(&Window::splat(127), &Weights::splat(127));
    assert_eq!(r, (145_161 % 65_536) as i16);
    assert_eq!(r, 14_089);
    assert_ne!(r, i16::MAX);
}

#[test]
fn scenario_4_out_of_range_index_changes_nothing() {
    let mut d = driver();
    d.write_inputs(&Window::splat(1));
    d.write_weights(&Weights::splat(1));
    for bad in [9, 10, 255, usize::MAX] {
        d.write_input(bad, 127);
        d.write_weight(bad, -128);
    }
    assert_eq!(d.bus().latched_window(), Window::splat(1));
    assert_eq!(d.bus().latched_weights(), Weights::splat(1));
    d.start();
    d.wait_done();
    assert_eq!(d.read_result(), 9);
}

#[test]
fn done_is_low_at_least_once_after_start() {
    for latency in [1, 2, 5, 50] {
        let mut d = ConvDriver::new(SoftwareAccelerator::with_latency(latency));
        d.write_inputs(&Window::splat(2));
        d.write_weights(&Weights::splat(2));
        d.start();
        let mut saw_low = false;
        while !d.is_done() {
            saw_low = true;
        }
        assert!(saw_low, "latency {latency}: done was high immediately");
        assert_eq!(d.read_result(), 36);
    }
}

#[test]
fn reads_are_idempotent_until_next_start() {
    let mut d = driver();
    let first = d.convolve(&Window::splat(-3), &Weights::splat(7));
    for _ in 0..100 {
        assert!(d.is_done());
        assert_eq!(d.read_result(), first);
    }
    assert_eq!(d.bus().start_count(), 1);

    // Next start clears done and eventually publishes the new result.
    d.write_inputs(&Window::splat(1));
    d.start();
    assert!(!d.is_done());
    d.wait_done();
    assert_eq!(d.read_result(), 63);
}

#[test]
fn weights_persist_across_windows() {
    let mut d = driver();
    d.write_weights(&Weights::VERTICAL_EDGE);
    let mut results = Vec::new();
    for v in [1i8, 2, 3] {
        let w = Window::from_rows([[v, 0, 0], [v, 0, 0], [v, 0, 0]]);
        d.write_inputs(&w);
        d.start();
        d.wait_done();
        results.push(d.read_result());
    }
    assert_eq!(results, vec![3, 6, 9]);
}

#[test]
fn shared_handle_serialises_threads() {
    let acc = Accelerator::new(SoftwareAccelerator::with_latency(4), Some(Duration::from_secs(1)));
    let workers: Vec<_> = (1..=4i8)
        .map(|v| {
            let acc = acc.clone();
            std::thread::spawn(move || {
                (0..500)
                    .map(|_| acc.convolve(&Window::splat(v), &Weights::splat(v)).unwrap())
                    .all(|r| r == i16::from(v) * i16::from(v) * 9)
            })
        })
        .collect();
    for w in workers {
        assert!(w.join().unwrap());
    }
}

#[test]
fn hung_accelerator_times_out_instead_of_blocking() {
    let acc = Accelerator::new(SoftwareAccelerator::hung(), Some(Duration::from_millis(10)));
    let err = acc.convolve(&Window::splat(1), &Weights::splat(1)).unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(err.to_string(), "Accelerator did not assert done within 10ms");
}
