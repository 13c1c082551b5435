// SPDX-License-Identifier: AGPL-3.0-only

//! Convolution latency benchmark: CPU reference vs accelerator.
//!
//! Two granularities:
//!   - one 3×3 window: `compute` vs write → start → poll → read
//!   - one 32×32 image (900 windows): `conv2d_valid` vs `FeatureMapExecutor`
//!
//! The software backend measures driver overhead only; on the Zynq fabric the
//! same binary times the AXI round trips. The pipeline model line shows what
//! a streaming implementation (L=12, II=1 @ 100 MHz) would achieve for the
//! measured CPU image time.
//!
//! Usage:
//!   cargo run --release --bin bench_latency
//!   cargo run --release --bin bench_latency -- --iterations 5000
//!   CONVACC_BACKEND=mmio cargo run --release --bin bench_latency

use anyhow::Result;
use conv_chip::kernel::{Weights, Window};
use conv_chip::pipeline::{valid_output_count, PipelineModel};
use conv_driver::{Accelerator, DriverConfig, FeatureMapExecutor};
use conv_models::reference::conv2d_valid;
use conv_models::{GrayImage, Preprocessor};
use std::hint::black_box;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

const DEFAULT_ITERATIONS: usize = 1000;
const IMAGE_ITERATIONS_DIVISOR: usize = 20;
const SIDE: usize = 32;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let iterations = parse_arg(&args, "--iterations", DEFAULT_ITERATIONS).max(1);
    let image_iterations = (iterations / IMAGE_ITERATIONS_DIVISOR).max(5);

    let config = DriverConfig::from_env()?;
    let acc = Accelerator::open(&config)?;

    println!("Convolution latency benchmark");
    println!("=============================");
    println!("Backend        : {}", acc.backend_type());
    println!("Iterations     : {iterations} windows, {image_iterations} images");
    println!();

    let window = Window::from_rows([[12, -7, 33], [0, 127, -128], [5, 5, 5]]);
    let weights = Weights::VERTICAL_EDGE;

    // Warmup
    for _ in 0..20 {
        acc.convolve(&window, &weights)?;
    }

    let cpu_window = measure(iterations, || {
        black_box(conv_chip::compute(black_box(&window), black_box(&weights)));
        Ok(())
    })?;
    let acc_window = measure(iterations, || {
        black_box(acc.convolve(&window, &weights)?);
        Ok(())
    })?;

    report("Single window (3×3)", &cpu_window, &acc_window);

    let pixels = (0..SIDE * SIDE)
        .map(|i| u8::try_from((i * 37 + i / SIDE * 11) % 256).unwrap_or(0))
        .collect();
    let image = GrayImage::new(SIDE, SIDE, pixels)?;
    let pre = Preprocessor::default();
    let map = pre.feature_map(&image);
    let exec = FeatureMapExecutor::new(acc.clone(), weights);

    let cpu_image = measure(image_iterations, || {
        black_box(conv2d_valid(black_box(&map), SIDE, SIDE, &weights));
        Ok(())
    })?;
    let acc_image = measure(image_iterations, || {
        black_box(exec.run(&map, SIDE, SIDE)?);
        Ok(())
    })?;

    report("Full image (32×32 → 30×30)", &cpu_image, &acc_image);

    let model = PipelineModel::default();
    let outputs = valid_output_count(SIDE as u64, 3);
    let cpu_mean = Duration::from_secs_f64(cpu_image.mean_us / 1e6);
    println!("Pipeline model");
    println!("--------------");
    println!(
        "  {} cycles @ {} MHz = {:.2} µs per image",
        model.total_cycles(outputs),
        model.clock_mhz,
        model.duration(outputs).as_secs_f64() * 1e6
    );
    println!(
        "  Speedup over measured CPU : {:.2}×",
        model.speedup_over(cpu_mean, outputs)
    );

    Ok(())
}

struct Stats {
    mean_us: f64,
    p50_us: f64,
    p99_us: f64,
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn measure(n: usize, mut f: impl FnMut() -> Result<()>) -> Result<Stats> {
    let mut latencies_us = Vec::with_capacity(n);
    for _ in 0..n {
        let t0 = Instant::now();
        f()?;
        latencies_us.push(t0.elapsed().as_secs_f64() * 1e6);
    }
    latencies_us.sort_by(f64::total_cmp);
    let mean_us = latencies_us.iter().sum::<f64>() / n as f64;
    Ok(Stats {
        mean_us,
        p50_us: latencies_us[n / 2],
        p99_us: latencies_us[((n as f64 * 0.99) as usize).min(n - 1)],
    })
}

fn report(title: &str, cpu: &Stats, acc: &Stats) {
    println!("{title}");
    println!("{}", "-".repeat(title.chars().count()));
    println!("               mean        p50        p99");
    println!(
        "  CPU    : {:>8.2} µs {:>8.2} µs {:>8.2} µs",
        cpu.mean_us, cpu.p50_us, cpu.p99_us
    );
    println!(
        "  Accel  : {:>8.2} µs {:>8.2} µs {:>8.2} µs",
        acc.mean_us, acc.p50_us, acc.p99_us
    );
    if acc.mean_us > 0.0 {
        println!("  Ratio  : {:.2}× (CPU / accel)", cpu.mean_us / acc.mean_us);
    }
    println!();
}

fn parse_arg(args: &[String], flag: &str, default: usize) -> usize {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
