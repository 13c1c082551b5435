//! `convacc`: command-line interface for the 3×3 convolution accelerator.
//!
//! ```text
//! USAGE:
//!   convacc regs                              Print the register map
//!   convacc convolve --window <9 csv>         One window through the accelerator
//!   convacc preprocess <image> [--centered]   Image → quantized 3×3 window
//!   convacc validate [--dataset DIR]          Accelerator vs CPU reference
//!   convacc gen-dataset <dir>                 Write seeded sample images
//!   convacc speedup --cpu-ms <f>              Pipeline model vs measured CPU time
//! ```
//!
//! Backend flags override `CONVACC_*` environment variables.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use conv_chip::kernel::{Weights, Window, TAPS};
use conv_chip::pipeline::{self, PipelineModel};
use conv_chip::regs;
use conv_driver::{Accelerator, BackendSelection, DriverConfig, FeatureMapExecutor};
use conv_models::reference::conv2d_valid;
use conv_models::{kernels, GrayImage, Preprocessor, Quantization};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Where `validate` looks when no dataset is given
const DEFAULT_DATASET_DIR: &str = "datasets/sample_images";

#[derive(Parser)]
#[command(name = "convacc", about = "3x3 int8 convolution accelerator CLI", version)]
struct Cli {
    /// Backend: auto, mmio or software (default from CONVACC_BACKEND).
    #[arg(long, global = true)]
    backend: Option<BackendSelection>,

    /// Device file to map for the MMIO backend (e.g. /dev/uio0).
    #[arg(long, global = true)]
    device: Option<PathBuf>,

    /// Register base address, hex (e.g. 0x43C00000).
    #[arg(long, global = true, value_parser = parse_base)]
    base: Option<u64>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print the register map.
    Regs,
    /// Run one 3×3 window through the accelerator.
    Convolve {
        /// Nine comma-separated int8 taps, row-major.
        #[arg(long, value_parser = parse_taps, allow_hyphen_values = true)]
        window: [i8; TAPS],
        /// Nine comma-separated int8 weights (default: all ones).
        #[arg(long, value_parser = parse_taps, allow_hyphen_values = true)]
        weights: Option<[i8; TAPS]>,
    },
    /// Resize and quantize an image, print the top-left window.
    Preprocess {
        /// Text-matrix (.txt) or PGM (.pgm) image.
        image: PathBuf,
        /// Use mean-centred quantization instead of plain scaling.
        #[arg(long)]
        centered: bool,
    },
    /// Compare accelerator output with the CPU reference on every image.
    Validate {
        /// Dataset directory (generated if it does not exist).
        #[arg(long, default_value = DEFAULT_DATASET_DIR)]
        dataset: PathBuf,
        /// Kernel: box, edge or identity.
        #[arg(long, default_value = "box")]
        kernel: String,
    },
    /// Write seeded 32×32 sample images and labels.txt.
    GenDataset {
        /// Output directory.
        dir: PathBuf,
        /// Number of images.
        #[arg(long, default_value_t = 3)]
        count: usize,
        /// Generator seed.
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Theoretical pipeline time vs a measured CPU time.
    Speedup {
        /// Measured CPU time per image, milliseconds.
        #[arg(long)]
        cpu_ms: f64,
        /// Fabric clock, MHz.
        #[arg(long, default_value_t = pipeline::DEFAULT_CLOCK_MHZ)]
        clock_mhz: f64,
        /// Pipeline fill latency, cycles.
        #[arg(long, default_value_t = pipeline::DEFAULT_LATENCY_CYCLES)]
        latency: u64,
        /// Input image side.
        #[arg(long, default_value_t = 32)]
        side: u64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();
    let config = driver_config(&cli)?;

    match cli.command {
        Cmd::Regs => cmd_regs(),
        Cmd::Convolve { window, weights } => {
            cmd_convolve(&config, window, weights.unwrap_or([1; TAPS]))?;
        }
        Cmd::Preprocess { image, centered } => cmd_preprocess(&image, centered)?,
        Cmd::Validate { dataset, kernel } => cmd_validate(&config, &dataset, &kernel)?,
        Cmd::GenDataset { dir, count, seed } => cmd_gen_dataset(&dir, count, seed)?,
        Cmd::Speedup {
            cpu_ms,
            clock_mhz,
            latency,
            side,
        } => cmd_speedup(cpu_ms, clock_mhz, latency, side)?,
    }

    Ok(())
}

fn driver_config(cli: &Cli) -> Result<DriverConfig> {
    let mut config = DriverConfig::from_env()?;
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(device) = &cli.device {
        config.mmio.device.clone_from(device);
    }
    if let Some(base) = cli.base {
        config.mmio.base_address = base;
    }
    Ok(config)
}

fn parse_base(s: &str) -> Result<u64, String> {
    conv_driver::config::parse_address(s).map_err(|e| e.to_string())
}

fn parse_taps(s: &str) -> Result<[i8; TAPS], String> {
    let values = s
        .split(',')
        .map(|t| {
            t.trim()
                .parse::<i8>()
                .map_err(|e| format!("'{}': {e}", t.trim()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    <[i8; TAPS]>::try_from(values.as_slice())
        .map_err(|_| format!("expected {TAPS} values, got {}", values.len()))
}

fn cmd_regs() {
    println!("Register map (base {:#010x} typical)", regs::TYPICAL_BASE_ADDR);
    println!("  {:#04x}  CTRL   bit0 start (W), bit1 done (R)", regs::CONTROL);
    for i in 0..TAPS {
        if let Some(off) = regs::input_offset(i) {
            println!("  {off:#04x}  IN{i}    int8 tap, low byte");
        }
    }
    for i in 0..TAPS {
        if let Some(off) = regs::weight_offset(i) {
            println!("  {off:#04x}  W{i}     int8 weight, low byte");
        }
    }
    println!("  {:#04x}  OUT    int16 result, low half (R)", regs::OUTPUT);
    println!("Span: {:#x} bytes", regs::REGISTER_SPAN);
}

fn cmd_convolve(config: &DriverConfig, window: [i8; TAPS], weights: [i8; TAPS]) -> Result<()> {
    let window = Window(window);
    let weights = Weights(weights);
    let acc = Accelerator::open(config)?;

    let t0 = Instant::now();
    let result = acc.convolve(&window, &weights)?;
    let elapsed = t0.elapsed();

    let reference = conv_chip::compute(&window, &weights);
    println!("Backend   : {}", acc.backend_type());
    println!("Result    : {result}");
    println!("Reference : {reference}");
    println!("Time      : {:.2} µs", elapsed.as_secs_f64() * 1e6);
    if conv_chip::kernel::overflowed(&window, &weights) {
        println!(
            "Note      : 16-bit wraparound (exact sum {})",
            conv_chip::compute_wide(&window, &weights)
        );
    }
    if result != reference {
        bail!("accelerator returned {result}, reference {reference}");
    }
    Ok(())
}

fn cmd_preprocess(image: &Path, centered: bool) -> Result<()> {
    let img = GrayImage::open(image).with_context(|| format!("loading {}", image.display()))?;
    let quantization = if centered {
        Quantization::CENTERED
    } else {
        Quantization::Scale
    };
    let pre = Preprocessor::default().with_quantization(quantization);
    let window = pre.window(&img);

    println!(
        "{} ({}x{}) -> {}x{}, {quantization:?}",
        image.display(),
        img.width(),
        img.height(),
        pre.side(),
        pre.side()
    );
    for row in window.0.chunks(3) {
        println!("  {:>4} {:>4} {:>4}", row[0], row[1], row[2]);
    }
    let csv: Vec<String> = window.0.iter().map(ToString::to_string).collect();
    println!("--window {}", csv.join(","));
    Ok(())
}

fn cmd_validate(config: &DriverConfig, dataset: &Path, kernel: &str) -> Result<()> {
    let weights = kernels::by_name(kernel)?;
    if !dataset.exists() {
        tracing::warn!("{} missing, generating samples", dataset.display());
        conv_models::generate_dataset(dataset, 3, 42)?;
    }
    let samples = conv_models::load_dataset(dataset)?;
    if samples.is_empty() {
        bail!("no images in {}", dataset.display());
    }

    let acc = Accelerator::open(config)?;
    println!("Backend: {}  Kernel: {kernel}", acc.backend_type());
    let exec = FeatureMapExecutor::new(acc, weights);
    let pre = Preprocessor::default();

    let mut failures = 0usize;
    for sample in &samples {
        let map = pre.feature_map(&sample.image);
        let t0 = Instant::now();
        let expected = conv2d_valid(&map, pre.side(), pre.side(), &weights);
        let cpu = t0.elapsed();
        let run = exec.run(&map, pre.side(), pre.side())?;

        let mismatches = run
            .outputs
            .iter()
            .zip(&expected)
            .filter(|(a, b)| a != b)
            .count();
        let status = if mismatches == 0 && run.outputs.len() == expected.len() {
            "PASS"
        } else {
            failures += 1;
            "FAIL"
        };
        println!(
            "  [{status}] {:<16} {} outputs, {mismatches} mismatches  cpu {:>8.1} µs  acc {:>8.1} µs",
            sample
                .path
                .file_name()
                .map_or_else(String::new, |n| n.to_string_lossy().into_owned()),
            run.outputs.len(),
            cpu.as_secs_f64() * 1e6,
            run.elapsed.as_secs_f64() * 1e6
        );
    }

    println!("{}/{} images match", samples.len() - failures, samples.len());
    if failures > 0 {
        bail!("{failures} image(s) differ from the CPU reference");
    }
    Ok(())
}

fn cmd_gen_dataset(dir: &Path, count: usize, seed: u64) -> Result<()> {
    let paths = conv_models::generate_dataset(dir, count, seed)?;
    for p in &paths {
        println!("{}", p.display());
    }
    println!("{} images + labels.txt in {}", paths.len(), dir.display());
    Ok(())
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn cmd_speedup(cpu_ms: f64, clock_mhz: f64, latency: u64, side: u64) -> Result<()> {
    let positive = cpu_ms > 0.0 && clock_mhz > 0.0;
    if !positive {
        bail!("--cpu-ms and --clock-mhz must be positive");
    }
    let outputs = pipeline::valid_output_count(side, 3);
    if outputs == 0 {
        bail!("image side {side} is smaller than the kernel");
    }
    let model = PipelineModel {
        clock_mhz,
        latency_cycles: latency,
        ..PipelineModel::default()
    };
    let cpu = Duration::from_nanos((cpu_ms * 1e6).round() as u64);
    let fpga = model.duration(outputs);
    let speedup = model.speedup_over(cpu, outputs);

    println!("Image            : {side}x{side} -> {outputs} outputs");
    println!("CPU (measured)   : {cpu_ms:.6} ms");
    println!(
        "Pipeline         : {} cycles @ {clock_mhz} MHz (L={latency}, II={})",
        model.total_cycles(outputs),
        model.initiation_interval
    );
    println!("Pipeline time    : {:.3} µs", fpga.as_secs_f64() * 1e6);
    println!("Speedup          : {speedup:.2}x");
    Ok(())
}
