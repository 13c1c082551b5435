// SPDX-License-Identifier: AGPL-3.0-only

//! Full validation suite for the convolution accelerator.
//!
//! Runs the protocol scenarios and a dataset parity check against the
//! backend selected by `CONVACC_BACKEND` (software by default).
//!
//! | # | Check | Expectation |
//! |---|-------|-------------|
//! | 1 | All-ones window and weights | 9 |
//! | 2 | All-ones window, zero weights | 0 |
//! | 3 | 127 × 127 splat | 14089 (16-bit wraparound of 145161) |
//! | 4 | Write to index 9 | no effect on the next result |
//! | 5 | `done` after start | reads 0 at least once before 1 |
//! | 6 | Repeated result reads | stable until the next start |
//! | 7 | Dataset parity | accelerator == CPU reference on every output |
//!
//! Usage:
//!   cargo run --bin validate_all              # backend from CONVACC_BACKEND
//!   cargo run --bin validate_all -- --verbose # show detail for each check

use anyhow::Result;
use conv_chip::kernel::{Weights, Window};
use conv_driver::{Accelerator, DriverConfig, FeatureMapExecutor, RegisterBus};
use conv_models::reference::conv2d_valid;
use conv_models::{generate_dataset, kernels, load_dataset, Preprocessor};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose");

    let config = DriverConfig::from_env()?;
    let acc = Accelerator::open(&config)?;

    println!("Convolution accelerator validation");
    println!("==================================");
    println!("Backend : {}", acc.backend_type());
    match config.poll_timeout {
        Some(t) => println!("Timeout : {} ms", t.as_millis()),
        None => println!("Timeout : unbounded"),
    }
    println!();

    let mut suite = ValidationSuite::new(verbose);

    suite.run("S1: all-ones window x all-ones weights = 9", || {
        expect_result(&acc, &Window::splat(1), &Weights::splat(1), 9)
    });

    suite.run("S2: all-ones window x zero weights = 0", || {
        expect_result(&acc, &Window::splat(1), &Weights::splat(0), 0)
    });

    suite.run("S3: 127 x 127 splat wraps to 14089", || {
        expect_result(&acc, &Window::splat(127), &Weights::splat(127), 14_089)
    });

    suite.run("S4: out-of-range register index is a no-op", || {
        let mut d = acc.lock();
        d.write_inputs(&Window::splat(2));
        d.write_weights(&Weights::splat(3));
        d.write_input(9, 100);
        d.write_weight(9, 100);
        d.write_input(usize::MAX, -1);
        d.start();
        wait(&d, config.poll_timeout)?;
        let r = d.read_result();
        Ok(ValidationResult {
            passed: r == 54,
            message: format!("result {r} (expected 54)"),
        })
    });

    suite.run("P1: done reads 0 after start before completing", || {
        let mut d = acc.lock();
        d.write_inputs(&Window::splat(1));
        d.write_weights(&Weights::splat(1));
        d.start();
        let low_first = !d.is_done();
        wait(&d, config.poll_timeout)?;
        let backend = d.bus().backend_type();
        Ok(ValidationResult {
            passed: low_first,
            message: format!("first poll after start on {backend}: done={}", !low_first),
        })
    });

    suite.run("P2: result reads are stable", || {
        let first = acc.convolve(&Window::splat(-3), &Weights::splat(4))?;
        let d = acc.lock();
        let stable = (0..16).all(|_| d.is_done() && d.read_result() == first);
        Ok(ValidationResult {
            passed: stable && first == -108,
            message: format!("result {first} over 16 reads"),
        })
    });

    suite.run("D1: dataset parity (box, edge, identity)", || {
        let dir = tempfile::tempdir()?;
        generate_dataset(dir.path(), 3, 42)?;
        let samples = load_dataset(dir.path())?;
        let pre = Preprocessor::default();
        let side = pre.side();

        let mut outputs = 0usize;
        let mut mismatches = 0usize;
        for name in kernels::NAMES {
            let weights = kernels::by_name(name)?;
            let exec = FeatureMapExecutor::new(acc.clone(), weights);
            for s in &samples {
                let map = pre.feature_map(&s.image);
                let expected = conv2d_valid(&map, side, side, &weights);
                let run = exec.run(&map, side, side)?;
                outputs += expected.len();
                mismatches += run
                    .outputs
                    .iter()
                    .zip(&expected)
                    .filter(|(a, b)| a != b)
                    .count();
                mismatches += expected.len().abs_diff(run.outputs.len());
            }
        }
        Ok(ValidationResult {
            passed: mismatches == 0,
            message: format!(
                "{} images x {} kernels, {outputs} outputs, {mismatches} mismatches",
                samples.len(),
                kernels::NAMES.len()
            ),
        })
    });

    suite.finish();
    Ok(())
}

fn expect_result(
    acc: &Accelerator<Box<dyn RegisterBus>>,
    window: &Window,
    weights: &Weights,
    expected: i16,
) -> Result<ValidationResult> {
    let r = acc.convolve(window, weights)?;
    Ok(ValidationResult {
        passed: r == expected,
        message: format!("result {r} (expected {expected})"),
    })
}

fn wait<B: RegisterBus>(
    d: &conv_driver::ConvDriver<B>,
    timeout: Option<std::time::Duration>,
) -> Result<()> {
    match timeout {
        Some(t) => d.wait_done_timeout(t)?,
        None => d.wait_done(),
    }
    Ok(())
}

struct ValidationResult {
    passed: bool,
    message: String,
}

struct ValidationSuite {
    verbose: bool,
    passed: usize,
    failed: usize,
}

impl ValidationSuite {
    fn new(verbose: bool) -> Self {
        Self {
            verbose,
            passed: 0,
            failed: 0,
        }
    }

    fn run<F>(&mut self, name: &str, f: F)
    where
        F: FnOnce() -> Result<ValidationResult>,
    {
        print!("  {name:<50} ");
        match f() {
            Ok(ValidationResult {
                passed: true,
                message,
            }) => {
                println!("PASS");
                if self.verbose {
                    println!("         {message}");
                }
                self.passed += 1;
            }
            Ok(ValidationResult {
                passed: false,
                message,
            }) => {
                println!("FAIL");
                println!("         {message}");
                self.failed += 1;
            }
            Err(e) => {
                println!("ERROR");
                println!("         {e}");
                self.failed += 1;
            }
        }
    }

    fn finish(&self) {
        let total = self.passed + self.failed;
        println!("{}", "-".repeat(62));
        println!(
            "Result: {} passed, {} failed  ({}/{total})",
            self.passed, self.failed, self.passed
        );
        if self.failed == 0 {
            println!("All checks passed");
        } else {
            println!("VALIDATION FAILED: {} check(s) require attention", self.failed);
            std::process::exit(1);
        }
    }
}
