//! Synthetic sample dataset
//!
//! A dataset directory holds `img_{i}.txt` text-matrix images and a
//! `labels.txt` listing `<file> <label>` per line. Generation is seeded so
//! two machines produce byte-identical sets for parity runs.

use crate::error::{ModelError, Result};
use crate::image::GrayImage;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Side length of generated images
pub const SAMPLE_SIDE: usize = 32;

/// Name of the label index inside a dataset directory
pub const LABELS_FILE: &str = "labels.txt";

/// One labelled image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// File the image was read from
    pub path: PathBuf,
    /// Decoded pixels
    pub image: GrayImage,
    /// Class label
    pub label: u32,
}

/// xoshiro256++ with a splat-and-warm seeding
struct Xoshiro {
    s: [u64; 4],
}

impl Xoshiro {
    fn new(seed: u64) -> Self {
        let s = [
            seed ^ 0x9e37_79b9_7f4a_7c15,
            seed.wrapping_add(0x6c62_272e_07bb_0142),
            seed.rotate_left(17),
            seed.rotate_right(5),
        ];
        let mut rng = Self { s };
        for _ in 0..20 {
            let _ = rng.next_u64();
        }
        rng
    }

    fn next_u64(&mut self) -> u64 {
        let result = self.s[0]
            .wrapping_add(self.s[3])
            .rotate_left(23)
            .wrapping_add(self.s[0]);
        let t = self.s[1] << 17;
        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];
        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);
        result
    }

    fn next_pixel(&mut self) -> u8 {
        self.next_u64().to_be_bytes()[0]
    }
}

/// Write `count` random 32×32 images plus `labels.txt` into `dir`
///
/// The directory is created if needed. Every label is `0`.
///
/// # Errors
///
/// Returns error if the directory or a file cannot be written.
pub fn generate_dataset(dir: impl AsRef<Path>, count: usize, seed: u64) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let mut rng = Xoshiro::new(seed);
    let mut labels = String::new();
    let mut paths = Vec::with_capacity(count);

    for i in 0..count {
        let pixels = (0..SAMPLE_SIDE * SAMPLE_SIDE)
            .map(|_| rng.next_pixel())
            .collect();
        let image = GrayImage::new(SAMPLE_SIDE, SAMPLE_SIDE, pixels)?;
        let name = format!("img_{i}.txt");
        let path = dir.join(&name);
        fs::write(&path, image.to_text())?;
        debug!("Wrote {}", path.display());

        labels.push_str(&name);
        labels.push_str(" 0\n");
        paths.push(path);
    }

    fs::write(dir.join(LABELS_FILE), labels)?;
    info!(
        "Generated {count} samples in {} (seed {seed})",
        dir.display()
    );
    Ok(paths)
}

/// Read every sample listed in `dir/labels.txt`
///
/// Without a label file, every `*.txt` / `*.pgm` in the directory is loaded
/// in name order with label `0`.
///
/// # Errors
///
/// Returns error if the directory is missing, a label line is malformed, or
/// an image fails to parse.
pub fn load_dataset(dir: impl AsRef<Path>) -> Result<Vec<Sample>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(ModelError::FileNotFound {
            path: dir.to_path_buf(),
        });
    }

    let labels_path = dir.join(LABELS_FILE);
    let entries: Vec<(PathBuf, u32)> = if labels_path.exists() {
        parse_labels(&fs::read_to_string(&labels_path)?)?
            .into_iter()
            .map(|(name, label)| (dir.join(name), label))
            .collect()
    } else {
        warn!(
            "{} has no {LABELS_FILE}; loading all images with label 0",
            dir.display()
        );
        let mut found: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| matches!(e, "txt" | "pgm"))
            })
            .collect();
        found.sort();
        found.into_iter().map(|p| (p, 0)).collect()
    };

    let samples = entries
        .into_iter()
        .map(|(path, label)| {
            GrayImage::open(&path).map(|image| Sample { path, image, label })
        })
        .collect::<Result<Vec<_>>>()?;

    info!("Loaded {} samples from {}", samples.len(), dir.display());
    Ok(samples)
}

fn parse_labels(text: &str) -> Result<Vec<(String, u32)>> {
    text.lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(n, line)| {
            let mut parts = line.split_whitespace();
            let (Some(name), Some(label), None) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(ModelError::parse_error(format!(
                    "{LABELS_FILE} line {}: expected '<file> <label>'",
                    n + 1
                )));
            };
            let label = label.parse().map_err(|_| {
                ModelError::parse_error(format!(
                    "{LABELS_FILE} line {}: bad label '{label}'",
                    n + 1
                ))
            })?;
            Ok((name.to_string(), label))
        })
        .collect()
}
