//! Driver configuration
//!
//! Defaults describe the reference Zynq-7000 build. Each field can be
//! overridden from the environment, and the CLI layers its flags on top.
//!
//! | Variable | Field | Example |
//! |----------|-------|---------|
//! | `CONVACC_BACKEND` | `backend` | `auto`, `mmio`, `software` |
//! | `CONVACC_DEVICE` | `mmio.device` | `/dev/uio0` |
//! | `CONVACC_BASE_ADDR` | `mmio.base_address` | `0x43C00000` |
//! | `CONVACC_TIMEOUT_MS` | `poll_timeout` | `1000`, `0` = unbounded |
//! | `CONVACC_LATENCY_POLLS` | `simulated_latency_polls` | `4` |

use crate::backend::BackendSelection;
use crate::error::{ConvError, Result};
use conv_chip::regs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Default device file exposing physical memory.
pub const DEFAULT_DEVICE: &str = "/dev/mem";
/// Default bytes to map: one page covers the register file.
pub const DEFAULT_SPAN: usize = 0x1000;
/// Default bound on `wait_done`.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(1);
/// Default status polls the simulator reports busy before completing.
pub const DEFAULT_LATENCY_POLLS: u32 = 4;

/// Where the register region lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MmioConfig {
    /// Device file to map (`/dev/mem` or a UIO node)
    pub device: PathBuf,

    /// Offset into `device` of the register file: the physical base address
    /// for `/dev/mem`, zero for UIO
    pub base_address: u64,

    /// Bytes to map; must cover the register file
    pub span: usize,
}

impl Default for MmioConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_DEVICE),
            base_address: regs::TYPICAL_BASE_ADDR,
            span: DEFAULT_SPAN,
        }
    }
}

/// Full driver configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Backend to open
    pub backend: BackendSelection,

    /// Register region for the MMIO backend
    pub mmio: MmioConfig,

    /// Bound on waiting for `done`; `None` spins forever like the bare-metal driver
    pub poll_timeout: Option<Duration>,

    /// Status polls the software accelerator reports busy
    pub simulated_latency_polls: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            backend: BackendSelection::default(),
            mmio: MmioConfig::default(),
            poll_timeout: Some(DEFAULT_POLL_TIMEOUT),
            simulated_latency_polls: DEFAULT_LATENCY_POLLS,
        }
    }
}

impl DriverConfig {
    /// Defaults overridden by `CONVACC_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if a value cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = lookup("CONVACC_BACKEND") {
            config.backend = v.parse().map_err(ConvError::invalid_config)?;
        }
        if let Some(v) = lookup("CONVACC_DEVICE") {
            config.mmio.device = PathBuf::from(v);
        }
        if let Some(v) = lookup("CONVACC_BASE_ADDR") {
            config.mmio.base_address = parse_address(&v)?;
        }
        if let Some(v) = lookup("CONVACC_TIMEOUT_MS") {
            let ms: u64 = v.trim().parse().map_err(|e| {
                ConvError::invalid_config(format!("CONVACC_TIMEOUT_MS={v}: {e}"))
            })?;
            config.poll_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(v) = lookup("CONVACC_LATENCY_POLLS") {
            config.simulated_latency_polls = v.trim().parse().map_err(|e| {
                ConvError::invalid_config(format!("CONVACC_LATENCY_POLLS={v}: {e}"))
            })?;
        }

        debug!("Driver config: {config:?}");
        Ok(config)
    }
}

/// Parse a base address written in hex, with or without a `0x` prefix
///
/// # Errors
///
/// Returns `InvalidConfig` if the text is not a hexadecimal number.
pub fn parse_address(text: &str) -> Result<u64> {
    let t = text.trim();
    let digits = t
        .strip_prefix("0x")
        .or_else(|| t.strip_prefix("0X"))
        .unwrap_or(t)
        .replace('_', "");
    u64::from_str_radix(&digits, 16)
        .map_err(|e| ConvError::invalid_config(format!("bad address '{text}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_target_zynq_gp0() {
        let c = DriverConfig::default();
        assert_eq!(c.mmio.base_address, 0x43C0_0000);
        assert_eq!(c.mmio.device, PathBuf::from("/dev/mem"));
        assert!(c.mmio.span >= regs::REGISTER_SPAN);
        assert_eq!(c.poll_timeout, Some(Duration::from_secs(1)));
        assert_eq!(c.backend, BackendSelection::Software);
    }

    #[test]
    fn environment_overrides() {
        let c = DriverConfig::from_lookup(lookup(&[
            ("CONVACC_BACKEND", "mmio"),
            ("CONVACC_DEVICE", "/dev/uio0"),
            ("CONVACC_BASE_ADDR", "0"),
            ("CONVACC_TIMEOUT_MS", "250"),
            ("CONVACC_LATENCY_POLLS", "1"),
        ]))
        .unwrap();
        assert_eq!(c.backend, BackendSelection::Mmio);
        assert_eq!(c.mmio.device, PathBuf::from("/dev/uio0"));
        assert_eq!(c.mmio.base_address, 0);
        assert_eq!(c.poll_timeout, Some(Duration::from_millis(250)));
        assert_eq!(c.simulated_latency_polls, 1);
    }

    #[test]
    fn zero_timeout_means_unbounded() {
        let c = DriverConfig::from_lookup(lookup(&[("CONVACC_TIMEOUT_MS", "0")])).unwrap();
        assert_eq!(c.poll_timeout, None);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = DriverConfig::from_lookup(lookup(&[("CONVACC_TIMEOUT_MS", "soon")]));
        assert!(matches!(err, Err(ConvError::InvalidConfig { .. })));
        let err = DriverConfig::from_lookup(lookup(&[("CONVACC_BACKEND", "pcie")]));
        assert!(matches!(err, Err(ConvError::InvalidConfig { .. })));
    }

    #[test]
    fn addresses_accept_prefix_and_separators() {
        assert_eq!(parse_address("0x43C00000").unwrap(), 0x43C0_0000);
        assert_eq!(parse_address("43c0_0000").unwrap(), 0x43C0_0000);
        assert!(parse_address("0xZZ").is_err());
    }
}
