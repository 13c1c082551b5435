//! Register bus abstraction
//!
//! The driver never dereferences addresses itself. It is handed a region
//! object once at startup and reaches the accelerator only through typed
//! 32-bit accesses at fixed offsets. Implementations must make every access
//! volatile and in program order; the driver relies on that to observe `done`.

use crate::backends::mmap::MmioRegion;
use crate::backends::software::SoftwareAccelerator;
use crate::config::DriverConfig;
use crate::error::Result;
use std::fmt::Debug;

/// 32-bit register access to one accelerator instance
pub trait RegisterBus: Debug + Send {
    /// Read the register at `offset` (bytes from the region base)
    fn read32(&self, offset: usize) -> u32;

    /// Write the register at `offset` (bytes from the region base)
    fn write32(&mut self, offset: usize, value: u32);

    /// Backend type for logging
    fn backend_type(&self) -> BackendType;
}

impl<B: RegisterBus + ?Sized> RegisterBus for Box<B> {
    fn read32(&self, offset: usize) -> u32 {
        (**self).read32(offset)
    }

    fn write32(&mut self, offset: usize, value: u32) {
        (**self).write32(offset, value);
    }

    fn backend_type(&self) -> BackendType {
        (**self).backend_type()
    }
}

/// Backend type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// Physical registers mapped from a device file
    Mmio,

    /// Register-accurate CPU simulation, no hardware required
    Software,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mmio => write!(f, "MMIO"),
            Self::Software => write!(f, "Software (simulated PL)"),
        }
    }
}

/// Backend selection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendSelection {
    /// Use the mapped region if it can be opened, otherwise simulate
    Auto,

    /// Force the mapped register region
    Mmio,

    /// Force the software simulator, for CI and parity checks
    #[default]
    Software,
}

impl std::str::FromStr for BackendSelection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "mmio" | "hw" | "hardware" => Ok(Self::Mmio),
            "software" | "sw" | "sim" => Ok(Self::Software),
            other => Err(format!("unknown backend '{other}' (expected auto|mmio|software)")),
        }
    }
}

/// Open the register bus described by `config`
///
/// # Errors
///
/// Returns error if an MMIO backend was forced and the region cannot be mapped.
pub fn select_backend(
    selection: BackendSelection,
    config: &DriverConfig,
) -> Result<Box<dyn RegisterBus>> {
    let software = || -> Box<dyn RegisterBus> {
        Box::new(SoftwareAccelerator::with_latency(
            config.simulated_latency_polls,
        ))
    };

    match selection {
        BackendSelection::Auto => match MmioRegion::open(&config.mmio) {
            Ok(region) => {
                tracing::info!("Using MMIO backend at {:#x}", config.mmio.base_address);
                Ok(Box::new(region))
            }
            Err(e) => {
                tracing::info!("MMIO unavailable ({e}), using software accelerator");
                Ok(software())
            }
        },

        BackendSelection::Mmio => {
            MmioRegion::open(&config.mmio).map(|r| Box::new(r) as Box<dyn RegisterBus>)
        }

        BackendSelection::Software => Ok(software()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_selection() {
        assert_eq!("auto".parse::<BackendSelection>(), Ok(BackendSelection::Auto));
        assert_eq!("MMIO".parse::<BackendSelection>(), Ok(BackendSelection::Mmio));
        assert_eq!("sw".parse::<BackendSelection>(), Ok(BackendSelection::Software));
        assert!("dma".parse::<BackendSelection>().is_err());
    }

    #[test]
    fn software_selection_never_fails() {
        let bus = select_backend(BackendSelection::Software, &DriverConfig::default()).unwrap();
        assert_eq!(bus.backend_type(), BackendType::Software);
    }

    #[test]
    fn forced_mmio_fails_without_device() {
        let mut config = DriverConfig::default();
        config.mmio.device = "/nonexistent/convacc-mem".into();
        let err = select_backend(BackendSelection::Mmio, &config).unwrap_err();
        assert!(matches!(err, crate::ConvError::DeviceNotFound { .. }));
    }

    #[test]
    fn auto_falls_back_to_software() {
        let mut config = DriverConfig::default();
        config.mmio.device = "/nonexistent/convacc-mem".into();
        let bus = select_backend(BackendSelection::Auto, &config).unwrap();
        assert_eq!(bus.backend_type(), BackendType::Software);
    }
}
