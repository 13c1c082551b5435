//! Error types for accelerator driver operations

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for driver operations
pub type Result<T> = std::result::Result<T, ConvError>;

/// Errors that can occur while talking to the accelerator
///
/// The register protocol itself has no error channel. Everything here comes
/// from the host side: mapping the region, bounded waits, configuration.
#[derive(Debug, Error)]
pub enum ConvError {
    /// `done` was not observed within the allotted time
    #[error("Accelerator did not assert done within {duration_ms}ms")]
    Timeout {
        /// Timeout duration in milliseconds
        duration_ms: u64,
    },

    /// Device file for the register region does not exist
    #[error("Device not found: {}", path.display())]
    DeviceNotFound {
        /// Path that was checked
        path: PathBuf,
    },

    /// Mapping the register region failed
    #[error("Failed to map register region: {reason}")]
    MapFailed {
        /// Reason for failure
        reason: String,
    },

    /// Mapped region cannot hold the register file
    #[error("Register region too small: {size:#x} bytes mapped, {required:#x} required")]
    RegionTooSmall {
        /// Bytes mapped
        size: usize,
        /// Bytes the register file spans
        required: usize,
    },

    /// I/O error while opening the device
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// Caller-supplied data has the wrong shape
    #[error("Invalid input: {reason}")]
    InvalidInput {
        /// Reason for rejection
        reason: String,
    },

    /// Configuration value could not be used
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Reason for rejection
        reason: String,
    },
}

impl ConvError {
    /// Create a timeout error
    pub fn timeout(duration: std::time::Duration) -> Self {
        Self::Timeout {
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Create a device not found error
    pub fn device_not_found(path: impl Into<PathBuf>) -> Self {
        Self::DeviceNotFound { path: path.into() }
    }

    /// Create a map failed error
    pub fn map_failed(reason: impl Into<String>) -> Self {
        Self::MapFailed {
            reason: reason.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Whether this is a hang fault surfaced by a bounded wait
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
