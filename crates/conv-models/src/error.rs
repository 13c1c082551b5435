//! Error types for preprocessing and dataset operations

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for model-side operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors that can occur while loading or preparing images
#[derive(Debug, Error)]
pub enum ModelError {
    /// File not found or cannot be read
    #[error("File not found: {}", path.display())]
    FileNotFound {
        /// Path that was attempted
        path: PathBuf,
    },

    /// File contents could not be parsed
    #[error("Failed to parse image: {reason}")]
    ParseError {
        /// Reason for failure
        reason: String,
    },

    /// Image dimensions or contents are unusable
    #[error("Invalid image: {reason}")]
    InvalidImage {
        /// Reason for failure
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl ModelError {
    /// Create a parse error
    pub fn parse_error(reason: impl Into<String>) -> Self {
        Self::ParseError {
            reason: reason.into(),
        }
    }

    /// Create an invalid image error
    pub fn invalid_image(reason: impl Into<String>) -> Self {
        Self::InvalidImage {
            reason: reason.into(),
        }
    }
}
