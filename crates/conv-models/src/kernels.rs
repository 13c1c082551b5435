//! Named kernels for the command-line tools

use crate::error::{ModelError, Result};
use conv_chip::kernel::Weights;

/// Names accepted by [`by_name`]
pub const NAMES: [&str; 3] = ["identity", "box", "edge"];

/// Look a kernel up by name
///
/// `edge` and `vertical_edge` both select the `[1, 0, -1]` column detector.
///
/// # Errors
///
/// Returns `ParseError` for unknown names.
pub fn by_name(name: &str) -> Result<Weights> {
    match name.to_ascii_lowercase().as_str() {
        "identity" | "id" => Ok(Weights::IDENTITY),
        "box" | "ones" => Ok(Weights::BOX),
        "edge" | "vertical_edge" => Ok(Weights::VERTICAL_EDGE),
        other => Err(ModelError::parse_error(format!(
            "unknown kernel '{other}' (expected one of {})",
            NAMES.join(", ")
        ))),
    }
}
