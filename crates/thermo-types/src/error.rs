//! Error types for data parsing in thermo-types.

use thiserror::Error;

/// Errors that can occur when parsing thermometer data.
///
/// This error type is platform-agnostic and does not include
/// stack-level errors (those belong in thermo-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Not enough bytes to decode the value.
    #[error("Insufficient bytes: requires {expected} bytes, got {actual}")]
    InsufficientBytes {
        /// Minimum number of bytes needed.
        expected: usize,
        /// Number of bytes received.
        actual: usize,
    },

    /// A field carried a value outside its defined range.
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

impl ParseError {
    /// Create an insufficient bytes error.
    pub fn insufficient(expected: usize, actual: usize) -> Self {
        Self::InsufficientBytes { expected, actual }
    }
}

/// Result type alias using thermo-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
