//! Error types for thermo-core.
//!
//! The discovery state machine sorts failures into five groups. Only the last
//! one ever leaves [`ThermometerClient::handle_event`](crate::ThermometerClient::handle_event):
//!
//! | Failure | Handling |
//! |---------|----------|
//! | Table full when a candidate shows up | Dropped, scanning continues |
//! | Service discovery rejected with an invalid handle | Connection abandoned, scanning resumes |
//! | Characteristic value too short | Logged and discarded, link stays up |
//! | Event for a handle that is not in the table | Ignored |
//! | Any other command rejection | [`Error::Stack`], the event loop stops |
//!
//! A stack rejection outside the anticipated cases means the stack and the
//! client disagree about the world; there is no defined way back, so the
//! caller is expected to tear the process down.

use std::fmt;

use thiserror::Error;

use crate::table::TableError;

/// Errors that can occur while driving thermometer connections.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The BLE stack rejected a command.
    #[error("Stack rejected {command}: {status}")]
    Stack {
        /// Name of the rejected command.
        command: &'static str,
        /// Status code returned by the stack.
        status: StackStatus,
    },

    /// Connection table operation failed.
    #[error(transparent)]
    Table(#[from] TableError),

    /// Failed to parse data received from a peripheral.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Invalid measurement format from a peripheral.
    #[error("Invalid measurement format: expected {expected} bytes, got {actual}")]
    InvalidMeasurementFormat {
        /// Expected data size.
        expected: usize,
        /// Actual data size received.
        actual: usize,
    },

    /// The event source ended unexpectedly.
    #[error("Event stream closed")]
    EventStreamClosed,

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a stack rejection error.
    pub fn stack(command: &'static str, status: StackStatus) -> Self {
        Self::Stack { command, status }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// The stack status behind this error, if it is a stack rejection.
    pub fn stack_status(&self) -> Option<StackStatus> {
        match self {
            Self::Stack { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<thermo_types::ParseError> for Error {
    fn from(err: thermo_types::ParseError) -> Self {
        match err {
            thermo_types::ParseError::InsufficientBytes { expected, actual } => {
                Error::InvalidMeasurementFormat { expected, actual }
            }
            thermo_types::ParseError::InvalidValue(msg) => Error::InvalidData(msg),
            // Handle future ParseError variants (non_exhaustive)
            _ => Error::InvalidData(format!("Parse error: {}", err)),
        }
    }
}

/// Status codes a BLE stack can return when it rejects a command.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new codes
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum StackStatus {
    /// The connection handle does not refer to an open connection.
    InvalidHandle,
    /// The command is not allowed in the stack's current state.
    InvalidState,
    /// A parameter was out of range.
    InvalidParameter,
    /// The stack ran out of buffers or connection slots.
    NoResources,
    /// Another procedure is already in progress on this connection.
    Busy,
    /// The requested measurement is not available.
    Unavailable,
    /// Vendor-specific status code.
    Other(u16),
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHandle => write!(f, "invalid handle"),
            Self::InvalidState => write!(f, "invalid state"),
            Self::InvalidParameter => write!(f, "invalid parameter"),
            Self::NoResources => write!(f, "no resources"),
            Self::Busy => write!(f, "busy"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::Other(code) => write!(f, "status 0x{:04X}", code),
        }
    }
}

/// Result type alias using thermo-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
