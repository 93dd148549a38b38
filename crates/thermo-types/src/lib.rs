//! Platform-agnostic types for BLE health thermometer clients.
//!
//! This crate holds the data side of the thermometer client: the wire
//! encodings it has to decode and the identifiers it has to match, with no
//! dependency on any Bluetooth stack.
//!
//! # Features
//!
//! - IEEE-11073 32-bit FLOAT decoding (and encoding, for simulators and tests)
//! - Temperature Measurement characteristic parsing
//! - Bluetooth device address and address type
//! - Assigned numbers for the Health Thermometer profile
//! - Error types for data parsing
//!
//! # Example
//!
//! ```
//! use thermo_types::{TemperatureMeasurement, TemperatureUnit};
//!
//! // Flags 0x00 (Celsius), 364 * 10^-1
//! let m = TemperatureMeasurement::from_bytes(&[0x00, 0x6C, 0x01, 0x00, 0xFF]).unwrap();
//! assert_eq!(m.unit, TemperatureUnit::Celsius);
//! assert!((m.value - 36.4).abs() < 1e-4);
//! ```

pub mod error;
pub mod types;
pub mod uuid;

pub use error::{ParseError, ParseResult};
pub use types::{
    AddressType, BdAddr, Ieee11073Float, MeasurementFlags, TemperatureMeasurement,
    TemperatureType, TemperatureUnit, decode_ieee11073,
};
pub use uuid as uuids;
