//! Core types for thermometer data.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::{Date, Month, PrimitiveDateTime, Time};

use crate::error::ParseError;

/// Mantissa of the IEEE-11073 "not a number" special value.
pub const IEEE_11073_NAN_MANTISSA: i32 = 0x7F_FFFF;

/// Largest mantissa representable in 24 signed bits.
const MANTISSA_MAX: i32 = 0x7F_FFFF;

/// Smallest mantissa representable in 24 signed bits.
const MANTISSA_MIN: i32 = -0x80_0000;

/// Minimum number of bytes in a Temperature Measurement value (flags + FLOAT).
pub const MIN_MEASUREMENT_BYTES: usize = 5;

/// Length of a Date Time field inside a Temperature Measurement.
const TIMESTAMP_BYTES: usize = 7;

/// An IEEE-11073 32-bit FLOAT as carried on the wire.
///
/// The value is a 24-bit signed mantissa followed by an 8-bit signed
/// base-10 exponent, little-endian:
///
/// ```text
/// [mantissa low][mantissa mid][mantissa high (signed)][exponent (signed)]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Ieee11073Float {
    mantissa: i32,
    exponent: i8,
}

impl Ieee11073Float {
    /// The reserved "not a number" value.
    pub const NAN: Self = Self {
        mantissa: IEEE_11073_NAN_MANTISSA,
        exponent: 0,
    };

    /// Build a FLOAT from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidValue`] if `mantissa` does not fit in
    /// 24 signed bits.
    pub fn from_parts(mantissa: i32, exponent: i8) -> Result<Self, ParseError> {
        if !(MANTISSA_MIN..=MANTISSA_MAX).contains(&mantissa) {
            return Err(ParseError::InvalidValue(format!(
                "mantissa {} does not fit in 24 bits",
                mantissa
            )));
        }
        Ok(Self { mantissa, exponent })
    }

    /// Decode the 4 wire bytes. Every input is valid.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        let [low, mid, high, exponent] = bytes;
        // Place the 24-bit value in the top of an i32, then shift back down
        // arithmetically so bit 23 is sign-extended.
        let raw = (u32::from(high) << 24) | (u32::from(mid) << 16) | (u32::from(low) << 8);
        Self {
            mantissa: (raw as i32) >> 8,
            exponent: exponent as i8,
        }
    }

    /// Encode back to the 4 wire bytes.
    #[must_use]
    pub fn to_bytes(self) -> [u8; 4] {
        let m = self.mantissa.to_le_bytes();
        [m[0], m[1], m[2], self.exponent as u8]
    }

    /// The sign-extended 24-bit mantissa.
    #[must_use]
    pub fn mantissa(self) -> i32 {
        self.mantissa
    }

    /// The base-10 exponent.
    #[must_use]
    pub fn exponent(self) -> i8 {
        self.exponent
    }

    /// Whether this is the reserved NaN pattern (mantissa 0x7FFFFF, exponent 0).
    #[must_use]
    pub fn is_nan(self) -> bool {
        self == Self::NAN
    }

    /// Convert to `f32` as `mantissa * 10^exponent`.
    ///
    /// The NaN pattern maps to [`f32::NAN`]. Other reserved values are
    /// converted arithmetically.
    #[must_use]
    pub fn to_f32(self) -> f32 {
        if self.is_nan() {
            return f32::NAN;
        }
        (f64::from(self.mantissa) * 10f64.powi(i32::from(self.exponent))) as f32
    }
}

impl From<[u8; 4]> for Ieee11073Float {
    fn from(bytes: [u8; 4]) -> Self {
        Self::from_bytes(bytes)
    }
}

/// Decode 4 IEEE-11073 FLOAT bytes straight to `f32`.
///
/// # Examples
///
/// ```
/// use thermo_types::types::decode_ieee11073;
///
/// // 364 * 10^-1
/// let value = decode_ieee11073([0x6C, 0x01, 0x00, 0xFF]);
/// assert!((value - 36.4).abs() < 1e-4);
///
/// assert!(decode_ieee11073([0xFF, 0xFF, 0x7F, 0x00]).is_nan());
/// ```
#[must_use]
pub fn decode_ieee11073(bytes: [u8; 4]) -> f32 {
    Ieee11073Float::from_bytes(bytes).to_f32()
}

/// Temperature unit reported by the thermometer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TemperatureUnit {
    /// Degrees Celsius.
    Celsius,
    /// Degrees Fahrenheit.
    Fahrenheit,
}

impl TemperatureUnit {
    /// Unit selected by bit 0 of the measurement flags byte.
    #[must_use]
    pub fn from_flags(flags: u8) -> Self {
        if flags & MeasurementFlags::FAHRENHEIT != 0 {
            TemperatureUnit::Fahrenheit
        } else {
            TemperatureUnit::Celsius
        }
    }

    /// Single-letter symbol used in status output.
    #[must_use]
    pub fn symbol(self) -> char {
        match self {
            TemperatureUnit::Celsius => 'C',
            TemperatureUnit::Fahrenheit => 'F',
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemperatureUnit::Celsius => write!(f, "Celsius"),
            TemperatureUnit::Fahrenheit => write!(f, "Fahrenheit"),
        }
    }
}

/// Bit definitions of the Temperature Measurement flags byte.
pub struct MeasurementFlags;

impl MeasurementFlags {
    /// Value is in Fahrenheit (Celsius when clear).
    pub const FAHRENHEIT: u8 = 0x01;
    /// A Date Time timestamp follows the value.
    pub const TIMESTAMP: u8 = 0x02;
    /// A temperature type byte follows.
    pub const TEMPERATURE_TYPE: u8 = 0x04;
}

/// Body location of the measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[non_exhaustive]
#[repr(u8)]
pub enum TemperatureType {
    Armpit = 1,
    Body = 2,
    Ear = 3,
    Finger = 4,
    GastroIntestinal = 5,
    Mouth = 6,
    Rectum = 7,
    Toe = 8,
    Tympanum = 9,
}

impl TryFrom<u8> for TemperatureType {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(TemperatureType::Armpit),
            2 => Ok(TemperatureType::Body),
            3 => Ok(TemperatureType::Ear),
            4 => Ok(TemperatureType::Finger),
            5 => Ok(TemperatureType::GastroIntestinal),
            6 => Ok(TemperatureType::Mouth),
            7 => Ok(TemperatureType::Rectum),
            8 => Ok(TemperatureType::Toe),
            9 => Ok(TemperatureType::Tympanum),
            other => Err(ParseError::InvalidValue(format!(
                "unknown temperature type {}",
                other
            ))),
        }
    }
}

/// A decoded Temperature Measurement characteristic value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TemperatureMeasurement {
    /// Unit of `value`.
    pub unit: TemperatureUnit,
    /// Temperature in `unit`. NaN when the sensor reported "not a number".
    pub value: f32,
    /// Time of measurement, if the peripheral included one.
    pub timestamp: Option<PrimitiveDateTime>,
    /// Measurement site, if the peripheral included one.
    pub temperature_type: Option<TemperatureType>,
}

impl TemperatureMeasurement {
    /// Parse a Temperature Measurement value.
    ///
    /// Byte 0 carries the flags, bytes 1-4 the IEEE-11073 FLOAT. Optional
    /// fields announced by the flags are parsed when present; a truncated or
    /// out-of-range optional field is dropped rather than failing the whole
    /// measurement.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InsufficientBytes`] if `data` contains fewer than
    /// [`MIN_MEASUREMENT_BYTES`] (5) bytes.
    #[must_use = "parsing returns a Result that should be handled"]
    pub fn from_bytes(data: &[u8]) -> Result<Self, ParseError> {
        use bytes::Buf;

        if data.len() < MIN_MEASUREMENT_BYTES {
            return Err(ParseError::insufficient(MIN_MEASUREMENT_BYTES, data.len()));
        }

        let mut buf = data;
        let flags = buf.get_u8();
        let mut raw = [0u8; 4];
        buf.copy_to_slice(&mut raw);

        let mut timestamp = None;
        if flags & MeasurementFlags::TIMESTAMP != 0 && buf.remaining() >= TIMESTAMP_BYTES {
            let mut field = [0u8; TIMESTAMP_BYTES];
            buf.copy_to_slice(&mut field);
            timestamp = parse_date_time(field);
        }

        let mut temperature_type = None;
        if flags & MeasurementFlags::TEMPERATURE_TYPE != 0 && buf.has_remaining() {
            temperature_type = TemperatureType::try_from(buf.get_u8()).ok();
        }

        Ok(Self {
            unit: TemperatureUnit::from_flags(flags),
            value: decode_ieee11073(raw),
            timestamp,
            temperature_type,
        })
    }

    /// Encode a minimal measurement (flags + FLOAT) as a peripheral would send it.
    #[must_use]
    pub fn encode(unit: TemperatureUnit, value: Ieee11073Float) -> [u8; MIN_MEASUREMENT_BYTES] {
        let flags = match unit {
            TemperatureUnit::Celsius => 0,
            TemperatureUnit::Fahrenheit => MeasurementFlags::FAHRENHEIT,
        };
        let [a, b, c, d] = value.to_bytes();
        [flags, a, b, c, d]
    }
}

/// Parse a Bluetooth Date Time field. Year 0, month 0 or day 0 mean "unknown".
fn parse_date_time(field: [u8; TIMESTAMP_BYTES]) -> Option<PrimitiveDateTime> {
    let year = u16::from_le_bytes([field[0], field[1]]);
    if year == 0 {
        return None;
    }
    let month = Month::try_from(field[2]).ok()?;
    let date = Date::from_calendar_date(i32::from(year), month, field[3]).ok()?;
    let time = Time::from_hms(field[4], field[5], field[6]).ok()?;
    Some(PrimitiveDateTime::new(date, time))
}

/// Kind of Bluetooth device address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[repr(u8)]
pub enum AddressType {
    /// Public device address.
    #[default]
    Public = 0,
    /// Static random address.
    StaticRandom = 1,
    /// Resolvable private random address.
    RandomResolvable = 2,
    /// Non-resolvable private random address.
    RandomNonResolvable = 3,
}

impl From<u8> for AddressType {
    fn from(value: u8) -> Self {
        match value {
            1 => AddressType::StaticRandom,
            2 => AddressType::RandomResolvable,
            3 => AddressType::RandomNonResolvable,
            _ => AddressType::Public,
        }
    }
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressType::Public => write!(f, "public device"),
            AddressType::StaticRandom => write!(f, "static random"),
            AddressType::RandomResolvable => write!(f, "resolvable random"),
            AddressType::RandomNonResolvable => write!(f, "non-resolvable random"),
        }
    }
}

/// A 48-bit Bluetooth device address.
///
/// Bytes are stored in over-the-air order (least significant first), so
/// `AA:BB:CC:DD:EE:FF` is `[0xFF, 0xEE, 0xDD, 0xCC, 0xBB, 0xAA]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BdAddr(pub [u8; 6]);

impl BdAddr {
    /// The low 16 bits of the address, used as a compact display label.
    #[must_use]
    pub fn short(&self) -> u16 {
        u16::from_le_bytes([self.0[0], self.0[1]])
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a[5], a[4], a[3], a[2], a[1], a[0]
        )
    }
}

impl FromStr for BdAddr {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(ParseError::InvalidValue(format!(
                "expected 6 colon-separated octets, got '{}'",
                s
            )));
        }
        let mut addr = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            addr[5 - i] = u8::from_str_radix(part, 16)
                .map_err(|_| ParseError::InvalidValue(format!("bad octet '{}' in '{}'", part, s)))?;
        }
        Ok(BdAddr(addr))
    }
}
