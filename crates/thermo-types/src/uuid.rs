//! Bluetooth SIG assigned numbers used by the thermometer client.
//!
//! The client works with 16-bit short UUIDs on the wire. The 128-bit forms
//! are provided for display and for interop with APIs that expect full UUIDs.

use uuid::{Uuid, uuid};

/// The Bluetooth base UUID, `0000xxxx-0000-1000-8000-00805f9b34fb`.
pub const BLUETOOTH_BASE: Uuid = uuid!("00000000-0000-1000-8000-00805f9b34fb");

// --- Short (16-bit) assigned numbers ---

/// Health Thermometer service.
pub const HEALTH_THERMOMETER_SERVICE: u16 = 0x1809;

/// Temperature Measurement characteristic (indicate).
pub const TEMPERATURE_MEASUREMENT: u16 = 0x2A1C;

/// Temperature Type characteristic (read).
pub const TEMPERATURE_TYPE: u16 = 0x2A1D;

/// Intermediate Temperature characteristic (notify).
pub const INTERMEDIATE_TEMPERATURE: u16 = 0x2A1E;

// --- Advertising data types ---

/// AD type: incomplete list of 16-bit service UUIDs.
pub const AD_TYPE_INCOMPLETE_UUID16: u8 = 0x02;

/// AD type: complete list of 16-bit service UUIDs.
pub const AD_TYPE_COMPLETE_UUID16: u8 = 0x03;

/// AD type: shortened local name.
pub const AD_TYPE_SHORTENED_NAME: u8 = 0x08;

/// AD type: complete local name.
pub const AD_TYPE_COMPLETE_NAME: u8 = 0x09;

/// Expand a 16-bit assigned number into its 128-bit UUID.
///
/// # Examples
///
/// ```
/// use thermo_types::uuid::{from_short, HEALTH_THERMOMETER_SERVICE};
///
/// let full = from_short(HEALTH_THERMOMETER_SERVICE);
/// assert_eq!(full.to_string(), "00001809-0000-1000-8000-00805f9b34fb");
/// ```
#[must_use]
pub fn from_short(short: u16) -> Uuid {
    let base = BLUETOOTH_BASE.as_u128();
    Uuid::from_u128(base | ((short as u128) << 96))
}

/// Extract the 16-bit assigned number from a UUID built on the Bluetooth base.
///
/// Returns `None` for vendor-specific UUIDs.
#[must_use]
pub fn to_short(uuid: &Uuid) -> Option<u16> {
    let value = uuid.as_u128();
    let mask = !(0xFFFF_u128 << 96);
    if value & mask == BLUETOOTH_BASE.as_u128() {
        Some((value >> 96) as u16)
    } else {
        None
    }
}
