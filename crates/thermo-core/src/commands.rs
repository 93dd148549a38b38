//! Commands the client issues to the BLE stack.
//!
//! [`StackCommand`] is the value form of the [`BleStack`](crate::BleStack)
//! methods. The client never builds one to send; they exist so mock and
//! simulated stacks can record what was asked of them, and so logs can name
//! the command that failed.

use serde::{Deserialize, Serialize};

use thermo_types::{AddressType, BdAddr};

use crate::table::ConnectionHandle;

/// Default minimum connection interval (80 × 1.25 ms = 100 ms).
pub const CONN_INTERVAL_MIN: u16 = 80;

/// Default maximum connection interval (80 × 1.25 ms = 100 ms).
pub const CONN_INTERVAL_MAX: u16 = 80;

/// Default peripheral latency (no skipped connection events).
pub const CONN_LATENCY: u16 = 0;

/// Default supervision timeout (100 × 10 ms = 1 s).
pub const CONN_TIMEOUT: u16 = 100;

/// Default minimum connection event length.
pub const CONN_MIN_CE_LENGTH: u16 = 0;

/// Default maximum connection event length.
pub const CONN_MAX_CE_LENGTH: u16 = 0xFFFF;

/// Parameters applied to every connection the stack opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParameters {
    /// Minimum connection interval in 1.25 ms units.
    pub interval_min: u16,
    /// Maximum connection interval in 1.25 ms units.
    pub interval_max: u16,
    /// Number of connection events the peripheral may skip.
    pub latency: u16,
    /// Supervision timeout in 10 ms units.
    pub timeout: u16,
    /// Minimum connection event length.
    pub min_ce_length: u16,
    /// Maximum connection event length.
    pub max_ce_length: u16,
}

impl Default for ConnectionParameters {
    fn default() -> Self {
        Self {
            interval_min: CONN_INTERVAL_MIN,
            interval_max: CONN_INTERVAL_MAX,
            latency: CONN_LATENCY,
            timeout: CONN_TIMEOUT,
            min_ce_length: CONN_MIN_CE_LENGTH,
            max_ce_length: CONN_MAX_CE_LENGTH,
        }
    }
}

/// A command issued to the BLE stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum StackCommand {
    SetDefaultConnectionParameters(ConnectionParameters),
    StartScan,
    StopScan,
    OpenConnection {
        address: BdAddr,
        address_type: AddressType,
    },
    DiscoverServiceByUuid {
        handle: ConnectionHandle,
        uuid: u16,
    },
    DiscoverCharacteristicByUuid {
        handle: ConnectionHandle,
        service: u32,
        uuid: u16,
    },
    EnableIndications {
        handle: ConnectionHandle,
        characteristic: u16,
    },
    ConfirmIndication {
        handle: ConnectionHandle,
    },
    RequestRssi {
        handle: ConnectionHandle,
    },
    IdentityAddress,
}

impl StackCommand {
    /// Short name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetDefaultConnectionParameters(_) => "set_default_connection_parameters",
            Self::StartScan => "start_scan",
            Self::StopScan => "stop_scan",
            Self::OpenConnection { .. } => "open_connection",
            Self::DiscoverServiceByUuid { .. } => "discover_service_by_uuid",
            Self::DiscoverCharacteristicByUuid { .. } => "discover_characteristic_by_uuid",
            Self::EnableIndications { .. } => "enable_indications",
            Self::ConfirmIndication { .. } => "confirm_indication",
            Self::RequestRssi { .. } => "request_rssi",
            Self::IdentityAddress => "identity_address",
        }
    }

    /// Connection the command targets, if any.
    pub fn handle(&self) -> Option<ConnectionHandle> {
        match self {
            Self::DiscoverServiceByUuid { handle, .. }
            | Self::DiscoverCharacteristicByUuid { handle, .. }
            | Self::EnableIndications { handle, .. }
            | Self::ConfirmIndication { handle }
            | Self::RequestRssi { handle } => Some(*handle),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_connection_parameters() {
        let params = ConnectionParameters::default();
        assert_eq!(params.interval_min, 80);
        assert_eq!(params.interval_max, 80);
        assert_eq!(params.latency, 0);
        assert_eq!(params.timeout, 100);
        assert_eq!(params.max_ce_length, 0xFFFF);
    }

    #[test]
    fn test_command_names() {
        assert_eq!(StackCommand::StartScan.name(), "start_scan");
        let cmd = StackCommand::EnableIndications {
            handle: ConnectionHandle(2),
            characteristic: 0x0020,
        };
        assert_eq!(cmd.name(), "enable_indications");
        assert_eq!(cmd.handle(), Some(ConnectionHandle(2)));
        assert_eq!(StackCommand::StopScan.handle(), None);
    }

    #[test]
    fn test_command_serialization() {
        let cmd = StackCommand::ConfirmIndication {
            handle: ConnectionHandle(1),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert_eq!(json, r#"{"command":"confirm_indication","handle":1}"#);
    }
}
