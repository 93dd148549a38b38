//! Events flowing into and out of the client.
//!
//! [`StackEvent`] is what the BLE stack reports; the client consumes these
//! one at a time. [`ClientEvent`] is what the client publishes for reporters
//! and other observers through an [`EventDispatcher`].

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use thermo_types::{AddressType, BdAddr, TemperatureMeasurement};

use crate::table::{ConnectionHandle, ConnectionRecord};

/// Version reported by the stack at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StackVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    pub build: u16,
}

impl fmt::Display for StackVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "v{}.{}.{}-b{}",
            self.major, self.minor, self.patch, self.build
        )
    }
}

/// Event flags attached to an advertisement report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdvertisementFlags(pub u8);

impl AdvertisementFlags {
    /// The advertiser accepts connections.
    pub const CONNECTABLE: u8 = 0x01;
    /// The advertiser accepts scan requests.
    pub const SCANNABLE: u8 = 0x02;
    /// Directed advertisement.
    pub const DIRECTED: u8 = 0x04;
    /// The report is a scan response.
    pub const SCAN_RESPONSE: u8 = 0x08;

    /// Flags of a connectable, scannable, undirected advertisement.
    pub const fn connectable_scannable() -> Self {
        Self(Self::CONNECTABLE | Self::SCANNABLE)
    }

    /// Whether this is exactly a connectable and scannable undirected
    /// advertisement (not a scan response, not directed).
    pub fn is_connectable_scannable(self) -> bool {
        self.0 == Self::CONNECTABLE | Self::SCANNABLE
    }
}

/// Events delivered by the BLE stack.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum StackEvent {
    /// The stack has started. No command may be issued before this.
    SystemBooted { version: StackVersion },
    /// An advertisement or scan response was received.
    AdvertisementReport {
        address: BdAddr,
        address_type: AddressType,
        flags: AdvertisementFlags,
        rssi: i8,
        payload: Vec<u8>,
    },
    /// A connection was established.
    ConnectionOpened {
        handle: ConnectionHandle,
        address: BdAddr,
        address_type: AddressType,
    },
    /// A connection was closed, or an open attempt failed.
    ConnectionClosed { handle: ConnectionHandle, reason: u16 },
    /// A primary service matching the discovery request was found.
    ServiceFound {
        handle: ConnectionHandle,
        service: u32,
    },
    /// A characteristic matching the discovery request was found.
    CharacteristicFound {
        handle: ConnectionHandle,
        characteristic: u16,
    },
    /// The outstanding GATT procedure on the connection has finished.
    ProcedureCompleted { handle: ConnectionHandle, status: u16 },
    /// A characteristic value arrived (indication, notification or read).
    CharacteristicValueReceived {
        handle: ConnectionHandle,
        characteristic: u16,
        value: Vec<u8>,
    },
    /// Local transmit power changed.
    TxPowerReported { handle: ConnectionHandle, level: i8 },
    /// Peer transmit power changed.
    RemoteTxPowerReported { handle: ConnectionHandle, level: i8 },
}

impl StackEvent {
    /// Connection the event refers to, if any.
    pub fn handle(&self) -> Option<ConnectionHandle> {
        match self {
            Self::ConnectionOpened { handle, .. }
            | Self::ConnectionClosed { handle, .. }
            | Self::ServiceFound { handle, .. }
            | Self::CharacteristicFound { handle, .. }
            | Self::ProcedureCompleted { handle, .. }
            | Self::CharacteristicValueReceived { handle, .. }
            | Self::TxPowerReported { handle, .. }
            | Self::RemoteTxPowerReported { handle, .. } => Some(*handle),
            Self::SystemBooted { .. } | Self::AdvertisementReport { .. } => None,
        }
    }
}

/// Events published by the client.
///
/// All events are serializable for logging and machine-readable output.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum ClientEvent {
    /// The stack booted and the client configured it.
    Booted {
        version: StackVersion,
        address: BdAddr,
        address_type: AddressType,
    },
    /// Scanning (re)started.
    ScanStarted,
    /// A thermometer advertisement was accepted and a connection requested.
    Connecting {
        address: BdAddr,
        name: Option<String>,
        rssi: i8,
    },
    /// A connection opened and discovery began.
    Connected {
        handle: ConnectionHandle,
        peer: u16,
    },
    /// Discovery finished; the peer is streaming.
    Ready {
        handle: ConnectionHandle,
        peer: u16,
    },
    /// A measurement was decoded. `table` is a snapshot of every slot.
    Measurement {
        handle: ConnectionHandle,
        measurement: TemperatureMeasurement,
        table: Vec<ConnectionRecord>,
    },
    /// Transmit power of a link changed.
    TxPower {
        handle: ConnectionHandle,
        local: Option<i8>,
        remote: Option<i8>,
    },
    /// A connection closed and its slot was reclaimed.
    Disconnected {
        handle: ConnectionHandle,
        peer: Option<u16>,
        reason: u16,
    },
}

/// Sender for client events.
pub type EventSender = broadcast::Sender<ClientEvent>;

/// Receiver for client events.
pub type EventReceiver = broadcast::Receiver<ClientEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    broadcast::channel(capacity)
}

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: ClientEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}
