//! Fixed-capacity connection table.
//!
//! The table keeps one [`ConnectionRecord`] per open link. Active records
//! always occupy a contiguous prefix of the slot array, in the order their
//! connections were opened. Removing a record shifts the later ones down by
//! one slot so the display order of the remaining peers never changes, and
//! the freed trailing slot is reset to its empty defaults.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use thermo_types::TemperatureUnit;

/// Opaque connection identifier assigned by the BLE stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionHandle(pub u8);

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a connection is in the discovery protocol.
///
/// A record in the table is always in one of the four discovery states.
/// `Idle`, `Scanning` and `Opening` describe the scanner before a connection exists
/// and are reported by [`ThermometerClient::phase`](crate::ThermometerClient::phase).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryState {
    /// Nothing in progress: not booted yet, or no scan running.
    #[default]
    Idle,
    /// Looking for advertisers.
    Scanning,
    /// Connection requested, waiting for the link to open.
    Opening,
    /// Looking up the Health Thermometer service.
    DiscoveringServices,
    /// Looking up the Temperature Measurement characteristic.
    DiscoveringCharacteristics,
    /// Waiting for the indication subscription to be acknowledged.
    EnablingIndication,
    /// Streaming measurements.
    Running,
}

impl DiscoveryState {
    /// Whether the connection is still working through discovery.
    #[must_use]
    pub fn is_discovering(self) -> bool {
        matches!(
            self,
            Self::DiscoveringServices | Self::DiscoveringCharacteristics | Self::EnablingIndication
        )
    }
}

impl fmt::Display for DiscoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Scanning => write!(f, "scanning"),
            Self::Opening => write!(f, "opening"),
            Self::DiscoveringServices => write!(f, "discovering services"),
            Self::DiscoveringCharacteristics => write!(f, "discovering characteristics"),
            Self::EnablingIndication => write!(f, "enabling indication"),
            Self::Running => write!(f, "running"),
        }
    }
}

/// Per-connection protocol state and telemetry.
///
/// Every `Option` field is `None` until the corresponding event has been
/// received for this connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Stack handle; `None` for a free slot.
    pub handle: Option<ConnectionHandle>,
    /// Low 16 bits of the peer address.
    pub peer_short_address: u16,
    /// Health Thermometer service handle.
    pub service_handle: Option<u32>,
    /// Temperature Measurement characteristic handle.
    pub characteristic_handle: Option<u16>,
    /// Most recent temperature, in `unit`.
    pub temperature: Option<f32>,
    /// Unit of the most recent temperature.
    pub unit: Option<TemperatureUnit>,
    /// Median RSSI in dBm.
    pub rssi: Option<i8>,
    /// Local transmit power in dBm.
    pub tx_power: Option<i8>,
    /// Peer transmit power in dBm.
    pub remote_tx_power: Option<i8>,
    /// Set once the stack has reported a local TX power for this link.
    pub power_control_active: bool,
    /// Discovery progress of this connection.
    pub state: DiscoveryState,
}

impl ConnectionRecord {
    fn new(handle: ConnectionHandle, peer_short_address: u16) -> Self {
        Self {
            handle: Some(handle),
            peer_short_address,
            state: DiscoveryState::DiscoveringServices,
            ..Self::default()
        }
    }

    /// Whether this slot holds a live connection.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }
}

/// Errors from connection table mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TableError {
    /// Every slot is already in use.
    #[error("Connection table full ({capacity} connections)")]
    Full {
        /// Table capacity.
        capacity: usize,
    },

    /// The handle already has a record.
    #[error("Connection {0} is already in the table")]
    Duplicate(ConnectionHandle),
}

/// Fixed-capacity registry of open connections.
#[derive(Debug, Clone)]
pub struct ConnectionTable {
    slots: Vec<ConnectionRecord>,
    active: usize,
}

impl ConnectionTable {
    /// Create a table with `capacity` empty slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![ConnectionRecord::default(); capacity],
            active: 0,
        }
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of active records.
    pub fn len(&self) -> usize {
        self.active
    }

    /// Whether no connection is active.
    pub fn is_empty(&self) -> bool {
        self.active == 0
    }

    /// Whether every slot is in use.
    pub fn is_full(&self) -> bool {
        self.active >= self.slots.len()
    }

    /// Append a record for a newly opened connection.
    ///
    /// Returns the slot index of the new record. The table is left untouched
    /// on error.
    pub fn insert(
        &mut self,
        handle: ConnectionHandle,
        peer_short_address: u16,
    ) -> Result<usize, TableError> {
        if self.is_full() {
            return Err(TableError::Full {
                capacity: self.capacity(),
            });
        }
        if self.find(handle).is_some() {
            return Err(TableError::Duplicate(handle));
        }
        let index = self.active;
        self.slots[index] = ConnectionRecord::new(handle, peer_short_address);
        self.active += 1;
        Ok(index)
    }

    /// Slot index of `handle`, if it is active.
    pub fn find(&self, handle: ConnectionHandle) -> Option<usize> {
        self.slots[..self.active]
            .iter()
            .position(|record| record.handle == Some(handle))
    }

    /// Record for `handle`, if it is active.
    pub fn get(&self, handle: ConnectionHandle) -> Option<&ConnectionRecord> {
        self.find(handle).map(|index| &self.slots[index])
    }

    /// Mutable record for `handle`, if it is active.
    pub fn get_mut(&mut self, handle: ConnectionHandle) -> Option<&mut ConnectionRecord> {
        let index = self.find(handle)?;
        Some(&mut self.slots[index])
    }

    /// Remove the record for `handle`, shifting later records down.
    ///
    /// Returns the removed record, or `None` if the handle was not active.
    pub fn remove(&mut self, handle: ConnectionHandle) -> Option<ConnectionRecord> {
        let index = self.find(handle)?;
        self.slots[index..self.active].rotate_left(1);
        self.active -= 1;
        let removed = std::mem::take(&mut self.slots[self.active]);
        for slot in &mut self.slots[self.active..] {
            *slot = ConnectionRecord::default();
        }
        Some(removed)
    }

    /// Active records in slot order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ConnectionRecord> + ExactSizeIterator {
        self.slots[..self.active].iter()
    }

    /// All slots, active prefix first, free slots after.
    pub fn slots(&self) -> &[ConnectionRecord] {
        &self.slots
    }

    /// Copy of every slot, for handing to reporters.
    pub fn snapshot(&self) -> Vec<ConnectionRecord> {
        self.slots.clone()
    }
}
