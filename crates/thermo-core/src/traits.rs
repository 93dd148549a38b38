//! Trait abstractions over the BLE stack.
//!
//! The client talks to the stack through two seams:
//!
//! - [`BleStack`] accepts commands. Every call returns immediately; an `Err`
//!   is the stack's synchronous rejection of the command, never the outcome
//!   of the procedure it starts. Outcomes arrive later as events.
//! - [`EventSource`] delivers those events, one at a time.
//!
//! Keeping them separate lets the event loop own the client (and through it
//! the stack) while awaiting the next event.

use async_trait::async_trait;

use thermo_types::{AddressType, BdAddr};

use crate::commands::ConnectionParameters;
use crate::error::StackStatus;
use crate::events::StackEvent;
use crate::table::ConnectionHandle;

/// Result of a stack command.
pub type StackResult<T = ()> = std::result::Result<T, StackStatus>;

/// Commands accepted by a BLE stack in the central role.
///
/// # Example
///
/// ```ignore
/// use thermo_core::{BleStack, StackResult};
///
/// fn restart_scan<S: BleStack>(stack: &mut S) -> StackResult {
///     stack.stop_scan()?;
///     stack.start_scan()
/// }
/// ```
pub trait BleStack: Send {
    // --- Controller ---

    /// Read the local identity address.
    fn identity_address(&mut self) -> StackResult<(BdAddr, AddressType)>;

    /// Set the parameters used for connections opened from now on.
    fn set_default_connection_parameters(&mut self, params: &ConnectionParameters) -> StackResult;

    // --- Scanning and connecting ---

    /// Start scanning (1M PHY, general discovery).
    fn start_scan(&mut self) -> StackResult;

    /// Stop scanning.
    fn stop_scan(&mut self) -> StackResult;

    /// Open a connection to an advertiser.
    fn open_connection(&mut self, address: BdAddr, address_type: AddressType) -> StackResult;

    // --- GATT client ---

    /// Discover primary services matching a 16-bit UUID.
    fn discover_service_by_uuid(&mut self, handle: ConnectionHandle, uuid: u16) -> StackResult;

    /// Discover characteristics of `service` matching a 16-bit UUID.
    fn discover_characteristic_by_uuid(
        &mut self,
        handle: ConnectionHandle,
        service: u32,
        uuid: u16,
    ) -> StackResult;

    /// Subscribe to indications on a characteristic.
    fn enable_indications(&mut self, handle: ConnectionHandle, characteristic: u16)
    -> StackResult;

    /// Acknowledge the last indication received on the connection.
    fn confirm_indication(&mut self, handle: ConnectionHandle) -> StackResult;

    // --- Link telemetry ---

    /// Median RSSI of the connection in dBm.
    fn request_rssi(&mut self, handle: ConnectionHandle) -> StackResult<i8>;
}

/// Asynchronous source of stack events.
#[async_trait]
pub trait EventSource: Send {
    /// Wait for the next event. `None` means the stack has gone away.
    async fn next_event(&mut self) -> Option<StackEvent>;
}

#[async_trait]
impl EventSource for tokio::sync::mpsc::Receiver<StackEvent> {
    async fn next_event(&mut self) -> Option<StackEvent> {
        self.recv().await
    }
}

#[async_trait]
impl EventSource for tokio::sync::mpsc::UnboundedReceiver<StackEvent> {
    async fn next_event(&mut self) -> Option<StackEvent> {
        self.recv().await
    }
}
