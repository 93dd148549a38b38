//! Scripted stack for testing.
//!
//! [`MockStack`] implements [`BleStack`] without a radio. It records every
//! command it receives and answers with success unless told otherwise.
//!
//! # Features
//!
//! - **Command log**: inspect exactly what the client asked for, in order
//! - **Failure injection**: reject a command by name, always or only once
//! - **Telemetry values**: choose the RSSI and identity address it reports

use std::collections::HashMap;

use thermo_types::{AddressType, BdAddr};

use crate::commands::{ConnectionParameters, StackCommand};
use crate::error::StackStatus;
use crate::table::ConnectionHandle;
use crate::traits::{BleStack, StackResult};

/// A scripted BLE stack for testing.
///
/// # Example
///
/// ```
/// use thermo_core::{BleStack, MockStack, StackCommand, StackStatus};
///
/// let mut stack = MockStack::new();
/// stack.fail_once("start_scan", StackStatus::InvalidState);
///
/// assert_eq!(stack.start_scan(), Err(StackStatus::InvalidState));
/// assert_eq!(stack.start_scan(), Ok(()));
/// assert_eq!(stack.commands(), &[StackCommand::StartScan, StackCommand::StartScan]);
/// ```
#[derive(Debug, Clone)]
pub struct MockStack {
    commands: Vec<StackCommand>,
    failures: HashMap<&'static str, StackStatus>,
    one_shot: HashMap<&'static str, StackStatus>,
    rssi: i8,
    identity: (BdAddr, AddressType),
}

impl Default for MockStack {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStack {
    /// Create a stack that accepts every command.
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            failures: HashMap::new(),
            one_shot: HashMap::new(),
            rssi: -50,
            identity: (
                BdAddr([0x5A, 0x4B, 0x3C, 0x2D, 0x1E, 0x0F]),
                AddressType::Public,
            ),
        }
    }

    /// Set the identity address reported by the stack.
    pub fn with_identity(mut self, address: BdAddr, address_type: AddressType) -> Self {
        self.identity = (address, address_type);
        self
    }

    /// Reject every future call of `command` with `status`.
    pub fn fail(&mut self, command: &'static str, status: StackStatus) {
        self.failures.insert(command, status);
    }

    /// Reject only the next call of `command` with `status`.
    pub fn fail_once(&mut self, command: &'static str, status: StackStatus) {
        self.one_shot.insert(command, status);
    }

    /// Stop rejecting `command`.
    pub fn succeed(&mut self, command: &'static str) {
        self.failures.remove(command);
        self.one_shot.remove(command);
    }

    /// Set the RSSI returned by `request_rssi`.
    pub fn set_rssi(&mut self, rssi: i8) {
        self.rssi = rssi;
    }

    /// Every command received so far, oldest first.
    pub fn commands(&self) -> &[StackCommand] {
        &self.commands
    }

    /// The most recent command.
    pub fn last_command(&self) -> Option<&StackCommand> {
        self.commands.last()
    }

    /// Forget the recorded commands.
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Number of recorded commands with the given name.
    pub fn count(&self, command: &str) -> usize {
        self.commands.iter().filter(|c| c.name() == command).count()
    }

    fn record(&mut self, command: StackCommand) -> StackResult {
        let name = command.name();
        self.commands.push(command);
        if let Some(status) = self.one_shot.remove(name) {
            return Err(status);
        }
        match self.failures.get(name) {
            Some(status) => Err(*status),
            None => Ok(()),
        }
    }
}

impl BleStack for MockStack {
    fn identity_address(&mut self) -> StackResult<(BdAddr, AddressType)> {
        self.record(StackCommand::IdentityAddress)?;
        Ok(self.identity)
    }

    fn set_default_connection_parameters(&mut self, params: &ConnectionParameters) -> StackResult {
        self.record(StackCommand::SetDefaultConnectionParameters(*params))
    }

    fn start_scan(&mut self) -> StackResult {
        self.record(StackCommand::StartScan)
    }

    fn stop_scan(&mut self) -> StackResult {
        self.record(StackCommand::StopScan)
    }

    fn open_connection(&mut self, address: BdAddr, address_type: AddressType) -> StackResult {
        self.record(StackCommand::OpenConnection {
            address,
            address_type,
        })
    }

    fn discover_service_by_uuid(&mut self, handle: ConnectionHandle, uuid: u16) -> StackResult {
        self.record(StackCommand::DiscoverServiceByUuid { handle, uuid })
    }

    fn discover_characteristic_by_uuid(
        &mut self,
        handle: ConnectionHandle,
        service: u32,
        uuid: u16,
    ) -> StackResult {
        self.record(StackCommand::DiscoverCharacteristicByUuid {
            handle,
            service,
            uuid,
        })
    }

    fn enable_indications(
        &mut self,
        handle: ConnectionHandle,
        characteristic: u16,
    ) -> StackResult {
        self.record(StackCommand::EnableIndications {
            handle,
            characteristic,
        })
    }

    fn confirm_indication(&mut self, handle: ConnectionHandle) -> StackResult {
        self.record(StackCommand::ConfirmIndication { handle })
    }

    fn request_rssi(&mut self, handle: ConnectionHandle) -> StackResult<i8> {
        self.record(StackCommand::RequestRssi { handle })?;
        Ok(self.rssi)
    }
}
