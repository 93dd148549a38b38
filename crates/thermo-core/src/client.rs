//! Multi-peer thermometer client.
//!
//! [`ThermometerClient`] owns the BLE stack handle, the connection table and
//! the scanner state. It consumes one [`StackEvent`] at a time and answers
//! with stack commands, moving each connection through service discovery,
//! characteristic discovery and indication enablement until it streams
//! measurements.
//!
//! The scanner is shared by all connections. Only one advertiser is opened
//! at a time: a matching advertisement stops the scan, and scanning resumes
//! once the new connection has finished discovery (or a slot frees up).

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use thermo_types::uuids::{HEALTH_THERMOMETER_SERVICE, TEMPERATURE_MEASUREMENT};
use thermo_types::{AddressType, BdAddr, TemperatureMeasurement};

use crate::advertisement::{contains_service_uuid, local_name};
use crate::commands::ConnectionParameters;
use crate::error::{Error, Result, StackStatus};
use crate::events::{
    AdvertisementFlags, ClientEvent, EventDispatcher, EventReceiver, StackEvent, StackVersion,
};
use crate::table::{ConnectionHandle, ConnectionTable, DiscoveryState};
use crate::traits::{BleStack, StackResult};

/// Default number of simultaneous connections.
pub const DEFAULT_CAPACITY: usize = 4;

/// Largest connection table the client accepts.
pub const MAX_CAPACITY: usize = 8;

/// Configuration for a [`ThermometerClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Number of connection slots.
    pub capacity: usize,
    /// Parameters applied to every connection.
    pub connection_parameters: ConnectionParameters,
    /// 16-bit UUID of the service advertisers must carry.
    pub service_uuid: u16,
    /// 16-bit UUID of the characteristic to subscribe to.
    pub characteristic_uuid: u16,
    /// Buffer size of the client event channel.
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            connection_parameters: ConnectionParameters::default(),
            service_uuid: HEALTH_THERMOMETER_SERVICE,
            characteristic_uuid: TEMPERATURE_MEASUREMENT,
            event_capacity: 100,
        }
    }
}

impl ClientConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of connection slots.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the default connection parameters.
    pub fn connection_parameters(mut self, params: ConnectionParameters) -> Self {
        self.connection_parameters = params;
        self
    }

    /// Set the service UUID used to filter advertisements.
    pub fn service_uuid(mut self, uuid: u16) -> Self {
        self.service_uuid = uuid;
        self
    }

    /// Set the characteristic UUID to subscribe to.
    pub fn characteristic_uuid(mut self, uuid: u16) -> Self {
        self.characteristic_uuid = uuid;
        self
    }

    /// Set the client event channel size.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Validate the configuration and return an error if invalid.
    ///
    /// Checks that:
    /// - `capacity` is between 1 and [`MAX_CAPACITY`]
    /// - `event_capacity` is > 0
    /// - the connection interval range is not inverted
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 || self.capacity > MAX_CAPACITY {
            return Err(Error::invalid_config(format!(
                "capacity must be between 1 and {MAX_CAPACITY}, got {}",
                self.capacity
            )));
        }
        if self.event_capacity == 0 {
            return Err(Error::invalid_config("event_capacity must be > 0"));
        }
        let params = &self.connection_parameters;
        if params.interval_min > params.interval_max {
            return Err(Error::invalid_config(
                "interval_min must be <= interval_max",
            ));
        }
        Ok(())
    }
}

/// What the shared scanner is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    /// Not scanning and no connection pending.
    #[default]
    Idle,
    /// Scanning for advertisers.
    Scanning,
    /// Scan stopped, a connection request is pending.
    Opening,
}

/// Event-driven controller for several thermometer connections.
pub struct ThermometerClient<S> {
    stack: S,
    config: ClientConfig,
    table: ConnectionTable,
    scanner: ScanState,
    identity: Option<(BdAddr, AddressType)>,
    events: EventDispatcher,
}

impl<S: BleStack> ThermometerClient<S> {
    /// Create a client with the default configuration.
    pub fn new(stack: S) -> Self {
        Self::build(stack, ClientConfig::default())
    }

    /// Create a client with a custom configuration.
    pub fn with_config(stack: S, config: ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(stack, config))
    }

    fn build(stack: S, config: ClientConfig) -> Self {
        Self {
            stack,
            table: ConnectionTable::new(config.capacity),
            events: EventDispatcher::new(config.event_capacity),
            scanner: ScanState::Idle,
            identity: None,
            config,
        }
    }

    /// Client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Connection table.
    pub fn table(&self) -> &ConnectionTable {
        &self.table
    }

    /// Scanner state.
    pub fn scan_state(&self) -> ScanState {
        self.scanner
    }

    /// Overall discovery phase.
    ///
    /// While the scanner is scanning or opening, that is the phase. When it
    /// is idle, the phase is that of the most recently opened connection
    /// still in discovery, or `Running` once every connection streams. An
    /// idle scanner with no connections (before boot) is `Idle`.
    pub fn phase(&self) -> DiscoveryState {
        match self.scanner {
            ScanState::Scanning => DiscoveryState::Scanning,
            ScanState::Opening => DiscoveryState::Opening,
            ScanState::Idle => self
                .table
                .iter()
                .rev()
                .map(|record| record.state)
                .find(|state| state.is_discovering())
                .unwrap_or(if self.table.is_empty() {
                    DiscoveryState::Idle
                } else {
                    DiscoveryState::Running
                }),
        }
    }

    /// Underlying stack.
    pub fn stack(&self) -> &S {
        &self.stack
    }

    /// Mutable access to the underlying stack.
    pub fn stack_mut(&mut self) -> &mut S {
        &mut self.stack
    }

    /// Consume the client and return the stack.
    pub fn into_stack(self) -> S {
        self.stack
    }

    /// Subscribe to client events.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// The client event dispatcher.
    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// Local identity address, read from the stack on first use.
    pub fn identity_address(&mut self) -> Result<(BdAddr, AddressType)> {
        if let Some(identity) = self.identity {
            return Ok(identity);
        }
        let identity = check("identity_address", self.stack.identity_address())?;
        self.identity = Some(identity);
        Ok(identity)
    }

    /// Process one stack event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Stack`] when the stack rejects a command in a way
    /// the client cannot recover from. The client should not be driven
    /// further after an error.
    pub fn handle_event(&mut self, event: StackEvent) -> Result<()> {
        match event {
            StackEvent::SystemBooted { version } => self.on_booted(version),
            StackEvent::AdvertisementReport {
                address,
                address_type,
                flags,
                rssi,
                payload,
            } => self.on_advertisement(address, address_type, flags, rssi, &payload),
            StackEvent::ConnectionOpened {
                handle, address, ..
            } => self.on_connection_opened(handle, address),
            StackEvent::ConnectionClosed { handle, reason } => {
                self.on_connection_closed(handle, reason)
            }
            StackEvent::ServiceFound { handle, service } => {
                if let Some(record) = self.table.get_mut(handle) {
                    debug!("Service found on {}: 0x{:08X}", handle, service);
                    record.service_handle = Some(service);
                }
                Ok(())
            }
            StackEvent::CharacteristicFound {
                handle,
                characteristic,
            } => {
                if let Some(record) = self.table.get_mut(handle) {
                    debug!("Characteristic found on {}: 0x{:04X}", handle, characteristic);
                    record.characteristic_handle = Some(characteristic);
                }
                Ok(())
            }
            StackEvent::ProcedureCompleted { handle, status } => {
                self.on_procedure_completed(handle, status)
            }
            StackEvent::CharacteristicValueReceived { handle, value, .. } => {
                self.on_value(handle, &value)
            }
            StackEvent::TxPowerReported { handle, level } => {
                self.on_tx_power(handle, Some(level), None);
                Ok(())
            }
            StackEvent::RemoteTxPowerReported { handle, level } => {
                self.on_tx_power(handle, None, Some(level));
                Ok(())
            }
        }
    }

    fn on_booted(&mut self, version: StackVersion) -> Result<()> {
        info!("Bluetooth stack booted: {}", version);
        let (address, address_type) = self.identity_address()?;
        info!("Bluetooth {} address: {}", address_type, address);

        let params = self.config.connection_parameters;
        check(
            "set_default_connection_parameters",
            self.stack.set_default_connection_parameters(&params),
        )?;
        self.events.send(ClientEvent::Booted {
            version,
            address,
            address_type,
        });

        info!("Starting initial discovery");
        self.start_scan()
    }

    fn on_advertisement(
        &mut self,
        address: BdAddr,
        address_type: AddressType,
        flags: AdvertisementFlags,
        rssi: i8,
        payload: &[u8],
    ) -> Result<()> {
        if self.scanner != ScanState::Scanning
            || !flags.is_connectable_scannable()
            || !contains_service_uuid(payload, self.config.service_uuid)
        {
            return Ok(());
        }

        check("stop_scan", self.stack.stop_scan())?;
        self.scanner = ScanState::Idle;

        if self.table.is_full() {
            debug!(
                "Connection table full ({}), ignoring {}",
                self.table.capacity(),
                address
            );
            return Ok(());
        }

        let name = local_name(payload);
        info!(
            "Connecting to {} ({}) at {} dBm",
            address,
            name.as_deref().unwrap_or("unnamed"),
            rssi
        );
        check(
            "open_connection",
            self.stack.open_connection(address, address_type),
        )?;
        self.scanner = ScanState::Opening;
        self.events.send(ClientEvent::Connecting {
            address,
            name,
            rssi,
        });
        Ok(())
    }

    fn on_connection_opened(&mut self, handle: ConnectionHandle, address: BdAddr) -> Result<()> {
        if self.scanner == ScanState::Opening {
            self.scanner = ScanState::Idle;
        }

        let peer = address.short();
        if let Err(e) = self.table.insert(handle, peer) {
            warn!("Dropping connection {} to {}: {}", handle, address, e);
            if self.scanner == ScanState::Idle && !self.table.is_full() {
                self.start_scan()?;
            }
            return Ok(());
        }

        match self
            .stack
            .discover_service_by_uuid(handle, self.config.service_uuid)
        {
            Ok(()) => {
                info!("Connected to {:04x} as {}, discovering services", peer, handle);
                self.events.send(ClientEvent::Connected { handle, peer });
                Ok(())
            }
            Err(StackStatus::InvalidHandle) => {
                warn!(
                    "Primary service discovery failed with invalid handle, dropping {}",
                    handle
                );
                self.table.remove(handle);
                if self.scanner != ScanState::Scanning {
                    self.start_scan()?;
                }
                Ok(())
            }
            Err(status) => Err(Error::stack("discover_service_by_uuid", status)),
        }
    }

    fn on_connection_closed(&mut self, handle: ConnectionHandle, reason: u16) -> Result<()> {
        let removed = self.table.remove(handle);
        let peer = removed.as_ref().map(|record| record.peer_short_address);
        match peer {
            Some(peer) => info!(
                "Connection {} to {:04x} closed (reason 0x{:04X})",
                handle, peer, reason
            ),
            None => debug!("Unknown connection {} closed (reason 0x{:04X})", handle, reason),
        }
        self.events.send(ClientEvent::Disconnected {
            handle,
            peer,
            reason,
        });

        match self.scanner {
            ScanState::Scanning => Ok(()),
            // Another link dropped while our open request is still pending
            ScanState::Opening if removed.is_some() => Ok(()),
            ScanState::Opening | ScanState::Idle => self.start_scan(),
        }
    }

    fn on_procedure_completed(&mut self, handle: ConnectionHandle, status: u16) -> Result<()> {
        let Some(record) = self.table.get(handle) else {
            return Ok(());
        };
        if status != 0 {
            warn!(
                "GATT procedure on {} completed with status 0x{:04X}",
                handle, status
            );
        }

        let state = record.state;
        match state {
            DiscoveryState::DiscoveringServices => {
                let Some(service) = record.service_handle else {
                    debug!("No thermometer service on {} yet", handle);
                    return Ok(());
                };
                check(
                    "discover_characteristic_by_uuid",
                    self.stack.discover_characteristic_by_uuid(
                        handle,
                        service,
                        self.config.characteristic_uuid,
                    ),
                )?;
                self.set_state(handle, DiscoveryState::DiscoveringCharacteristics);
            }
            DiscoveryState::DiscoveringCharacteristics => {
                let Some(characteristic) = record.characteristic_handle else {
                    debug!("No measurement characteristic on {} yet", handle);
                    return Ok(());
                };
                // The scan may already be stopped; only the outcome matters
                let _ = self.stack.stop_scan();
                if self.scanner == ScanState::Scanning {
                    self.scanner = ScanState::Idle;
                }
                check(
                    "enable_indications",
                    self.stack.enable_indications(handle, characteristic),
                )?;
                self.set_state(handle, DiscoveryState::EnablingIndication);
            }
            DiscoveryState::EnablingIndication => {
                let peer = record.peer_short_address;
                self.set_state(handle, DiscoveryState::Running);
                info!("Indications enabled on {} ({:04x})", handle, peer);
                self.events.send(ClientEvent::Ready { handle, peer });

                if self.table.is_full() {
                    info!(
                        "All {} connection slots in use, not scanning",
                        self.table.capacity()
                    );
                } else if self.scanner == ScanState::Idle {
                    self.start_scan()?;
                }
            }
            DiscoveryState::Running
            | DiscoveryState::Idle
            | DiscoveryState::Scanning
            | DiscoveryState::Opening => {}
        }
        Ok(())
    }

    fn on_value(&mut self, handle: ConnectionHandle, value: &[u8]) -> Result<()> {
        let Some(record) = self.table.get_mut(handle) else {
            return Ok(());
        };
        let measurement = match TemperatureMeasurement::from_bytes(value) {
            Ok(measurement) => measurement,
            Err(e) => {
                warn!("Characteristic value on {} rejected: {}", handle, e);
                return Ok(());
            }
        };
        record.temperature = Some(measurement.value);
        record.unit = Some(measurement.unit);

        check("confirm_indication", self.stack.confirm_indication(handle))?;

        let rssi = match self.stack.request_rssi(handle) {
            Ok(rssi) => Some(rssi),
            Err(status) => {
                debug!("RSSI unavailable on {}: {}", handle, status);
                None
            }
        };
        if let Some(record) = self.table.get_mut(handle) {
            record.rssi = rssi;
        }

        self.events.send(ClientEvent::Measurement {
            handle,
            measurement,
            table: self.table.snapshot(),
        });
        Ok(())
    }

    fn on_tx_power(&mut self, handle: ConnectionHandle, local: Option<i8>, remote: Option<i8>) {
        let Some(record) = self.table.get_mut(handle) else {
            debug!("TX power report for unknown connection {}", handle);
            return;
        };
        if let Some(level) = local {
            record.tx_power = Some(level);
            record.power_control_active = true;
        }
        if let Some(level) = remote {
            record.remote_tx_power = Some(level);
        }
        let (local, remote) = (record.tx_power, record.remote_tx_power);
        self.events.send(ClientEvent::TxPower {
            handle,
            local,
            remote,
        });
    }

    fn start_scan(&mut self) -> Result<()> {
        check("start_scan", self.stack.start_scan())?;
        self.scanner = ScanState::Scanning;
        debug!("Scanning for thermometers");
        self.events.send(ClientEvent::ScanStarted);
        Ok(())
    }

    fn set_state(&mut self, handle: ConnectionHandle, state: DiscoveryState) {
        if let Some(record) = self.table.get_mut(handle) {
            debug!("{}: {} -> {}", handle, record.state, state);
            record.state = state;
        }
    }
}

fn check<T>(command: &'static str, result: StackResult<T>) -> Result<T> {
    result.map_err(|status| Error::stack(command, status))
}
