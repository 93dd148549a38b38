//! Simulated BLE stack with virtual thermometers.
//!
//! [`SimulatedStack`] answers the client's commands the way a real stack
//! and a set of Health Thermometer peripherals would: advertisements while
//! scanning, connection and discovery events after the matching commands,
//! and a measurement indication from every subscribed peer on each tick.
//!
//! The stack half and the event half share one world behind a mutex. The
//! client owns the [`SimulatedStack`]; the event loop owns the
//! [`SimulatedEvents`] source.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::debug;

use thermo_types::uuids::{
    AD_TYPE_COMPLETE_NAME, AD_TYPE_COMPLETE_UUID16, HEALTH_THERMOMETER_SERVICE,
    TEMPERATURE_MEASUREMENT,
};
use thermo_types::{AddressType, BdAddr, Ieee11073Float, TemperatureMeasurement, TemperatureUnit};

use crate::commands::ConnectionParameters;
use crate::error::{Error, Result, StackStatus};
use crate::events::{AdvertisementFlags, StackEvent, StackVersion};
use crate::table::ConnectionHandle;
use crate::traits::{BleStack, EventSource, StackResult};

/// Characteristic handle every virtual peer exposes its measurement on.
const MEASUREMENT_HANDLE: u16 = 0x000C;

/// ATT "attribute not found", reported when discovery has nothing to return.
const ATT_ATTRIBUTE_NOT_FOUND: u16 = 0x040A;

/// Largest number of virtual thermometers a simulator can host.
pub const MAX_SIM_PEERS: usize = 256;

/// First peer id; ids fill address bytes 1 and 2.
const FIRST_PEER_ID: u16 = 0x0010;

/// Supervision timeout, used as the close reason for dropped links.
const REASON_SUPERVISION_TIMEOUT: u16 = 0x0208;

/// Options for the simulated stack.
#[derive(Debug, Clone)]
pub struct SimOptions {
    /// Number of virtual thermometers in range.
    pub peers: usize,
    /// Time between measurement rounds.
    pub interval: Duration,
    /// Report local and remote TX power once indications are enabled.
    pub tx_power: bool,
    /// Chance that a streaming link drops on each tick.
    pub drop_probability: f64,
    /// Seed for the random number generator.
    pub seed: u64,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            peers: 4,
            interval: Duration::from_secs(1),
            tx_power: false,
            drop_probability: 0.0,
            seed: 0x5EED,
        }
    }
}

impl SimOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of virtual thermometers.
    pub fn peers(mut self, peers: usize) -> Self {
        self.peers = peers;
        self
    }

    /// Set the measurement interval.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Enable TX power reports.
    pub fn tx_power(mut self, enabled: bool) -> Self {
        self.tx_power = enabled;
        self
    }

    /// Set the per-tick link drop probability.
    pub fn drop_probability(mut self, probability: f64) -> Self {
        self.drop_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Set the random seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Validate the options and return an error if invalid.
    ///
    /// Checks that:
    /// - `peers` is at most [`MAX_SIM_PEERS`]
    /// - `interval` is non-zero
    pub fn validate(&self) -> Result<()> {
        if self.peers > MAX_SIM_PEERS {
            return Err(Error::invalid_config(format!(
                "peers must be at most {MAX_SIM_PEERS}, got {}",
                self.peers
            )));
        }
        if self.interval.is_zero() {
            return Err(Error::invalid_config("interval must be > 0"));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct VirtualPeer {
    address: BdAddr,
    name: String,
    unit: TemperatureUnit,
    /// Current temperature in tenths of `unit`.
    tenths: i32,
    rssi: i8,
    connection: Option<ConnectionHandle>,
}

#[derive(Debug)]
struct Link {
    peer: usize,
    subscribed: bool,
}

#[derive(Debug)]
struct World {
    options: SimOptions,
    rng: StdRng,
    peers: Vec<VirtualPeer>,
    links: BTreeMap<ConnectionHandle, Link>,
    queue: VecDeque<StackEvent>,
    scanning: bool,
    next_handle: u8,
    params: Option<ConnectionParameters>,
}

impl World {
    fn new(options: SimOptions) -> Self {
        let mut rng = StdRng::seed_from_u64(options.seed);
        let peers = (0..options.peers)
            .zip(FIRST_PEER_ID..)
            .map(|(index, id)| {
                let unit = if index % 3 == 2 {
                    TemperatureUnit::Fahrenheit
                } else {
                    TemperatureUnit::Celsius
                };
                let celsius_tenths = rng.random_range(360..=375);
                let tenths = match unit {
                    TemperatureUnit::Celsius => celsius_tenths,
                    TemperatureUnit::Fahrenheit => celsius_tenths * 9 / 5 + 320,
                };
                let low = rng.random::<u8>();
                let [id_lo, id_hi] = id.to_le_bytes();
                VirtualPeer {
                    address: BdAddr([low, id_lo, id_hi, 0x4D, 0x3C, 0x00]),
                    name: format!("Thermo-{:04X}", id),
                    unit,
                    tenths,
                    rssi: rng.random_range(-80..=-45),
                    connection: None,
                }
            })
            .collect();

        let mut queue = VecDeque::new();
        queue.push_back(StackEvent::SystemBooted {
            version: StackVersion {
                major: 8,
                minor: 1,
                patch: 0,
                build: 117,
            },
        });

        Self {
            options,
            rng,
            peers,
            links: BTreeMap::new(),
            queue,
            scanning: false,
            next_handle: 1,
            params: None,
        }
    }

    fn link(&self, handle: ConnectionHandle) -> StackResult<&Link> {
        self.links.get(&handle).ok_or(StackStatus::InvalidHandle)
    }

    fn allocate_handle(&mut self) -> ConnectionHandle {
        loop {
            let handle = ConnectionHandle(self.next_handle);
            self.next_handle = self.next_handle.checked_add(1).unwrap_or(1);
            if !self.links.contains_key(&handle) {
                return handle;
            }
        }
    }

    fn advertise(&mut self) {
        for peer in self.peers.iter().filter(|p| p.connection.is_none()) {
            let mut payload = vec![0x02, 0x01, 0x06, 0x03, AD_TYPE_COMPLETE_UUID16];
            payload.extend_from_slice(&HEALTH_THERMOMETER_SERVICE.to_le_bytes());
            payload.push(peer.name.len() as u8 + 1);
            payload.push(AD_TYPE_COMPLETE_NAME);
            payload.extend_from_slice(peer.name.as_bytes());

            self.queue.push_back(StackEvent::AdvertisementReport {
                address: peer.address,
                address_type: AddressType::Public,
                flags: AdvertisementFlags::connectable_scannable(),
                rssi: peer.rssi,
                payload,
            });
        }
    }

    fn drop_link(&mut self, handle: ConnectionHandle, reason: u16) {
        if let Some(link) = self.links.remove(&handle) {
            if let Some(peer) = self.peers.get_mut(link.peer) {
                peer.connection = None;
            }
            self.queue
                .push_back(StackEvent::ConnectionClosed { handle, reason });
        }
    }

    fn tick(&mut self) {
        let streaming: Vec<(ConnectionHandle, usize)> = self
            .links
            .iter()
            .filter(|(_, link)| link.subscribed)
            .map(|(handle, link)| (*handle, link.peer))
            .collect();

        for (handle, index) in streaming {
            if self.options.drop_probability > 0.0
                && self.rng.random_bool(self.options.drop_probability)
            {
                debug!("Simulated link {} dropped", handle);
                self.drop_link(handle, REASON_SUPERVISION_TIMEOUT);
                continue;
            }
            let step = self.rng.random_range(-2..=2);
            let Some(peer) = self.peers.get_mut(index) else {
                continue;
            };
            peer.tenths += step;
            let value = Ieee11073Float::from_parts(peer.tenths, -1).unwrap_or(Ieee11073Float::NAN);
            self.queue.push_back(StackEvent::CharacteristicValueReceived {
                handle,
                characteristic: MEASUREMENT_HANDLE,
                value: TemperatureMeasurement::encode(peer.unit, value).to_vec(),
            });
        }

        if self.scanning {
            self.advertise();
        }
    }

    fn complete(&mut self, handle: ConnectionHandle, status: u16) {
        self.queue
            .push_back(StackEvent::ProcedureCompleted { handle, status });
    }
}

fn lock(world: &Mutex<World>) -> MutexGuard<'_, World> {
    world.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Command half of the simulator.
#[derive(Debug, Clone)]
pub struct SimulatedStack {
    world: Arc<Mutex<World>>,
}

/// Event half of the simulator.
#[derive(Debug)]
pub struct SimulatedEvents {
    world: Arc<Mutex<World>>,
    period: Duration,
    interval: Option<Interval>,
}

impl SimulatedStack {
    /// Create a simulator. The first event it delivers is the boot event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `options` fail
    /// [`SimOptions::validate`].
    pub fn new(options: SimOptions) -> Result<(Self, SimulatedEvents)> {
        options.validate()?;
        let period = options.interval;
        let world = Arc::new(Mutex::new(World::new(options)));
        Ok((
            Self {
                world: Arc::clone(&world),
            },
            SimulatedEvents {
                world,
                period,
                interval: None,
            },
        ))
    }

    /// Addresses of the virtual peers.
    pub fn peer_addresses(&self) -> Vec<BdAddr> {
        lock(&self.world).peers.iter().map(|p| p.address).collect()
    }

    /// Whether the simulated controller is scanning.
    pub fn is_scanning(&self) -> bool {
        lock(&self.world).scanning
    }

    /// Number of open links.
    pub fn link_count(&self) -> usize {
        lock(&self.world).links.len()
    }

    /// Connection parameters set by the client, if any.
    pub fn connection_parameters(&self) -> Option<ConnectionParameters> {
        lock(&self.world).params
    }

    /// Close a link as if the peer went out of range.
    pub fn disconnect(&self, handle: ConnectionHandle) {
        lock(&self.world).drop_link(handle, REASON_SUPERVISION_TIMEOUT);
    }
}

impl BleStack for SimulatedStack {
    fn identity_address(&mut self) -> StackResult<(BdAddr, AddressType)> {
        Ok((
            BdAddr([0x01, 0xEF, 0xCD, 0xAB, 0x90, 0x78]),
            AddressType::Public,
        ))
    }

    fn set_default_connection_parameters(&mut self, params: &ConnectionParameters) -> StackResult {
        lock(&self.world).params = Some(*params);
        Ok(())
    }

    fn start_scan(&mut self) -> StackResult {
        let mut world = lock(&self.world);
        if !world.scanning {
            world.scanning = true;
            world.advertise();
        }
        Ok(())
    }

    fn stop_scan(&mut self) -> StackResult {
        lock(&self.world).scanning = false;
        Ok(())
    }

    fn open_connection(&mut self, address: BdAddr, _address_type: AddressType) -> StackResult {
        let mut world = lock(&self.world);
        let index = world
            .peers
            .iter()
            .position(|p| p.address == address && p.connection.is_none())
            .ok_or(StackStatus::InvalidParameter)?;

        let handle = world.allocate_handle();
        world.peers[index].connection = Some(handle);
        world.links.insert(
            handle,
            Link {
                peer: index,
                subscribed: false,
            },
        );
        world.queue.push_back(StackEvent::ConnectionOpened {
            handle,
            address,
            address_type: AddressType::Public,
        });
        Ok(())
    }

    fn discover_service_by_uuid(&mut self, handle: ConnectionHandle, uuid: u16) -> StackResult {
        let mut world = lock(&self.world);
        world.link(handle)?;
        if uuid == HEALTH_THERMOMETER_SERVICE {
            let service = 0x0001_0000 | u32::from(handle.0);
            world
                .queue
                .push_back(StackEvent::ServiceFound { handle, service });
            world.complete(handle, 0);
        } else {
            world.complete(handle, ATT_ATTRIBUTE_NOT_FOUND);
        }
        Ok(())
    }

    fn discover_characteristic_by_uuid(
        &mut self,
        handle: ConnectionHandle,
        _service: u32,
        uuid: u16,
    ) -> StackResult {
        let mut world = lock(&self.world);
        world.link(handle)?;
        if uuid == TEMPERATURE_MEASUREMENT {
            world.queue.push_back(StackEvent::CharacteristicFound {
                handle,
                characteristic: MEASUREMENT_HANDLE,
            });
            world.complete(handle, 0);
        } else {
            world.complete(handle, ATT_ATTRIBUTE_NOT_FOUND);
        }
        Ok(())
    }

    fn enable_indications(
        &mut self,
        handle: ConnectionHandle,
        characteristic: u16,
    ) -> StackResult {
        let mut world = lock(&self.world);
        if characteristic != MEASUREMENT_HANDLE {
            return Err(StackStatus::InvalidParameter);
        }
        let tx_power = world.options.tx_power;
        let link = world
            .links
            .get_mut(&handle)
            .ok_or(StackStatus::InvalidHandle)?;
        link.subscribed = true;
        world.complete(handle, 0);

        if tx_power {
            let local = world.rng.random_range(-4..=8);
            let remote = world.rng.random_range(-8..=4);
            world
                .queue
                .push_back(StackEvent::TxPowerReported { handle, level: local });
            world.queue.push_back(StackEvent::RemoteTxPowerReported {
                handle,
                level: remote,
            });
        }
        Ok(())
    }

    fn confirm_indication(&mut self, handle: ConnectionHandle) -> StackResult {
        lock(&self.world).link(handle).map(|_| ())
    }

    fn request_rssi(&mut self, handle: ConnectionHandle) -> StackResult<i8> {
        let mut world = lock(&self.world);
        let index = world.link(handle)?.peer;
        let jitter = world.rng.random_range(-3..=3);
        let base = world.peers.get(index).map_or(-70, |p| p.rssi);
        Ok(base.saturating_add(jitter))
    }
}

#[async_trait]
impl EventSource for SimulatedEvents {
    async fn next_event(&mut self) -> Option<StackEvent> {
        loop {
            let queued = lock(&self.world).queue.pop_front();
            if queued.is_some() {
                return queued;
            }
            let period = self.period;
            let interval = self.interval.get_or_insert_with(|| {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                interval
            });
            interval.tick().await;
            lock(&self.world).tick();
        }
    }
}
