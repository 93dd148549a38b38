//! Multi-peer BLE Health Thermometer client.
//!
//! This crate connects to several Health Thermometer peripherals at once
//! and streams their measurements. It sits on top of a BLE stack in the
//! central role, described by the [`BleStack`] command trait and an
//! [`EventSource`] of [`StackEvent`]s.
//!
//! # Features
//!
//! - **Discovery state machine**: each connection walks through service
//!   discovery, characteristic discovery and indication enablement on its own
//! - **Connection table**: fixed capacity, order-preserving slot reclamation
//! - **Advertisement filter**: bounds-safe AD structure parsing
//! - **Client events**: measurements and link changes over a broadcast channel
//! - **Testing**: a scripted [`MockStack`] and a [`SimulatedStack`] with
//!   virtual thermometers
//!
//! # Quick Start
//!
//! ```no_run
//! use thermo_core::{run, ClientConfig, SimOptions, SimulatedStack, ThermometerClient};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (stack, mut events) = SimulatedStack::new(SimOptions::new().peers(3))?;
//!     let mut client = ThermometerClient::with_config(stack, ClientConfig::new().capacity(3))?;
//!
//!     let mut updates = client.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = updates.recv().await {
//!             println!("{event:?}");
//!         }
//!     });
//!
//!     run(&mut client, &mut events, CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```

pub mod advertisement;
pub mod client;
pub mod commands;
pub mod error;
pub mod events;
pub mod mock;
pub mod runner;
pub mod sim;
pub mod table;
pub mod traits;

// Re-export the data types crate
pub use thermo_types as types;

// Core exports
pub use advertisement::{AdStructures, contains_service_uuid, local_name};
pub use client::{ClientConfig, DEFAULT_CAPACITY, MAX_CAPACITY, ScanState, ThermometerClient};
pub use commands::{ConnectionParameters, StackCommand};
pub use error::{Error, Result, StackStatus};
pub use events::{
    AdvertisementFlags, ClientEvent, EventDispatcher, EventReceiver, EventSender, StackEvent,
    StackVersion, event_channel,
};
pub use mock::MockStack;
pub use runner::run;
pub use sim::{MAX_SIM_PEERS, SimOptions, SimulatedEvents, SimulatedStack};
pub use table::{ConnectionHandle, ConnectionRecord, ConnectionTable, DiscoveryState, TableError};
pub use traits::{BleStack, EventSource, StackResult};
