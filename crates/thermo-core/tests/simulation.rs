//! End-to-end runs against the simulated stack.
//!
//! Time is paused, so the measurement ticks advance instantly.

use std::time::Duration;

use thermo_core::{
    ClientConfig, ClientEvent, DiscoveryState, EventReceiver, SimOptions, SimulatedStack,
    ThermometerClient, run,
};
use tokio_util::sync::CancellationToken;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("thermo_core=debug")
        .with_test_writer()
        .try_init();
}

/// Cancel `cancel` once `count` measurements have been published.
fn stop_after(mut events: EventReceiver, count: usize, cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut seen = 0;
        while let Ok(event) = events.recv().await {
            if matches!(event, ClientEvent::Measurement { .. }) {
                seen += 1;
                if seen >= count {
                    break;
                }
            }
        }
        cancel.cancel();
    });
}

#[tokio::test(start_paused = true)]
async fn test_connects_every_peer_and_streams() {
    init_tracing();
    let options = SimOptions::new()
        .peers(3)
        .interval(Duration::from_millis(500));
    let (stack, mut source) = SimulatedStack::new(options).unwrap();
    let mut client =
        ThermometerClient::with_config(stack, ClientConfig::new().capacity(4)).unwrap();

    let cancel = CancellationToken::new();
    stop_after(client.subscribe(), 12, cancel.clone());
    run(&mut client, &mut source, cancel).await.unwrap();

    let table = client.table();
    assert_eq!(table.len(), 3);
    for record in table.iter() {
        assert_eq!(record.state, DiscoveryState::Running);
        assert!(record.temperature.is_some());
        assert!(record.rssi.is_some());
    }
    // Below capacity, so the client keeps scanning for more thermometers
    assert_eq!(client.phase(), DiscoveryState::Scanning);
    assert!(client.stack().is_scanning());
}

#[tokio::test(start_paused = true)]
async fn test_more_peers_than_slots() {
    init_tracing();
    let (stack, mut source) = SimulatedStack::new(SimOptions::new().peers(5)).unwrap();
    let mut client =
        ThermometerClient::with_config(stack, ClientConfig::new().capacity(2)).unwrap();

    let cancel = CancellationToken::new();
    stop_after(client.subscribe(), 10, cancel.clone());
    run(&mut client, &mut source, cancel).await.unwrap();

    assert!(client.table().is_full());
    assert_eq!(client.phase(), DiscoveryState::Running);
    assert_eq!(client.stack().link_count(), 2);
    assert!(!client.stack().is_scanning());
}

#[tokio::test(start_paused = true)]
async fn test_tx_power_reported() {
    init_tracing();
    let (stack, mut source) = SimulatedStack::new(SimOptions::new().peers(2).tx_power(true)).unwrap();
    let mut client = ThermometerClient::new(stack);

    let cancel = CancellationToken::new();
    stop_after(client.subscribe(), 4, cancel.clone());
    run(&mut client, &mut source, cancel).await.unwrap();

    for record in client.table().iter() {
        assert!(record.power_control_active);
        assert!(record.tx_power.is_some());
        assert!(record.remote_tx_power.is_some());
    }
}

#[tokio::test(start_paused = true)]
async fn test_recovers_from_dropped_links() {
    init_tracing();
    let options = SimOptions::new()
        .peers(2)
        .drop_probability(0.2)
        .seed(7);
    let (stack, mut source) = SimulatedStack::new(options).unwrap();
    let mut client =
        ThermometerClient::with_config(stack, ClientConfig::new().capacity(2)).unwrap();

    let mut events = client.subscribe();
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let (mut drops, mut measurements) = (0, 0);
            while let Ok(event) = events.recv().await {
                match event {
                    ClientEvent::Disconnected { .. } => drops += 1,
                    ClientEvent::Measurement { .. } => measurements += 1,
                    _ => {}
                }
                if measurements >= 40 {
                    break;
                }
            }
            cancel.cancel();
            drops
        })
    };

    run(&mut client, &mut source, cancel).await.unwrap();
    let drops = watcher.await.unwrap();

    assert!(drops > 0, "expected at least one simulated link drop");
    assert!(client.table().len() <= 2);
    assert_eq!(client.table().len(), client.stack().link_count());
}

#[tokio::test(start_paused = true)]
async fn test_default_connection_parameters_applied() {
    let (stack, mut source) = SimulatedStack::new(SimOptions::new().peers(1)).unwrap();
    let mut client = ThermometerClient::new(stack);

    let cancel = CancellationToken::new();
    stop_after(client.subscribe(), 1, cancel.clone());
    run(&mut client, &mut source, cancel).await.unwrap();

    let params = client.stack().connection_parameters().unwrap();
    assert_eq!(params.interval_min, 80);
    assert_eq!(params.timeout, 100);
}
