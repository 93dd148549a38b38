//! Simulate command implementation.
//!
//! Drives the thermometer client against a simulated radio stack and prints
//! the connection table after every measurement. Typing `t` followed by Enter
//! toggles the TX power column.

use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use thermo_core::{
    ClientConfig, ClientEvent, EventReceiver, SimOptions, SimulatedStack, ThermometerClient, run,
};

use crate::cli::{OutputFormat, SimulateArgs};
use crate::config::{Config, resolve_simulate};
use crate::format::{StatusReporter, as_json_line};

pub async fn cmd_simulate(args: &SimulateArgs, config: &Config) -> Result<()> {
    let settings = resolve_simulate(args, config);

    let mut options = SimOptions::new()
        .peers(settings.peers)
        .interval(Duration::from_millis(settings.interval_ms))
        .tx_power(true)
        .drop_probability(settings.drop_rate);
    if let Some(seed) = settings.seed {
        options = options.seed(seed);
    }

    let client_config = ClientConfig::new().capacity(settings.capacity);
    let (stack, mut source) =
        SimulatedStack::new(options).context("Invalid simulation options")?;
    let mut client = ThermometerClient::with_config(stack, client_config)
        .context("Invalid client configuration")?;

    info!(
        "Simulating {} thermometers, up to {} connections",
        settings.peers, settings.capacity
    );

    let cancel = CancellationToken::new();
    let show_tx_power = Arc::new(AtomicBool::new(settings.show_tx_power));
    let live = io::stdout().is_terminal();

    let printer = spawn_printer(
        client.subscribe(),
        settings.format,
        Printer {
            show_tx_power: Arc::clone(&show_tx_power),
            live,
            count: settings.count,
            cancel: cancel.clone(),
        },
    );

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            ctrl_c.cancel();
        }
    });

    if settings.format == OutputFormat::Text {
        spawn_toggle_reader(Arc::clone(&show_tx_power));
    }

    let result = run(&mut client, &mut source, cancel.clone()).await;
    cancel.cancel();
    drop(client);

    if let Err(e) = printer.await {
        warn!("Printer task failed: {}", e);
    }
    if live && settings.format == OutputFormat::Text {
        println!();
    }

    result.context("Thermometer client stopped")
}

/// State shared with the printer task.
struct Printer {
    show_tx_power: Arc<AtomicBool>,
    live: bool,
    count: u64,
    cancel: CancellationToken,
}

fn spawn_printer(
    mut events: EventReceiver,
    format: OutputFormat,
    printer: Printer,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reporter =
            StatusReporter::new(printer.show_tx_power.load(Ordering::Relaxed), printer.live);
        let mut measurements = 0u64;

        loop {
            let event = tokio::select! {
                _ = printer.cancel.cancelled() => break,
                event = events.recv() => event,
            };
            let event = match event {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Output fell behind, skipped {} events", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let output = match format {
                OutputFormat::Json => match as_json_line(&event) {
                    Ok(line) => Some(line),
                    Err(e) => {
                        warn!("Failed to serialize event: {}", e);
                        None
                    }
                },
                OutputFormat::Text => {
                    reporter.set_show_tx_power(printer.show_tx_power.load(Ordering::Relaxed));
                    describe(&mut reporter, &event)
                }
            };

            if let Some(output) = output {
                let mut stdout = io::stdout().lock();
                if stdout
                    .write_all(output.as_bytes())
                    .and_then(|()| stdout.flush())
                    .is_err()
                {
                    printer.cancel.cancel();
                    break;
                }
            }

            if matches!(event, ClientEvent::Measurement { .. }) {
                measurements += 1;
                if printer.count > 0 && measurements >= printer.count {
                    info!("Received {} measurements", measurements);
                    printer.cancel.cancel();
                    break;
                }
            }
        }
    })
}

/// Text output for one event. Lifecycle events go to the log; only
/// measurements produce a status line.
fn describe(reporter: &mut StatusReporter, event: &ClientEvent) -> Option<String> {
    match event {
        ClientEvent::Booted {
            version,
            address,
            address_type,
        } => {
            info!("Stack {} booted, {} address {}", version, address_type, address);
            None
        }
        ClientEvent::Connecting { address, name, rssi } => {
            info!(
                "Connecting to {} ({}) at {} dBm",
                address,
                name.as_deref().unwrap_or("unnamed"),
                rssi
            );
            None
        }
        ClientEvent::Ready { peer, .. } => {
            info!("Thermometer {:04x} ready", peer);
            None
        }
        ClientEvent::Disconnected { peer, reason, .. } => {
            if let Some(peer) = peer {
                info!("Thermometer {:04x} disconnected (reason 0x{:04x})", peer, reason);
            }
            None
        }
        ClientEvent::Measurement { table, .. } => Some(reporter.render(table)),
        _ => None,
    }
}

/// Flip the TX power column whenever a line reading `t` arrives on stdin.
///
/// Runs on a plain thread: a blocked stdin read must not hold up runtime
/// shutdown. The thread ends with stdin or with the process.
fn spawn_toggle_reader(show_tx_power: Arc<AtomicBool>) {
    let spawned = thread::Builder::new()
        .name("thermo-stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().eq_ignore_ascii_case("t") {
                    show_tx_power.fetch_xor(true, Ordering::Relaxed);
                }
            }
        });
    if let Err(e) = spawned {
        warn!("Failed to start input reader: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thermo_core::{ConnectionHandle, ConnectionRecord};
    use thermo_types::{BdAddr, TemperatureMeasurement, TemperatureUnit};

    #[test]
    fn test_describe_measurement_renders_table() {
        let mut reporter = StatusReporter::new(false, false);
        let event = ClientEvent::Measurement {
            handle: ConnectionHandle(1),
            measurement: TemperatureMeasurement {
                unit: TemperatureUnit::Celsius,
                value: 36.5,
                timestamp: None,
                temperature_type: None,
            },
            table: vec![ConnectionRecord::default(); 2],
        };
        let output = describe(&mut reporter, &event).unwrap();
        assert!(output.starts_with("ADDR"));
    }

    #[test]
    fn test_describe_lifecycle_is_silent() {
        let mut reporter = StatusReporter::new(false, false);
        let event = ClientEvent::Connecting {
            address: BdAddr([1, 2, 3, 4, 5, 6]),
            name: None,
            rssi: -40,
        };
        assert!(describe(&mut reporter, &event).is_none());
    }

    #[tokio::test]
    async fn test_simulate_rejects_zero_interval() {
        let args = SimulateArgs {
            interval_ms: Some(0),
            ..SimulateArgs::default()
        };
        let err = cmd_simulate(&args, &Config::default()).await.unwrap_err();
        assert!(format!("{:#}", err).contains("interval"));
    }

    #[tokio::test]
    async fn test_simulate_rejects_too_many_peers() {
        let args = SimulateArgs {
            peers: Some(300),
            ..SimulateArgs::default()
        };
        assert!(cmd_simulate(&args, &Config::default()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulate_stops_after_count() {
        let args = SimulateArgs {
            peers: Some(2),
            capacity: Some(2),
            interval_ms: Some(100),
            count: 3,
            format: Some(OutputFormat::Json),
            ..SimulateArgs::default()
        };
        cmd_simulate(&args, &Config::default()).await.unwrap();
    }
}
