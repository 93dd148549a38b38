//! Output formatting for the status line, JSON events and decoded values.

use std::fmt::Write as _;

use anyhow::Result;
use serde::Serialize;

use thermo_core::ConnectionRecord;
use thermo_types::TemperatureMeasurement;

/// Header cell without the TX power column.
const HEADER_CELL: &str = "ADDR   TEMP   RSSI |";

/// Header cell with the TX power column.
const HEADER_CELL_TX: &str = "ADDR   TEMP   RSSI    TXPW |";

/// Placeholder for a slot without a reading.
const EMPTY_CELL: &str = "---- ------- ------|";

/// Placeholder for a slot without a reading, TX power column shown.
const EMPTY_CELL_TX: &str = "----  ------ ------  ------|";

/// Temperatures are clamped to this range so they fit the 6-wide field.
const TEMPERATURE_RANGE: (f32, f32) = (-999.9, 9999.9);

/// Renders the connection table as a fixed-width status line.
///
/// A header is emitted before the first line and again whenever the TX
/// power column is switched on or off.
#[derive(Debug, Clone)]
pub struct StatusReporter {
    show_tx_power: bool,
    header_for: Option<bool>,
    live: bool,
}

impl StatusReporter {
    /// Create a reporter. `live` status lines end in a carriage return so
    /// each one overwrites the previous one on a terminal.
    pub fn new(show_tx_power: bool, live: bool) -> Self {
        Self {
            show_tx_power,
            header_for: None,
            live,
        }
    }

    /// Whether the TX power column is shown.
    pub fn show_tx_power(&self) -> bool {
        self.show_tx_power
    }

    /// Show or hide the TX power column.
    pub fn set_show_tx_power(&mut self, show: bool) {
        self.show_tx_power = show;
    }

    /// Render one status update, preceded by a header when needed.
    pub fn render(&mut self, slots: &[ConnectionRecord]) -> String {
        let mut out = String::new();
        if self.header_for != Some(self.show_tx_power) {
            if self.live && self.header_for.is_some() {
                out.push('\n');
            }
            let cell = if self.show_tx_power {
                HEADER_CELL_TX
            } else {
                HEADER_CELL
            };
            out.push_str(&cell.repeat(slots.len()));
            out.push('\n');
            self.header_for = Some(self.show_tx_power);
        }

        for record in slots {
            out.push_str(&format_cell(record, self.show_tx_power));
        }
        out.push(if self.live { '\r' } else { '\n' });
        out
    }
}

/// Format one table slot.
pub fn format_cell(record: &ConnectionRecord, show_tx_power: bool) -> String {
    let Some(temperature) = record.temperature else {
        return if show_tx_power { EMPTY_CELL_TX } else { EMPTY_CELL }.to_string();
    };

    let unit = record.unit.map_or('?', |unit| unit.symbol());
    let rssi = match record.rssi {
        Some(rssi) => format!("{:>3}", rssi),
        None => "---".to_string(),
    };

    let (min, max) = TEMPERATURE_RANGE;
    let mut cell = format!(
        "{:04x} {:6.1}{} {}dBm",
        record.peer_short_address,
        temperature.clamp(min, max),
        unit,
        rssi
    );
    if show_tx_power {
        let tx = match record.tx_power {
            Some(level) => format!("{:>4}", level),
            None => " ---".to_string(),
        };
        let _ = write!(cell, " {}dBm", tx);
    }
    cell.push('|');
    cell
}

/// Serialize a value as one compact JSON line.
pub fn as_json_line<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)? + "\n")
}

/// Human-readable description of a decoded measurement.
pub fn format_measurement_text(measurement: &TemperatureMeasurement) -> String {
    let mut out = format!(
        "Temperature: {:.2} {}\n",
        measurement.value, measurement.unit
    );
    if let Some(timestamp) = measurement.timestamp {
        let _ = writeln!(out, "Timestamp:   {}", timestamp);
    }
    if let Some(kind) = measurement.temperature_type {
        let _ = writeln!(out, "Type:        {:?}", kind);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use thermo_core::{ConnectionHandle, DiscoveryState};
    use thermo_types::TemperatureUnit;

    fn reading(peer: u16, temperature: f32, rssi: Option<i8>) -> ConnectionRecord {
        ConnectionRecord {
            handle: Some(ConnectionHandle(1)),
            peer_short_address: peer,
            temperature: Some(temperature),
            unit: Some(TemperatureUnit::Celsius),
            rssi,
            state: DiscoveryState::Running,
            ..ConnectionRecord::default()
        }
    }

    // ========================================================================
    // Cell tests
    // ========================================================================

    #[test]
    fn test_cell_with_reading() {
        let cell = format_cell(&reading(0xbeef, 36.44, Some(-61)), false);
        assert_eq!(cell, "beef   36.4C -61dBm|");
        assert_eq!(cell.len(), HEADER_CELL.len());
    }

    #[test]
    fn test_cell_without_rssi() {
        let cell = format_cell(&reading(0x0a0b, 98.6, None), false);
        assert_eq!(cell, "0a0b   98.6C ---dBm|");
    }

    #[test]
    fn test_cell_with_tx_power() {
        let mut record = reading(0x1234, 37.0, Some(-5));
        record.tx_power = Some(8);
        let cell = format_cell(&record, true);
        assert_eq!(cell, "1234   37.0C  -5dBm    8dBm|");
        assert_eq!(cell.len(), HEADER_CELL_TX.len());
    }

    #[test]
    fn test_empty_cells_match_header_width() {
        let empty = ConnectionRecord::default();
        assert_eq!(format_cell(&empty, false), EMPTY_CELL);
        assert_eq!(format_cell(&empty, true), EMPTY_CELL_TX);
        assert_eq!(EMPTY_CELL.len(), HEADER_CELL.len());
        assert_eq!(EMPTY_CELL_TX.len(), HEADER_CELL_TX.len());
    }

    #[test]
    fn test_out_of_range_temperature_keeps_width() {
        for temperature in [10000.0, 123456.7, -1000.0, -99999.0, f32::INFINITY, f32::NEG_INFINITY] {
            let cell = format_cell(&reading(0x0001, temperature, Some(-40)), false);
            assert_eq!(cell.len(), HEADER_CELL.len(), "{}", cell);
        }
        let cell = format_cell(&reading(0x0001, 10000.0, Some(-40)), false);
        assert_eq!(cell, "0001 9999.9C -40dBm|");
        let cell = format_cell(&reading(0x0001, -1000.0, Some(-40)), false);
        assert_eq!(cell, "0001 -999.9C -40dBm|");
    }

    #[test]
    fn test_nan_keeps_width() {
        let cell = format_cell(&reading(0x0001, f32::NAN, Some(-40)), false);
        assert_eq!(cell.len(), HEADER_CELL.len());
    }

    // ========================================================================
    // Reporter tests
    // ========================================================================

    #[test]
    fn test_header_only_once() {
        let mut reporter = StatusReporter::new(false, false);
        let slots = vec![reading(0x0001, 36.6, Some(-50)), ConnectionRecord::default()];

        let first = reporter.render(&slots);
        let second = reporter.render(&slots);
        assert!(first.starts_with(&HEADER_CELL.repeat(2)));
        assert!(!second.contains("ADDR"));
        assert!(second.ends_with("|\n"));
    }

    #[test]
    fn test_header_reemitted_on_toggle() {
        let mut reporter = StatusReporter::new(false, false);
        let slots = vec![reading(0x0001, 36.6, Some(-50))];
        reporter.render(&slots);

        reporter.set_show_tx_power(true);
        let toggled = reporter.render(&slots);
        assert!(toggled.starts_with(HEADER_CELL_TX));
        assert!(reporter.show_tx_power());

        reporter.set_show_tx_power(false);
        assert!(reporter.render(&slots).starts_with(HEADER_CELL));
    }

    #[test]
    fn test_live_line_ends_with_carriage_return() {
        let mut reporter = StatusReporter::new(false, true);
        let line = reporter.render(&[ConnectionRecord::default()]);
        assert!(line.ends_with("|\r"));
    }

    #[test]
    fn test_measurement_text() {
        let measurement =
            TemperatureMeasurement::from_bytes(&[0x00, 0x6C, 0x01, 0x00, 0xFF]).unwrap();
        assert_eq!(format_measurement_text(&measurement), "Temperature: 36.40 Celsius\n");
    }
}
