//! Decode command implementation.

use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use thermo_types::TemperatureMeasurement;

use crate::cli::OutputFormat;
use crate::format::{as_json_line, format_measurement_text};

/// Parse a hex string into bytes. Spaces, colons and dashes between
/// digits are ignored, as is a leading `0x`.
pub fn parse_hex(input: &str) -> Result<Vec<u8>> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: String = trimmed
        .chars()
        .filter(|c| !matches!(c, ' ' | ':' | '-'))
        .collect();

    if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
        bail!("Invalid hex digit '{}'", bad);
    }
    if digits.len() % 2 != 0 {
        bail!("Hex input has an odd number of digits: {}", digits.len());
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            let pair = &digits[i..i + 2];
            u8::from_str_radix(pair, 16).with_context(|| format!("Invalid hex byte '{}'", pair))
        })
        .collect()
}

pub fn cmd_decode(hex: &str, format: OutputFormat) -> Result<()> {
    let bytes = parse_hex(hex)?;
    let measurement = TemperatureMeasurement::from_bytes(&bytes)
        .context("Failed to decode temperature measurement")?;

    let output = match format {
        OutputFormat::Text => format_measurement_text(&measurement),
        OutputFormat::Json => as_json_line(&measurement)?,
    };

    let mut stdout = io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_plain() {
        assert_eq!(parse_hex("006c0100ff").unwrap(), vec![0x00, 0x6c, 0x01, 0x00, 0xff]);
    }

    #[test]
    fn test_parse_hex_separators() {
        assert_eq!(parse_hex("0x00:6C 01-00 FF").unwrap(), vec![0x00, 0x6c, 0x01, 0x00, 0xff]);
    }

    #[test]
    fn test_parse_hex_odd_length() {
        assert!(parse_hex("abc").is_err());
    }

    #[test]
    fn test_parse_hex_invalid_digit() {
        let err = parse_hex("zz").unwrap_err();
        assert!(err.to_string().contains('z'));
    }

    #[test]
    fn test_parse_hex_non_ascii_is_rejected() {
        assert!(parse_hex("aé0").is_err());
    }

    #[test]
    fn test_decode_short_value_fails() {
        assert!(cmd_decode("00 6c 01 00", OutputFormat::Text).is_err());
    }
}
