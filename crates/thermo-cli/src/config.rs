//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use thermo_core::DEFAULT_CAPACITY;

use crate::cli::{OutputFormat, SimulateArgs};

/// Default number of simulated thermometers.
const DEFAULT_PEERS: usize = 4;

/// Default time between simulated measurements.
const DEFAULT_INTERVAL_MS: u64 = 1000;

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Maximum simultaneous connections
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Show the TX power column
    #[serde(default)]
    pub show_tx_power: bool,

    /// Number of simulated thermometers
    #[serde(default = "default_peers")]
    pub peers: usize,

    /// Milliseconds between simulated measurements
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Default output format
    #[serde(default)]
    pub format: OutputFormat,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_peers() -> usize {
    DEFAULT_PEERS
}

fn default_interval_ms() -> u64 {
    DEFAULT_INTERVAL_MS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            show_tx_power: false,
            peers: DEFAULT_PEERS,
            interval_ms: DEFAULT_INTERVAL_MS,
            format: OutputFormat::Text,
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("thermo")
            .join("config.toml")
    }

    /// Load config from the default path, or return defaults if not found
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load config from `path`, or return defaults if it is missing or invalid
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => return config,
                Err(e) => warn!("Failed to parse config {}: {}", path.display(), e),
            },
            Err(e) => warn!("Failed to read config {}: {}", path.display(), e),
        }
        Self::default()
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path())
    }

    /// Save config to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }
}

/// Simulation settings after merging flags over the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSimulate {
    pub peers: usize,
    pub capacity: usize,
    pub show_tx_power: bool,
    pub interval_ms: u64,
    pub count: u64,
    pub drop_rate: f64,
    pub seed: Option<u64>,
    pub format: OutputFormat,
}

/// Resolve simulate options: explicit flags override config
pub fn resolve_simulate(args: &SimulateArgs, config: &Config) -> ResolvedSimulate {
    ResolvedSimulate {
        peers: args.peers.unwrap_or(config.peers),
        capacity: args.capacity.unwrap_or(config.capacity),
        show_tx_power: args.tx_power || config.show_tx_power,
        interval_ms: args.interval_ms.unwrap_or(config.interval_ms),
        count: args.count,
        drop_rate: args.drop_rate,
        seed: args.seed,
        format: args.format.unwrap_or(config.format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: Config = toml::from_str("capacity = 2\n").unwrap();
        assert_eq!(config.capacity, 2);
        assert_eq!(config.peers, DEFAULT_PEERS);
        assert_eq!(config.interval_ms, DEFAULT_INTERVAL_MS);
        assert_eq!(config.format, OutputFormat::Text);
        assert!(!config.show_tx_power);
    }

    #[test]
    fn test_format_parses_lowercase() {
        let config: Config = toml::from_str("format = \"json\"\n").unwrap();
        assert_eq!(config.format, OutputFormat::Json);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            capacity: 6,
            show_tx_power: true,
            ..Config::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "capacity = \"lots\"").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            Config::load_from(&dir.path().join("absent.toml")),
            Config::default()
        );
    }

    #[test]
    fn test_resolve_simulate_prefers_flags() {
        let config = Config {
            capacity: 2,
            peers: 3,
            interval_ms: 250,
            format: OutputFormat::Json,
            ..Config::default()
        };
        let args = SimulateArgs {
            capacity: Some(5),
            format: Some(OutputFormat::Text),
            ..SimulateArgs::default()
        };

        let resolved = resolve_simulate(&args, &config);
        assert_eq!(resolved.capacity, 5);
        assert_eq!(resolved.peers, 3);
        assert_eq!(resolved.interval_ms, 250);
        assert_eq!(resolved.format, OutputFormat::Text);
    }

    #[test]
    fn test_resolve_simulate_tx_power_from_either() {
        let config = Config {
            show_tx_power: true,
            ..Config::default()
        };
        let resolved = resolve_simulate(&SimulateArgs::default(), &config);
        assert!(resolved.show_tx_power);
    }
}
