//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Fixed-width status line
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Parser)]
#[command(name = "thermo")]
#[command(author, version, about = "Monitor several BLE health thermometers at once", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect to simulated thermometers and stream their readings
    Simulate(SimulateArgs),

    /// Decode a Temperature Measurement value given as hex
    Decode {
        /// Characteristic value, e.g. "00 6c 01 00 ff"
        hex: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Manage CLI configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Arguments for the simulate command.
///
/// Every option left unset falls back to the configuration file.
#[derive(Debug, Clone, Default, Args)]
pub struct SimulateArgs {
    /// Number of virtual thermometers in range
    #[arg(short, long)]
    pub peers: Option<usize>,

    /// Maximum simultaneous connections (1-8)
    #[arg(short, long, env = "THERMO_CAPACITY")]
    pub capacity: Option<usize>,

    /// Show the TX power column (type "t" + Enter to toggle while running)
    #[arg(long)]
    pub tx_power: bool,

    /// Milliseconds between measurements
    #[arg(short, long)]
    pub interval_ms: Option<u64>,

    /// Stop after this many measurements (0 = run until Ctrl-C)
    #[arg(short = 'n', long, default_value = "0")]
    pub count: u64,

    /// Chance (0.0-1.0) that a link drops on each measurement round
    #[arg(long, default_value = "0")]
    pub drop_rate: f64,

    /// Seed for the simulated peers
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,
}

/// Configuration subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
