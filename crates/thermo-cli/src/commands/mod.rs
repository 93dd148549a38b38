//! Command implementations for the CLI.

mod config;
mod decode;
mod simulate;

pub use config::cmd_config;
pub use decode::{cmd_decode, parse_hex};
pub use simulate::cmd_simulate;
