use std::io;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod format;

use cli::{Cli, Commands};
use commands::{cmd_config, cmd_decode, cmd_simulate};
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle completions command early (before tracing init)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "thermo", &mut io::stdout());
        return Ok(());
    }

    // Logs go to stderr so the status line and JSON output stay clean
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Simulate(args) => {
            let config = Config::load();
            cmd_simulate(&args, &config).await?;
        }
        Commands::Decode { hex, format } => cmd_decode(&hex, format)?,
        Commands::Config { action } => cmd_config(action)?,
        Commands::Completions { .. } => unreachable!("handled before tracing init"),
    }

    Ok(())
}
