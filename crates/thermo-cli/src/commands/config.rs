//! Config command implementation.

use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::cli::ConfigAction;
use crate::config::Config;

pub fn cmd_config(action: ConfigAction) -> Result<()> {
    let path = Config::path();
    match action {
        ConfigAction::Show => {
            let config = Config::load_from(&path);
            let content = toml::to_string_pretty(&config).context("Failed to serialize config")?;
            print!("{}", content);
        }
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Init { force } => {
            init_config(&path, force)?;
            println!("Wrote default configuration to {}", path.display());
        }
    }
    Ok(())
}

/// Write the default configuration to `path`.
fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "Config file already exists: {} (use --force to overwrite)",
            path.display()
        );
    }
    Config::default().save_to(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_creates_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thermo").join("config.toml");

        init_config(&path, false).unwrap();
        assert_eq!(Config::load_from(&path), Config::default());
    }

    #[test]
    fn test_init_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "capacity = 2\n").unwrap();

        let err = init_config(&path, false).unwrap_err();
        assert!(err.to_string().contains("--force"));
        assert_eq!(Config::load_from(&path).capacity, 2);

        init_config(&path, true).unwrap();
        assert_eq!(Config::load_from(&path), Config::default());
    }
}
