mod cli;
mod display;
mod error;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, RunCommand};
use forestpanel::config::Config;
use log::debug;

const DEFAULT_LOGGING_LEVEL: &str = "warn";

fn main() -> Result<()> {
    // Set RUST_LOG to `DEFAULT_LOGGING_LEVEL` if not set
    let _ =
        std::env::var("RUST_LOG").map_err(|_| std::env::set_var("RUST_LOG", DEFAULT_LOGGING_LEVEL));
    pretty_env_logger::init_timed();
    let args = Cli::parse();
    debug!("args: {args:?}");
    let config = read_config_from_toml(args.config.as_deref())?;
    debug!("config: {config:?}");

    if let Some(command) = args.command {
        command.run(config)?;
    }
    Ok(())
}

/// Linux: ~/.config/forestpanel/config.toml
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("forestpanel").join("config.toml"))
}

/// Reads the config from `path`, or from the default location when no path is given. Only a
/// missing default file falls back to the default config.
fn read_config_from_toml(path: Option<&Path>) -> Result<Config> {
    let (file_path, explicit) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => match default_config_path() {
            Some(path) => (path, false),
            None => return Ok(Config::default()),
        },
    };
    match std::fs::read_to_string(&file_path) {
        Ok(contents) => toml::from_str(&contents)
            .with_context(|| format!("Invalid TOML in config file '{}'", file_path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => Ok(Config::default()),
        Err(e) => Err(e)
            .with_context(|| format!("Error reading config file '{}'", file_path.display())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn explicit_config_is_read() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "year = 2015\nprune_empty_columns = true")?;
        let config = read_config_from_toml(Some(file.path()))?;
        assert_eq!(config.year, Some(2015));
        assert!(config.prune_empty_columns);
        Ok(())
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        assert!(read_config_from_toml(Some(Path::new("no/such/config.toml"))).is_err());
    }

    #[test]
    fn invalid_toml_is_an_error() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "year = \"last year\"")?;
        assert!(read_config_from_toml(Some(file.path())).is_err());
        Ok(())
    }
}
