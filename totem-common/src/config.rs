//! Configuration file resolution and TOML loading
//!
//! Config file lookup follows a fixed priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Per-user config file (`~/.config/<app>/config.toml` on Linux)
//! 4. System-wide config file (`/etc/<app>/config.toml`, Linux only)
//!
//! When no file is found the caller falls back to built-in defaults.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Resolve which configuration file to load, if any.
///
/// An explicit path (CLI or environment) is returned even if it does not
/// exist so the caller can report a useful error; the implicit per-user and
/// system locations are only returned when present on disk.
pub fn resolve_config_file(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    app_name: &str,
) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Per-user config directory
    if let Some(path) = dirs::config_dir().map(|d| d.join(app_name).join("config.toml")) {
        if path.exists() {
            return Some(path);
        }
    }

    // Priority 4: System-wide config (Linux only)
    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc").join(app_name).join("config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Parse a TOML document into `T`
pub fn parse_toml<T: DeserializeOwned>(content: &str) -> Result<T> {
    Ok(toml::from_str(content)?)
}

/// Load `T` from a TOML file, or return `T::default()` when `path` is `None`
pub fn load_toml_or_default<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        debug!("No config file found, using built-in defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        return Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let value = parse_toml(&content)?;
    info!("Loaded configuration from {}", path.display());
    Ok(value)
}
