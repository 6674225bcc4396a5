//! Configuration for the playback coordinator
//!
//! Loaded from a TOML file resolved in this order:
//! 1. `--config` command-line argument
//! 2. `TOTEM_PC_CONFIG` environment variable
//! 3. Per-user config directory (`~/.config/totem-pc/config.toml`)
//! 4. Built-in defaults
//!
//! Every field is optional; missing fields take the built-in default.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "TOTEM_PC_CONFIG";

/// Application directory name under the user/system config roots
pub const APP_NAME: &str = "totem-pc";

/// What `pause()` does on a live (unseekable, unknown-length) source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LivePausePolicy {
    /// Degrade pause to a full stop; live sources cannot resume mid-stream
    Stop,
    /// Pause the engine like any other source
    Pause,
}

impl Default for LivePausePolicy {
    fn default() -> Self {
        LivePausePolicy::Stop
    }
}

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Seek coalescing window in milliseconds
    #[serde(default = "default_seek_window_ms")]
    pub seek_window_ms: u64,

    /// Safety factor applied to the download time estimate before
    /// releasing a download-buffering hold (must be > 1.0)
    #[serde(default = "default_buffering_left_ratio")]
    pub buffering_left_ratio: f64,

    /// Download fill poll interval in milliseconds
    #[serde(default = "default_fill_poll_interval_ms")]
    pub fill_poll_interval_ms: u64,

    /// Position tick interval while playing, in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    #[serde(default)]
    pub live_pause_policy: LivePausePolicy,

    /// Capacity of the `PlayerSignal` broadcast channel
    #[serde(default = "default_signal_capacity")]
    pub signal_capacity: usize,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_seek_window_ms() -> u64 {
    100
}

fn default_buffering_left_ratio() -> f64 {
    1.1
}

fn default_fill_poll_interval_ms() -> u64 {
    200
}

fn default_tick_interval_ms() -> u64 {
    200
}

fn default_signal_capacity() -> usize {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            seek_window_ms: default_seek_window_ms(),
            buffering_left_ratio: default_buffering_left_ratio(),
            fill_poll_interval_ms: default_fill_poll_interval_ms(),
            tick_interval_ms: default_tick_interval_ms(),
            live_pause_policy: LivePausePolicy::default(),
            signal_capacity: default_signal_capacity(),
            logging: LoggingConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    /// Resolve, load and validate the configuration
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let path = totem_common::config::resolve_config_file(cli_path, CONFIG_ENV_VAR, APP_NAME);
        let config: CoordinatorConfig = totem_common::config::load_toml_or_default(path.as_deref())?;
        config.validate()?;

        info!(
            "Coordinator config: seek window {}ms, fill poll {}ms, tick {}ms, live pause {:?}",
            config.seek_window_ms,
            config.fill_poll_interval_ms,
            config.tick_interval_ms,
            config.live_pause_policy
        );
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: CoordinatorConfig = totem_common::config::parse_toml(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would break the coordinator's timing or release rule
    pub fn validate(&self) -> Result<()> {
        if !(self.buffering_left_ratio > 1.0) {
            return Err(Error::Config(format!(
                "buffering_left_ratio must be greater than 1.0 (got {})",
                self.buffering_left_ratio
            )));
        }
        if self.seek_window_ms == 0 {
            return Err(Error::Config("seek_window_ms must be non-zero".to_string()));
        }
        if self.fill_poll_interval_ms == 0 {
            return Err(Error::Config(
                "fill_poll_interval_ms must be non-zero".to_string(),
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(Error::Config("tick_interval_ms must be non-zero".to_string()));
        }
        if self.signal_capacity == 0 {
            return Err(Error::Config("signal_capacity must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn seek_window(&self) -> Duration {
        Duration::from_millis(self.seek_window_ms)
    }

    pub fn fill_poll_interval(&self) -> Duration {
        Duration::from_millis(self.fill_poll_interval_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
