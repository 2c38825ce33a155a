//! Configuration management for Convoy agents
//!
//! Configuration is layered: built-in defaults, then an optional file (JSON,
//! TOML or YAML), then `CONVOY_*` environment variables. The result is
//! validated before use.

mod env_loader;
mod file_loader;
mod logging_config;
mod validation;

pub use env_loader::{apply_env_overrides, apply_env_overrides_from};
pub use file_loader::load_from_file;
pub use logging_config::{LogFormat, LoggingConfig};
pub use validation::validate;

use crate::error::ConvoyResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Presence protocol timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// How often a pinger writes a heartbeat
    #[serde(with = "humantime_serde")]
    pub heartbeat_interval: Duration,
    /// A key is alive iff its last heartbeat is younger than this
    #[serde(with = "humantime_serde")]
    pub staleness_window: Duration,
    /// How often a watcher re-reads heartbeats to detect flips
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(10),
            staleness_window: Duration::from_secs(25),
            sweep_interval: Duration::from_secs(5),
        }
    }
}

/// Leadership lease settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadershipConfig {
    /// Lease length granted by a claim
    #[serde(with = "humantime_serde")]
    pub lease_duration: Duration,
}

impl Default for LeadershipConfig {
    fn default() -> Self {
        Self {
            lease_duration: Duration::from_secs(60),
        }
    }
}

/// Hook execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    /// Upper bound on a single hook process run
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Directory holding per-agent hook state files
    pub state_dir: PathBuf,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            state_dir: default_state_dir(),
        }
    }
}

fn default_state_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".convoy")
        .join("state")
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvoyConfig {
    pub presence: PresenceConfig,
    pub leadership: LeadershipConfig,
    pub hooks: HooksConfig,
    pub logging: LoggingConfig,
}

/// Load configuration from an optional file, apply environment overrides and validate
pub fn load_config(path: Option<&Path>) -> ConvoyResult<ConvoyConfig> {
    let mut config = match path {
        Some(path) => load_from_file(path)?,
        None => ConvoyConfig::default(),
    };
    apply_env_overrides(&mut config)?;
    validate(&config)?;
    Ok(config)
}
