//! Environment variable-based configuration overrides

use super::ConvoyConfig;
use crate::error::{ConvoyError, ConvoyResult};
use humantime_serde::re::humantime;
use std::path::PathBuf;
use std::time::Duration;

/// Apply `CONVOY_*` overrides from the process environment
pub fn apply_env_overrides(config: &mut ConvoyConfig) -> ConvoyResult<()> {
    apply_env_overrides_from(config, |key| std::env::var(key).ok())
}

/// Apply `CONVOY_*` overrides using `lookup` to resolve variables
///
/// Durations use humantime syntax (`500ms`, `30s`, `1m`).
pub fn apply_env_overrides_from<F>(config: &mut ConvoyConfig, lookup: F) -> ConvoyResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(d) = duration_var(&lookup, "CONVOY_HEARTBEAT_INTERVAL")? {
        config.presence.heartbeat_interval = d;
    }
    if let Some(d) = duration_var(&lookup, "CONVOY_STALENESS_WINDOW")? {
        config.presence.staleness_window = d;
    }
    if let Some(d) = duration_var(&lookup, "CONVOY_SWEEP_INTERVAL")? {
        config.presence.sweep_interval = d;
    }
    if let Some(d) = duration_var(&lookup, "CONVOY_LEASE_DURATION")? {
        config.leadership.lease_duration = d;
    }
    if let Some(d) = duration_var(&lookup, "CONVOY_HOOK_TIMEOUT")? {
        config.hooks.timeout = d;
    }
    if let Some(dir) = lookup("CONVOY_STATE_DIR") {
        config.hooks.state_dir = PathBuf::from(dir);
    }
    if let Some(level) = lookup("CONVOY_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = lookup("CONVOY_LOG_FORMAT") {
        config.logging.format = format.parse().map_err(ConvoyError::config)?;
    }
    Ok(())
}

fn duration_var<F>(lookup: &F, key: &str) -> ConvoyResult<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => humantime::parse_duration(&raw)
            .map(Some)
            .map_err(|e| ConvoyError::config(format!("Invalid {} value '{}': {}", key, raw, e))),
        None => Ok(None),
    }
}
