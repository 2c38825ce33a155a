//! Configuration validation

use super::ConvoyConfig;
use crate::error::{ConvoyError, ConvoyResult};
use std::time::Duration;

/// Reject configurations the protocols cannot work with
pub fn validate(config: &ConvoyConfig) -> ConvoyResult<()> {
    let presence = &config.presence;
    non_zero("presence.heartbeat_interval", presence.heartbeat_interval)?;
    non_zero("presence.staleness_window", presence.staleness_window)?;
    non_zero("presence.sweep_interval", presence.sweep_interval)?;
    non_zero("leadership.lease_duration", config.leadership.lease_duration)?;
    non_zero("hooks.timeout", config.hooks.timeout)?;

    // A live pinger must refresh its record before it goes stale.
    if presence.heartbeat_interval >= presence.staleness_window {
        return Err(ConvoyError::config(format!(
            "presence.heartbeat_interval ({:?}) must be shorter than presence.staleness_window ({:?})",
            presence.heartbeat_interval, presence.staleness_window
        )));
    }
    Ok(())
}

fn non_zero(name: &str, value: Duration) -> ConvoyResult<()> {
    if value.is_zero() {
        return Err(ConvoyError::config(format!("{} must be greater than zero", name)));
    }
    Ok(())
}
