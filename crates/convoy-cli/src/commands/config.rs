//! Effective configuration

use anyhow::Result;
use convoy_core::ConvoyConfig;

pub fn show(config: &ConvoyConfig, json: bool) -> Result<()> {
    let rendered = if json {
        serde_json::to_string_pretty(config)?
    } else {
        serde_yaml::to_string(config)?
    };
    println!("{}", rendered.trim_end());
    Ok(())
}
