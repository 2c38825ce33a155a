//! Operator resolution of interrupted hooks

use anyhow::Result;
use convoy_core::ConvoyConfig;
use convoy_hook::{HookExecutor, HookRunner, StateFile};
use std::path::Path;

pub async fn resolve(config: &ConvoyConfig, unit: &str, path: &Path) -> Result<()> {
    // Resolving never runs a hook, so the charm directory is irrelevant.
    let runner = HookRunner::new(
        unit,
        ".",
        StateFile::new(path),
        HookExecutor::from_config(&config.hooks),
    );
    if runner.resolve().await? {
        println!("{}: interrupted hook marked resolved", unit);
    } else {
        println!("{}: nothing to resolve", unit);
    }
    Ok(())
}
