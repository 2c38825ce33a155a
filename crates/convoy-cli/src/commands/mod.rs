//! Command implementations

pub mod config;
pub mod hook_state;
pub mod resolve_hook;
pub mod run_hook;

use convoy_core::ConvoyConfig;
use std::path::{Path, PathBuf};

/// State file of `unit`, unless one is given explicitly
///
/// Unit names contain a slash, so `wordpress/0` maps to
/// `<state-dir>/wordpress-0/hook`.
pub fn state_path(config: &ConvoyConfig, unit: &str, explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => config
            .hooks
            .state_dir
            .join(unit.replace('/', "-"))
            .join("hook"),
    }
}
