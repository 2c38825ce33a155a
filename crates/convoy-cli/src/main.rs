//! Convoy agent command-line tools
//!
//! `convoyd` inspects and drives the hook state machine of a unit agent:
//!
//! - `convoyd hook-state <unit>` prints the recorded hook and the recovery it needs
//! - `convoyd run-hook <unit> <kind> --charm-dir <dir>` runs one hook
//! - `convoyd resolve-hook <unit>` marks an interrupted hook resolved
//! - `convoyd config` prints the effective configuration
//!
//! Exit status is 0 on success, 1 on failure and 2 when the failure is fatal
//! (corrupt state or a broken invariant) and must not simply be retried.

mod args;
mod commands;
mod logging;
mod router;
mod signal_handler;

use clap::Parser;
use convoy_core::{ConvoyError, UnifiedError, load_config};
use convoy_hook::HookError;
use std::process::ExitCode;

pub use args::{Cli, Commands};

const EXIT_FAILURE: u8 = 1;
const EXIT_FATAL: u8 = 2;

fn is_fatal(error: &anyhow::Error) -> bool {
    if let Some(e) = error.downcast_ref::<HookError>() {
        return e.is_fatal();
    }
    if let Some(e) = error.downcast_ref::<ConvoyError>() {
        return e.is_fatal();
    }
    false
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("convoyd: {}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    logging::init(&config.logging);

    match router::route(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("convoyd: {:#}", e);
            if is_fatal(&e) {
                ExitCode::from(EXIT_FATAL)
            } else {
                ExitCode::from(EXIT_FAILURE)
            }
        }
    }
}
