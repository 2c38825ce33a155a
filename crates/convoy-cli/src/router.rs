//! Command routing logic for CLI

use crate::args::{Cli, Commands};
use crate::commands::{self, state_path};
use crate::signal_handler::SignalHandler;
use anyhow::Result;
use convoy_core::ConvoyConfig;
use tokio_util::sync::CancellationToken;

/// Route CLI commands to their respective handlers
pub async fn route(cli: Cli, config: ConvoyConfig) -> Result<()> {
    match cli.command {
        Commands::HookState {
            unit,
            state_file,
            json,
        } => {
            let path = state_path(&config, &unit, state_file.as_deref());
            commands::hook_state::show(&path, json).await
        }
        Commands::RunHook {
            unit,
            kind,
            charm_dir,
            relation,
            relation_id,
            remote_unit,
            change_version,
            members,
            env,
            agent_socket,
            state_file,
        } => {
            let state_file = state_path(&config, &unit, state_file.as_deref());
            let request = commands::run_hook::RunHookRequest {
                unit,
                kind,
                charm_dir,
                relation,
                relation_id,
                remote_unit,
                change_version,
                members,
                env,
                agent_socket,
                state_file,
            };

            let cancel = CancellationToken::new();
            let signals = SignalHandler::start(cancel.clone())?;
            let result = commands::run_hook::run(&config, request, cancel).await;
            signals.stop();
            result
        }
        Commands::ResolveHook { unit, state_file } => {
            let path = state_path(&config, &unit, state_file.as_deref());
            commands::resolve_hook::resolve(&config, &unit, &path).await
        }
        Commands::Config { json } => commands::config::show(&config, json),
    }
}
