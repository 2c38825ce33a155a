//! CLI argument definitions using clap
//!
//! - convoyd hook-state <unit>          # Show the recorded hook state
//! - convoyd run-hook <unit> <kind>     # Run one hook with crash-safe bookkeeping
//! - convoyd resolve-hook <unit>        # Mark an interrupted hook resolved
//! - convoyd config                     # Print the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "convoyd")]
#[command(about = "Convoy agent tools")]
#[command(version)]
pub struct Cli {
    /// Configuration file (JSON, TOML or YAML)
    #[arg(long, global = true, env = "CONVOY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the configured log filter
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the hook state recorded for a unit
    HookState {
        /// Unit name, e.g. wordpress/0
        unit: String,

        /// Explicit state file instead of the one under the state directory
        #[arg(long)]
        state_file: Option<PathBuf>,

        /// Print JSON instead of YAML
        #[arg(long)]
        json: bool,
    },

    /// Run a hook for a unit, recovering from any interrupted run first
    RunHook {
        /// Unit name, e.g. wordpress/0
        unit: String,

        /// Hook kind, e.g. install or relation-joined
        kind: String,

        /// Charm directory holding hooks/
        #[arg(long)]
        charm_dir: PathBuf,

        /// Relation name; selects the <relation>-<kind> hook
        #[arg(long)]
        relation: Option<String>,

        #[arg(long)]
        relation_id: Option<i64>,

        #[arg(long)]
        remote_unit: Option<String>,

        #[arg(long)]
        change_version: Option<i64>,

        /// Relation member unit names
        #[arg(long, value_delimiter = ',')]
        members: Vec<String>,

        /// Extra hook environment, KEY=VALUE
        #[arg(long = "env", value_name = "KEY=VALUE")]
        env: Vec<String>,

        /// Socket hook tools use to reach the agent
        #[arg(long, default_value = "")]
        agent_socket: String,

        #[arg(long)]
        state_file: Option<PathBuf>,
    },

    /// Mark an interrupted hook as resolved so the unit can continue
    ResolveHook {
        unit: String,

        #[arg(long)]
        state_file: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config {
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_hook() {
        let cli = Cli::try_parse_from([
            "convoyd",
            "run-hook",
            "wordpress/0",
            "relation-joined",
            "--charm-dir",
            "/charms/wordpress",
            "--relation",
            "db",
            "--relation-id",
            "3",
            "--remote-unit",
            "mysql/0",
            "--change-version",
            "1",
            "--members",
            "mysql/0,mysql/1",
            "--env",
            "A=1",
            "--env",
            "B=2",
        ])
        .unwrap();

        match cli.command {
            Commands::RunHook {
                unit,
                relation_id,
                members,
                env,
                ..
            } => {
                assert_eq!(unit, "wordpress/0");
                assert_eq!(relation_id, Some(3));
                assert_eq!(members, ["mysql/0", "mysql/1"]);
                assert_eq!(env, ["A=1", "B=2"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["convoyd", "config", "--log-level", "debug"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }
}
