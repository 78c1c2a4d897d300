//! Command-line surface: server launch profile plus the `client` and `agent` commands.
use anyhow::Result;

use crate::server::config::ServerConfig;

pub mod agent;
pub mod args;
pub mod client;
pub mod profile;

pub use args::{
    AgentArgs, ClientArgs, ClientCommand, CliCommand, LaunchProfileArgs, ParsedCommand,
    DEFAULT_SERVER_ADDR,
};
pub use profile::{
    build_launch_args, resolve_config_path, resolve_transport, LaunchProfile, TransportMode,
    TRANSPORT_ENV_KEY,
};

/// Execute CLI command mode and return the text to print on stdout.
pub async fn execute_cli_command(command: CliCommand, profile: &LaunchProfile) -> Result<String> {
    match command {
        CliCommand::Client(args) => client::execute(args.command).await,
        CliCommand::Agent(args) => {
            let config =
                ServerConfig::load_resolved(profile.config_path.clone(), profile.explicit_config)?;
            agent::run(args, &config.agent).await
        }
    }
}
