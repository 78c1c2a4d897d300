//! CLI argument definitions and `LaunchProfile` construction.
use std::{env, path::PathBuf};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use super::{
    build_launch_args, resolve_config_path, resolve_transport, LaunchProfile, TransportMode,
    TRANSPORT_ENV_KEY,
};

pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:8080";

/// Parsed command intent from CLI.
#[derive(Debug, Clone)]
pub enum ParsedCommand {
    RunServer(LaunchProfile),
    Cli {
        command: CliCommand,
        profile: LaunchProfile,
    },
}

/// Top-level optional CLI commands.
#[derive(Debug, Clone, Subcommand)]
pub enum CliCommand {
    /// Talk to a running TCP server.
    Client(ClientArgs),
    /// Chat with a hosted model that can call the server's tools.
    Agent(AgentArgs),
}

#[derive(Debug, Clone, Args)]
#[command(about = "List or call tools on a running gis-mcp TCP server")]
pub struct ClientArgs {
    #[command(subcommand)]
    pub command: ClientCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ClientCommand {
    /// Print the name and description of every tool.
    ListTools {
        #[arg(long, default_value = DEFAULT_SERVER_ADDR)]
        addr: String,
    },
    /// Call one tool and print its structured result.
    Call {
        tool: String,
        /// JSON object with the tool arguments.
        #[arg(long, default_value = "{}")]
        args: String,
        #[arg(long, default_value = DEFAULT_SERVER_ADDR)]
        addr: String,
    },
}

#[derive(Debug, Clone, Args)]
pub struct AgentArgs {
    #[arg(long, default_value = DEFAULT_SERVER_ADDR)]
    pub addr: String,
    /// Answer one prompt and exit instead of starting an interactive session.
    #[arg(long)]
    pub prompt: Option<String>,
}

/// Command-line arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    author,
    version,
    about = "GIS MCP server with geometry, projection, vector, raster and spatial statistics tools",
    long_about = None
)]
pub struct LaunchProfileArgs {
    /// Log at debug level unless RUST_LOG is set.
    #[arg(long, global = true, default_value_t = false)]
    pub debug: bool,
    /// Select stdio or tcp (overrides GIS_MCP_TRANSPORT).
    #[arg(long, value_enum)]
    pub transport: Option<TransportMode>,
    /// Path to config.toml (overrides GIS_MCP_CONFIG_PATH).
    #[arg(long = "config", global = true)]
    pub config_override: Option<PathBuf>,
    /// Optional CLI command mode.
    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

impl LaunchProfileArgs {
    /// Build a `LaunchProfile` from CLI args and environment variables.
    pub fn build(&self) -> Result<LaunchProfile> {
        let (config_path, explicit_config) = resolve_config_path(self.config_override.clone())?;
        let transport = resolve_transport(self.transport, env::var(TRANSPORT_ENV_KEY).ok())?;
        let launch_args = build_launch_args(transport, &config_path, self.debug);

        Ok(LaunchProfile {
            config_path,
            explicit_config,
            transport,
            debug: self.debug,
            launch_args,
        })
    }

    /// Parse CLI args into either server launch mode or utility command mode.
    pub fn into_command(self) -> Result<ParsedCommand> {
        let profile = self.build()?;
        Ok(match self.command {
            Some(command) => ParsedCommand::Cli { command, profile },
            None => ParsedCommand::RunServer(profile),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_call_parses_arguments() {
        let args = LaunchProfileArgs::try_parse_from([
            "gis-mcp",
            "client",
            "call",
            "get_area",
            "--args",
            r#"{"geometry":"POINT (0 0)"}"#,
            "--addr",
            "127.0.0.1:9000",
        ])
        .expect("parses");
        match args.command {
            Some(CliCommand::Client(ClientArgs {
                command: ClientCommand::Call { tool, args, addr },
            })) => {
                assert_eq!(tool, "get_area");
                assert!(args.contains("geometry"));
                assert_eq!(addr, "127.0.0.1:9000");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn agent_defaults_to_local_server() {
        let args =
            LaunchProfileArgs::try_parse_from(["gis-mcp", "--debug", "agent"]).expect("parses");
        assert!(args.debug);
        match args.command {
            Some(CliCommand::Agent(agent)) => {
                assert_eq!(agent.addr, DEFAULT_SERVER_ADDR);
                assert!(agent.prompt.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn transport_flag_is_optional() {
        let args =
            LaunchProfileArgs::try_parse_from(["gis-mcp", "--transport", "tcp"]).expect("parses");
        assert_eq!(args.transport, Some(TransportMode::Tcp));
        assert!(args.command.is_none());

        let args = LaunchProfileArgs::try_parse_from(["gis-mcp", "--transport", "streamable-http"])
            .expect("parses");
        assert_eq!(args.transport, Some(TransportMode::Http));
    }
}
