//! Entry point for gis-mcp.
use std::process::ExitCode;

use clap::Parser;
use gis_mcp::{
    cli::{execute_cli_command, CliCommand, LaunchProfile, LaunchProfileArgs, ParsedCommand},
    lib::telemetry,
    server::{
        config::ServerConfig,
        runtime::{self, RuntimeExit},
    },
};

#[tokio::main]
async fn main() -> ExitCode {
    match bootstrap().await {
        Ok(_) => ExitCode::SUCCESS,
        Err(exit) => exit.report(),
    }
}

async fn bootstrap() -> Result<(), RuntimeExit> {
    let args = LaunchProfileArgs::parse();
    telemetry::init_tracing(args.debug).map_err(RuntimeExit::from_error)?;
    let command = args.into_command().map_err(RuntimeExit::from_error)?;

    match command {
        ParsedCommand::RunServer(profile) => run_server(profile).await,
        ParsedCommand::Cli { command, profile } => handle_cli_command(command, &profile).await,
    }
}

async fn run_server(profile: LaunchProfile) -> Result<(), RuntimeExit> {
    let config = ServerConfig::load_resolved(profile.config_path.clone(), profile.explicit_config)
        .map_err(RuntimeExit::from_error)?;
    runtime::run_server(profile, config).await
}

async fn handle_cli_command(
    command: CliCommand,
    profile: &LaunchProfile,
) -> Result<(), RuntimeExit> {
    let output = execute_cli_command(command, profile)
        .await
        .map_err(RuntimeExit::from_error)?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}
