//! LaunchProfile plus transport and config resolution.
use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;

use crate::server::config::{CONFIG_ENV_KEY, DEFAULT_CONFIG_PATH};

pub const TRANSPORT_ENV_KEY: &str = "GIS_MCP_TRANSPORT";

/// MCP transport mode.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum TransportMode {
    Stdio,
    /// Newline-delimited JSON-RPC over raw TCP connections.
    Tcp,
    /// Streamable HTTP at `/mcp`.
    #[value(alias = "streamable-http")]
    Http,
    /// Server-sent events at `/sse` with posts to `/message`.
    Sse,
}

impl TransportMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TransportMode::Stdio => "stdio",
            TransportMode::Tcp => "tcp",
            TransportMode::Http => "http",
            TransportMode::Sse => "sse",
        }
    }

    pub const fn is_network(&self) -> bool {
        !matches!(self, TransportMode::Stdio)
    }

    pub fn from_env_value(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "stdio" => Ok(Self::Stdio),
            "tcp" => Ok(Self::Tcp),
            "http" | "streamable-http" => Ok(Self::Http),
            "sse" => Ok(Self::Sse),
            other => Err(anyhow!(
                "unsupported {TRANSPORT_ENV_KEY} value `{other}`: \
                 use stdio, tcp, http, streamable-http or sse"
            )),
        }
    }
}

/// Resolved launch profile.
#[derive(Debug, Clone)]
pub struct LaunchProfile {
    pub config_path: PathBuf,
    /// True when the path came from `--config` or the environment and must exist.
    pub explicit_config: bool,
    pub transport: TransportMode,
    pub debug: bool,
    pub launch_args: Vec<String>,
}

/// Resolve the transport: CLI flag → `GIS_MCP_TRANSPORT` → stdio.
pub fn resolve_transport(
    flag: Option<TransportMode>,
    env_value: Option<String>,
) -> Result<TransportMode> {
    match (flag, env_value) {
        (Some(mode), _) => Ok(mode),
        (None, Some(value)) => TransportMode::from_env_value(&value),
        (None, None) => Ok(TransportMode::Stdio),
    }
}

/// Resolve config path in the order: CLI override → env var → default.
pub fn resolve_config_path(override_path: Option<PathBuf>) -> Result<(PathBuf, bool)> {
    let (path, explicit) = match override_path {
        Some(path) => (path, true),
        None => match env::var(CONFIG_ENV_KEY) {
            Ok(value) if !value.trim().is_empty() => (PathBuf::from(value.trim()), true),
            _ => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        },
    };

    if path.is_absolute() {
        return Ok((path, explicit));
    }

    let cwd = env::current_dir().context("failed to obtain current directory")?;
    Ok((cwd.join(path), explicit))
}

/// Build launch arguments suitable for reproduction/logging.
pub fn build_launch_args(transport: TransportMode, config: &Path, debug: bool) -> Vec<String> {
    let mut args = vec![
        format!("--transport={}", transport.as_str()),
        format!("--config={}", config.display()),
    ];
    if debug {
        args.push("--debug".into());
    }
    args
}
