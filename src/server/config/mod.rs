//! Load and validate server configuration.
use std::{
    env,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use tracing::{error, info};

use crate::lib::errors::ConfigError;

pub mod agent;
pub mod server;
pub mod statistics;
pub mod storage;
pub mod telemetry;

pub use agent::{parse_agent_section, AgentSection, RawAgentSection};
pub use server::{
    apply_server_overrides, parse_server_section, RawServerSection, ServerSection, DEFAULT_HOST,
    DEFAULT_PORT,
};
pub use statistics::{
    parse_statistics_section, RawStatisticsSection, StatisticsSection, DEFAULT_PERMUTATIONS,
};
pub use storage::{parse_storage_section, RawStorageSection, StorageSection};

pub const CONFIG_ENV_KEY: &str = "GIS_MCP_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const HOST_ENV_KEY: &str = "GIS_MCP_HOST";
pub const PORT_ENV_KEY: &str = "GIS_MCP_PORT";
pub const STORAGE_ENV_KEY: &str = "GIS_MCP_STORAGE_PATH";

/// Top-level configuration container.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub storage: StorageSection,
    pub statistics: StatisticsSection,
    pub agent: AgentSection,
    pub source_path: PathBuf,
    /// False when the file was absent and every section took its default.
    pub loaded_from_file: bool,
}

#[derive(Debug, Deserialize, Default)]
struct RawServerConfig {
    server: Option<RawServerSection>,
    storage: Option<RawStorageSection>,
    statistics: Option<RawStatisticsSection>,
    agent: Option<RawAgentSection>,
}

impl ServerConfig {
    /// Prefer `GIS_MCP_CONFIG_PATH` if set; otherwise read `config.toml` when present.
    pub fn load_from_env_or_default() -> Result<Self, ConfigError> {
        let (path, from_env) = match env::var(CONFIG_ENV_KEY) {
            Ok(value) if !value.trim().is_empty() => (PathBuf::from(value.trim()), true),
            _ => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        telemetry::log_env_source(&path, from_env);
        Self::load_resolved(path, from_env)
    }

    /// Load `path`; a missing file is tolerated unless it was named explicitly.
    pub fn load_resolved(path: PathBuf, explicit: bool) -> Result<Self, ConfigError> {
        if !explicit && !path.exists() {
            telemetry::log_defaults(&path);
            let config = Self::from_raw(RawServerConfig::default(), path, false)?;
            telemetry::log_loaded(&config);
            return Ok(config);
        }
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        info!(
            target: "gis_mcp::config",
            path = %path.display(),
            "Starting configuration load"
        );

        let builder = config::Config::builder().add_source(config::File::from(path.clone()));
        let document = builder.build().map_err(|err| {
            let error = ConfigError::from_read_error(path.clone(), err);
            error!(
                target: "gis_mcp::config",
                path = %path.display(),
                reason = %error,
                "Failed to read configuration file"
            );
            error
        })?;

        let raw: RawServerConfig = document.try_deserialize().map_err(|err| {
            let error = ConfigError::from_parse_error(path.clone(), err);
            error!(
                target: "gis_mcp::config",
                path = %path.display(),
                reason = %error,
                "Failed to parse configuration file"
            );
            error
        })?;

        let config = Self::from_raw(raw, path.clone(), true).map_err(|err| {
            error!(
                target: "gis_mcp::config",
                path = %path.display(),
                reason = %err,
                "Failed to validate configuration file"
            );
            err
        })?;

        telemetry::log_loaded(&config);
        Ok(config)
    }

    /// Defaults rooted at `storage_root`, used by tests and embedders.
    pub fn with_storage_root(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            server: ServerSection::default(),
            storage: StorageSection {
                root: storage_root.into(),
            },
            statistics: StatisticsSection::default(),
            agent: AgentSection::default(),
            source_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            loaded_from_file: false,
        }
    }

    fn from_raw(
        raw: RawServerConfig,
        path: PathBuf,
        loaded_from_file: bool,
    ) -> Result<Self, ConfigError> {
        let mut server = parse_server_section(raw.server, &path)?;
        apply_server_overrides(
            &mut server,
            env::var(HOST_ENV_KEY).ok(),
            env::var(PORT_ENV_KEY).ok(),
            &path,
        )?;
        let cwd = current_dir(&path)?;
        let storage = parse_storage_section(
            raw.storage,
            env::var(STORAGE_ENV_KEY).ok(),
            &cwd,
            &path,
        )?;
        let statistics = parse_statistics_section(raw.statistics, &path)?;
        let agent = parse_agent_section(raw.agent, &path)?;

        Ok(Self {
            server,
            storage,
            statistics,
            agent,
            source_path: path,
            loaded_from_file,
        })
    }
}

fn current_dir(path: &Path) -> Result<PathBuf, ConfigError> {
    env::current_dir().map_err(|err| ConfigError::InvalidField {
        path: path.to_path_buf(),
        field: "storage.root",
        message: format!("cannot resolve the working directory: {err}"),
    })
}
