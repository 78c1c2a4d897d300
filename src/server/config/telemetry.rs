use std::path::Path;

use tracing::{debug, info};

use super::{ServerConfig, CONFIG_ENV_KEY, DEFAULT_CONFIG_PATH};

pub fn log_env_source(path: &Path, from_env: bool) {
    if from_env {
        info!(
            target: "gis_mcp::config",
            path = %path.display(),
            "Loading configuration using GIS_MCP_CONFIG_PATH environment variable"
        );
    } else {
        debug!(
            target: "gis_mcp::config",
            path = %path.display(),
            env = CONFIG_ENV_KEY,
            default = DEFAULT_CONFIG_PATH,
            "GIS_MCP_CONFIG_PATH not set; using default config.toml"
        );
    }
}

pub fn log_defaults(path: &Path) {
    info!(
        target: "gis_mcp::config",
        path = %path.display(),
        "Configuration file not found; using built-in defaults"
    );
}

pub fn log_loaded(config: &ServerConfig) {
    info!(
        target: "gis_mcp::config",
        path = %config.source_path.display(),
        from_file = config.loaded_from_file,
        host = %config.server.host,
        port = config.server.port,
        storage_root = %config.storage.root.display(),
        permutations = config.statistics.permutations,
        seeded = config.statistics.seed.is_some(),
        agent_model = %config.agent.model,
        "Configuration loaded"
    );
}
