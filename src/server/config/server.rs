use std::path::Path;

use serde::Deserialize;

use crate::lib::errors::ConfigError;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

/// Server socket settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct RawServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
}

pub fn parse_server_section(
    raw: Option<RawServerSection>,
    path: &Path,
) -> Result<ServerSection, ConfigError> {
    let server_raw = raw.unwrap_or_default();
    let host = server_raw.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    if host.trim().is_empty() {
        return Err(ConfigError::InvalidField {
            path: path.to_path_buf(),
            field: "server.host",
            message: "Host must not be empty".into(),
        });
    }
    let port = server_raw.port.unwrap_or(DEFAULT_PORT);
    validate_port(port, path, "server.port")?;
    Ok(ServerSection { host, port })
}

/// Apply `GIS_MCP_HOST` / `GIS_MCP_PORT` style overrides.
pub fn apply_server_overrides(
    section: &mut ServerSection,
    host: Option<String>,
    port: Option<String>,
    path: &Path,
) -> Result<(), ConfigError> {
    if let Some(host) = host.filter(|value| !value.trim().is_empty()) {
        section.host = host.trim().to_string();
    }
    if let Some(port) = port.filter(|value| !value.trim().is_empty()) {
        let parsed = port
            .trim()
            .parse::<u16>()
            .map_err(|err| ConfigError::InvalidField {
                path: path.to_path_buf(),
                field: "GIS_MCP_PORT",
                message: format!("not a port number: {err}"),
            })?;
        validate_port(parsed, path, "GIS_MCP_PORT")?;
        section.port = parsed;
    }
    Ok(())
}

fn validate_port(port: u16, path: &Path, field: &'static str) -> Result<(), ConfigError> {
    if (1024..=65535).contains(&port) {
        return Ok(());
    }

    Err(ConfigError::InvalidField {
        path: path.to_path_buf(),
        field,
        message: "Use a port in the range 1024-65535".into(),
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn env_overrides_replace_host_and_port() {
        let mut section = ServerSection::default();
        apply_server_overrides(
            &mut section,
            Some("127.0.0.1".into()),
            Some("9010".into()),
            &PathBuf::from("config.toml"),
        )
        .expect("overrides apply");
        assert_eq!(section.host, "127.0.0.1");
        assert_eq!(section.port, 9010);
    }

    #[test]
    fn env_port_out_of_range_is_rejected() {
        let mut section = ServerSection::default();
        let err = apply_server_overrides(
            &mut section,
            None,
            Some("80".into()),
            &PathBuf::from("config.toml"),
        )
        .expect_err("privileged port is rejected");
        match err {
            ConfigError::InvalidField { field, .. } => assert_eq!(field, "GIS_MCP_PORT"),
            other => panic!("Unexpected error: {other:?}"),
        }
    }
}
