use std::path::Path;

use serde::Deserialize;

use crate::lib::errors::ConfigError;

pub const DEFAULT_AGENT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_AGENT_MODEL: &str = "deepseek/deepseek-chat-v3.1";
pub const DEFAULT_AGENT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOOL_ROUNDS: u8 = 8;
pub const DEFAULT_API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Hosted model settings for the `agent` command.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSection {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tool_rounds: u8,
    pub api_key_env: String,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_AGENT_BASE_URL.to_string(),
            model: DEFAULT_AGENT_MODEL.to_string(),
            temperature: DEFAULT_AGENT_TEMPERATURE,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct RawAgentSection {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tool_rounds: Option<u8>,
    pub api_key_env: Option<String>,
}

pub fn parse_agent_section(
    raw: Option<RawAgentSection>,
    path: &Path,
) -> Result<AgentSection, ConfigError> {
    let raw = raw.unwrap_or_default();
    let defaults = AgentSection::default();

    let base_url = raw.base_url.unwrap_or(defaults.base_url);
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ConfigError::InvalidField {
            path: path.to_path_buf(),
            field: "agent.base_url",
            message: "Use an http(s) URL".into(),
        });
    }

    let temperature = raw.temperature.unwrap_or(defaults.temperature);
    if !(0.0..=2.0).contains(&temperature) {
        return Err(ConfigError::InvalidField {
            path: path.to_path_buf(),
            field: "agent.temperature",
            message: "Use a temperature between 0.0 and 2.0".into(),
        });
    }

    let max_tool_rounds = raw.max_tool_rounds.unwrap_or(defaults.max_tool_rounds);
    if max_tool_rounds == 0 {
        return Err(ConfigError::InvalidField {
            path: path.to_path_buf(),
            field: "agent.max_tool_rounds",
            message: "Allow at least one tool round".into(),
        });
    }

    Ok(AgentSection {
        base_url: base_url.trim_end_matches('/').to_string(),
        model: raw.model.unwrap_or(defaults.model),
        temperature,
        max_tool_rounds,
        api_key_env: raw.api_key_env.unwrap_or(defaults.api_key_env),
    })
}
