use serde::Deserialize;
use std::path::Path;

use super::ConfigError;
use crate::core::agent::ToolDisplayMap;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present here
/// override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8080
///
/// security:
///   cors_allowed_origins: "https://app.example.com"
///
/// agent:
///   url: "http://agent.internal:9000/query"
///   timeout_seconds: 10
///   user_id_prefix: "live_gateway"
///
/// live:
///   greeting_text: "Hello. How can I help you today?"
///   idle_timeout_seconds: 300
///   response_cooldown_ms: 2000
///
/// tools:
///   search_inventory:
///     label: "Searching inventory"
///     icon: "search"
///
/// client:
///   url: "ws://127.0.0.1:8080/ws"
///   greeting_timeout_ms: 20000
///   playback_idle_ms: 350
///
/// vad:
///   speech_threshold: 0.035
///   silence_threshold: 0.015
///   pause_ms: 650
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub security: Option<SecurityYaml>,
    pub agent: Option<AgentYaml>,
    pub live: Option<LiveYaml>,
    pub tools: Option<ToolDisplayMap>,
    pub client: Option<ClientYaml>,
    pub vad: Option<VadYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// Comma separated origins, or `*`
    pub cors_allowed_origins: Option<String>,
}

/// Agent backend configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AgentYaml {
    pub url: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub user_id_prefix: Option<String>,
}

/// Voice session configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LiveYaml {
    pub greeting_text: Option<String>,
    pub idle_timeout_seconds: Option<u64>,
    pub response_cooldown_ms: Option<u64>,
}

/// Client runtime configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ClientYaml {
    pub url: Option<String>,
    pub greeting_timeout_ms: Option<u64>,
    pub playback_idle_ms: Option<u64>,
    pub playback_sample_rate: Option<u32>,
    pub health_interval_seconds: Option<u64>,
    pub health_timeout_seconds: Option<u64>,
    pub keepalive_seconds: Option<u64>,
}

/// Voice Activity Detection configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct VadYaml {
    pub speech_threshold: Option<f32>,
    pub silence_threshold: Option<f32>,
    pub smoothing: Option<f32>,
    pub pause_ms: Option<u64>,
    /// Capture sample rate (Hz)
    pub sample_rate: Option<u32>,
    pub frame_size: Option<usize>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let config: YamlConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }
}
