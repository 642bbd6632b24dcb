//! Configuration module for the live gateway
//!
//! This module handles gateway and client configuration from various sources:
//! .env files, YAML files, and environment variables.
//! Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `client`: Client runtime settings
//!
//! # Example
//! ```rust,no_run
//! use live_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::core::agent::ToolDisplayMap;

pub mod client;
mod env;
mod merge;
mod validation;
mod yaml;

pub use client::ClientConfig;
pub use yaml::YamlConfig;

/// Greeting spoken when a voice session starts
pub const DEFAULT_GREETING_TEXT: &str = "Hello. How can I help you today?";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {name}: {message}")]
    InvalidEnv { name: String, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Gateway server configuration
///
/// Covers:
/// - Listen address
/// - CORS
/// - Agent backend endpoint and identity prefix
/// - Voice session greeting and timing
/// - Tool display metadata for activity telemetry
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    /// Comma separated origins, `*`, or `None` for same-origin only
    pub cors_allowed_origins: Option<String>,

    // Agent backend
    /// Agent endpoint; the echo backend is used when unset
    pub agent_url: Option<Url>,
    pub agent_timeout_seconds: u64,
    /// Per-connection user ids are `<prefix>:anonymous:<conversation id>`
    pub user_id_prefix: String,

    // Live session
    pub greeting_text: String,
    pub idle_timeout_seconds: u64,
    /// Minimum gap between transcript-triggered responses
    pub response_cooldown_ms: u64,

    pub tool_display: ToolDisplayMap,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_allowed_origins: None,
            agent_url: None,
            agent_timeout_seconds: 10,
            user_id_prefix: "live_gateway".to_string(),
            greeting_text: DEFAULT_GREETING_TEXT.to_string(),
            idle_timeout_seconds: 300,
            response_cooldown_ms: 2000,
            tool_display: ToolDisplayMap::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// The .env file is loaded in main.rs at startup, so its values are
    /// visible here as ordinary environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = merge::merge_server(None)?;
        validation::validate_server(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_server(Some(&yaml_config))?;
        validation::validate_server(&config)?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.agent_timeout_seconds)
    }

    pub fn response_cooldown(&self) -> Duration {
        Duration::from_millis(self.response_cooldown_ms)
    }

    /// Greeting text, never blank
    pub fn greeting(&self) -> &str {
        let text = self.greeting_text.trim();
        if text.is_empty() {
            DEFAULT_GREETING_TEXT
        } else {
            text
        }
    }
}
