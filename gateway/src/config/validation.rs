use url::Url;

use super::client::ClientConfig;
use super::{ConfigError, ServerConfig};

pub(crate) fn validate_server(config: &ServerConfig) -> Result<(), ConfigError> {
    if config.port == 0 {
        return Err(ConfigError::Invalid("port must be greater than 0".to_string()));
    }
    if config.idle_timeout_seconds == 0 {
        return Err(ConfigError::Invalid(
            "idle_timeout_seconds must be greater than 0".to_string(),
        ));
    }
    if config.agent_timeout_seconds == 0 {
        return Err(ConfigError::Invalid(
            "agent_timeout_seconds must be greater than 0".to_string(),
        ));
    }
    if let Some(url) = &config.agent_url
        && !matches!(url.scheme(), "http" | "https")
    {
        return Err(ConfigError::Invalid(format!(
            "agent url must use http or https, got '{}'",
            url.scheme()
        )));
    }
    Ok(())
}

pub(crate) fn validate_client(config: &ClientConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.url)
        .map_err(|e| ConfigError::Invalid(format!("gateway url '{}': {e}", config.url)))?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(ConfigError::Invalid(format!(
            "gateway url must use ws or wss, got '{}'",
            url.scheme()
        )));
    }

    let positive = [
        ("greeting_timeout_ms", config.greeting_timeout_ms),
        ("playback_idle_ms", config.playback_idle_ms),
        ("health_interval_seconds", config.health_interval_seconds),
        ("health_timeout_seconds", config.health_timeout_seconds),
        ("keepalive_seconds", config.keepalive_seconds),
    ];
    for (name, value) in positive {
        if value == 0 {
            return Err(ConfigError::Invalid(format!("{name} must be greater than 0")));
        }
    }
    if config.playback_sample_rate == 0 {
        return Err(ConfigError::Invalid(
            "playback_sample_rate must be greater than 0".to_string(),
        ));
    }

    config
        .vad
        .validate()
        .map_err(|e| ConfigError::Invalid(e.to_string()))
}
