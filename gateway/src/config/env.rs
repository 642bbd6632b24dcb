use std::env;
use std::str::FromStr;

use url::Url;

use super::client::ClientConfig;
use super::{ConfigError, ServerConfig};
use crate::core::agent::ToolDisplayMap;

/// Read an environment variable, treating empty values as unset
pub(crate) fn env_string(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Read and parse an environment variable
pub(crate) fn env_parse<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnv {
                name: name.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}

pub(crate) fn env_url(name: &str) -> Result<Option<Url>, ConfigError> {
    env_parse::<Url>(name)
}

/// Load server settings from the environment on top of defaults
pub(crate) fn server_from_env() -> Result<ServerConfig, ConfigError> {
    let defaults = ServerConfig::default();

    let tool_display = match env_string("TOOL_DISPLAY_JSON") {
        Some(raw) => serde_json::from_str::<ToolDisplayMap>(&raw).map_err(|e| {
            ConfigError::InvalidEnv {
                name: "TOOL_DISPLAY_JSON".to_string(),
                message: e.to_string(),
            }
        })?,
        None => defaults.tool_display,
    };

    Ok(ServerConfig {
        host: env_string("HOST").unwrap_or(defaults.host),
        port: env_parse("PORT")?.unwrap_or(defaults.port),
        cors_allowed_origins: env_string("CORS_ALLOWED_ORIGINS"),
        greeting_text: env_string("LIVE_GREETING_TEXT").unwrap_or(defaults.greeting_text),
        agent_url: env_url("AGENT_URL")?,
        agent_timeout_seconds: env_parse("AGENT_TIMEOUT_SECONDS")?
            .unwrap_or(defaults.agent_timeout_seconds),
        user_id_prefix: env_string("USER_ID_PREFIX").unwrap_or(defaults.user_id_prefix),
        idle_timeout_seconds: env_parse("IDLE_TIMEOUT_SECONDS")?
            .unwrap_or(defaults.idle_timeout_seconds),
        response_cooldown_ms: env_parse("RESPONSE_COOLDOWN_MS")?
            .unwrap_or(defaults.response_cooldown_ms),
        tool_display,
    })
}

/// Load client settings from the environment on top of defaults
pub(crate) fn client_from_env() -> Result<ClientConfig, ConfigError> {
    let defaults = ClientConfig::default();
    let mut vad = defaults.vad.clone();

    if let Some(value) = env_parse("VAD_SPEECH_THRESHOLD")? {
        vad.speech_threshold = value;
    }
    if let Some(value) = env_parse("VAD_SILENCE_THRESHOLD")? {
        vad.silence_threshold = value;
    }
    if let Some(value) = env_parse("VAD_SMOOTHING")? {
        vad.smoothing = value;
    }
    if let Some(value) = env_parse("VAD_PAUSE_MS")? {
        vad.pause_ms = value;
    }
    if let Some(value) = env_parse("CAPTURE_SAMPLE_RATE")? {
        vad.sample_rate = value;
    }
    if let Some(value) = env_parse("CAPTURE_FRAME_SIZE")? {
        vad.frame_size = value;
    }

    Ok(ClientConfig {
        url: env_string("LIVE_GATEWAY_URL").unwrap_or(defaults.url),
        greeting_timeout_ms: env_parse("GREETING_TIMEOUT_MS")?
            .unwrap_or(defaults.greeting_timeout_ms),
        playback_idle_ms: env_parse("PLAYBACK_IDLE_MS")?.unwrap_or(defaults.playback_idle_ms),
        playback_sample_rate: env_parse("PLAYBACK_SAMPLE_RATE")?
            .unwrap_or(defaults.playback_sample_rate),
        health_interval_seconds: env_parse("HEALTH_INTERVAL_SECONDS")?
            .unwrap_or(defaults.health_interval_seconds),
        health_timeout_seconds: env_parse("HEALTH_TIMEOUT_SECONDS")?
            .unwrap_or(defaults.health_timeout_seconds),
        keepalive_seconds: env_parse("KEEPALIVE_SECONDS")?.unwrap_or(defaults.keepalive_seconds),
        finished_request_history: defaults.finished_request_history,
        vad,
    })
}
