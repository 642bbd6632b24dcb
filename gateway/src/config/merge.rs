use url::Url;

use super::client::ClientConfig;
use super::env::{client_from_env, server_from_env};
use super::yaml::YamlConfig;
use super::{ConfigError, ServerConfig};

/// Environment values (with defaults) overridden by whatever the YAML sets
pub(crate) fn merge_server(yaml: Option<&YamlConfig>) -> Result<ServerConfig, ConfigError> {
    let mut config = server_from_env()?;
    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = &yaml.server {
        if let Some(host) = &server.host {
            config.host = host.clone();
        }
        if let Some(port) = server.port {
            config.port = port;
        }
    }

    if let Some(security) = &yaml.security
        && let Some(origins) = &security.cors_allowed_origins
    {
        config.cors_allowed_origins = Some(origins.clone());
    }

    if let Some(agent) = &yaml.agent {
        if let Some(url) = &agent.url {
            let parsed = Url::parse(url)
                .map_err(|e| ConfigError::Invalid(format!("agent.url '{url}': {e}")))?;
            config.agent_url = Some(parsed);
        }
        if let Some(timeout) = agent.timeout_seconds {
            config.agent_timeout_seconds = timeout;
        }
        if let Some(prefix) = &agent.user_id_prefix {
            config.user_id_prefix = prefix.clone();
        }
    }

    if let Some(live) = &yaml.live {
        if let Some(text) = &live.greeting_text {
            config.greeting_text = text.clone();
        }
        if let Some(idle) = live.idle_timeout_seconds {
            config.idle_timeout_seconds = idle;
        }
        if let Some(cooldown) = live.response_cooldown_ms {
            config.response_cooldown_ms = cooldown;
        }
    }

    if let Some(tools) = &yaml.tools {
        config.tool_display = tools.clone();
    }

    Ok(config)
}

pub(crate) fn merge_client(yaml: Option<&YamlConfig>) -> Result<ClientConfig, ConfigError> {
    let mut config = client_from_env()?;
    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(client) = &yaml.client {
        if let Some(url) = &client.url {
            config.url = url.clone();
        }
        if let Some(value) = client.greeting_timeout_ms {
            config.greeting_timeout_ms = value;
        }
        if let Some(value) = client.playback_idle_ms {
            config.playback_idle_ms = value;
        }
        if let Some(value) = client.playback_sample_rate {
            config.playback_sample_rate = value;
        }
        if let Some(value) = client.health_interval_seconds {
            config.health_interval_seconds = value;
        }
        if let Some(value) = client.health_timeout_seconds {
            config.health_timeout_seconds = value;
        }
        if let Some(value) = client.keepalive_seconds {
            config.keepalive_seconds = value;
        }
    }

    if let Some(vad) = &yaml.vad {
        if let Some(value) = vad.speech_threshold {
            config.vad.speech_threshold = value;
        }
        if let Some(value) = vad.silence_threshold {
            config.vad.silence_threshold = value;
        }
        if let Some(value) = vad.smoothing {
            config.vad.smoothing = value;
        }
        if let Some(value) = vad.pause_ms {
            config.vad.pause_ms = value;
        }
        if let Some(value) = vad.sample_rate {
            config.vad.sample_rate = value;
        }
        if let Some(value) = vad.frame_size {
            config.vad.frame_size = value;
        }
    }

    Ok(config)
}
