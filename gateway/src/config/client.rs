//! Client runtime configuration

use std::path::Path;
use std::time::Duration;

use super::{ConfigError, merge, validation, yaml};
use crate::core::audio::DEFAULT_PLAYBACK_SAMPLE_RATE;
use crate::core::vad::VADConfig;

/// Settings for [`crate::client::LiveClient`]
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Gateway WebSocket URL (`ws://` or `wss://`)
    pub url: String,

    /// How long to wait for greeting audio before unlocking capture
    pub greeting_timeout_ms: u64,

    /// Quiet period after the playback queue drains before speech is over
    pub playback_idle_ms: u64,

    /// Rate assumed for `live_audio` without a `rate=` mime parameter
    pub playback_sample_rate: u32,

    pub health_interval_seconds: u64,
    pub health_timeout_seconds: u64,

    /// Interval between `ping` frames on an open socket
    pub keepalive_seconds: u64,

    /// Finished request ids remembered to ignore late activity events
    pub finished_request_history: usize,

    /// Capture VAD; `vad.sample_rate` is also the capture rate
    pub vad: VADConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080/ws".to_string(),
            greeting_timeout_ms: 20_000,
            playback_idle_ms: 350,
            playback_sample_rate: DEFAULT_PLAYBACK_SAMPLE_RATE,
            health_interval_seconds: 30,
            health_timeout_seconds: 5,
            keepalive_seconds: 25,
            finished_request_history: 32,
            vad: VADConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = merge::merge_client(None)?;
        validation::validate_client(&config)?;
        Ok(config)
    }

    /// Load configuration from the `client` and `vad` sections of a YAML
    /// file, on top of environment variables
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_client(Some(&yaml_config))?;
        validation::validate_client(&config)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate_client(self)
    }

    pub fn greeting_timeout(&self) -> Duration {
        Duration::from_millis(self.greeting_timeout_ms)
    }

    pub fn playback_idle(&self) -> Duration {
        Duration::from_millis(self.playback_idle_ms)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_seconds)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_seconds)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_seconds)
    }

    pub fn capture_sample_rate(&self) -> u32 {
        self.vad.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    fn cleanup_env_vars() {
        unsafe {
            env::remove_var("LIVE_GATEWAY_URL");
            env::remove_var("GREETING_TIMEOUT_MS");
            env::remove_var("PLAYBACK_IDLE_MS");
            env::remove_var("VAD_SPEECH_THRESHOLD");
            env::remove_var("VAD_SILENCE_THRESHOLD");
            env::remove_var("VAD_PAUSE_MS");
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.greeting_timeout(), Duration::from_secs(20));
        assert_eq!(config.capture_sample_rate(), 16000);
    }

    #[test]
    fn test_rejects_http_url() {
        let config = ClientConfig {
            url: "http://127.0.0.1:8080/ws".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_timeouts() {
        let config = ClientConfig {
            playback_idle_ms: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("playback_idle_ms"));
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_inverted_vad_thresholds() {
        cleanup_env_vars();
        unsafe {
            env::set_var("VAD_SPEECH_THRESHOLD", "0.01");
            env::set_var("VAD_SILENCE_THRESHOLD", "0.02");
        }

        let err = ClientConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("silence_threshold"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("client.yaml");
        fs::write(
            &config_path,
            "client:\n  url: \"wss://gateway.example.com/ws\"\nvad:\n  pause_ms: 500\n",
        )
        .unwrap();

        unsafe {
            env::set_var("LIVE_GATEWAY_URL", "ws://localhost:1/ws");
            env::set_var("GREETING_TIMEOUT_MS", "5000");
        }

        let config = ClientConfig::from_file(&config_path).unwrap();
        assert_eq!(config.url, "wss://gateway.example.com/ws");
        assert_eq!(config.greeting_timeout_ms, 5000);
        assert_eq!(config.vad.pause_ms, 500);

        cleanup_env_vars();
    }
}
