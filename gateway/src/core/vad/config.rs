//! VAD configuration types

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for energy-based voice activity detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VADConfig {
    /// Smoothed RMS above this value counts as speech
    pub speech_threshold: f32,

    /// Smoothed RMS below this value counts as silence.
    /// Must stay below `speech_threshold` so the boundary does not chatter.
    pub silence_threshold: f32,

    /// EMA weight of the newest frame (0.0 - 1.0]
    pub smoothing: f32,

    /// Silence after speech longer than this emits one pause signal (ms)
    pub pause_ms: u64,

    /// Capture sample rate (Hz)
    pub sample_rate: u32,

    /// Frame size in samples
    pub frame_size: usize,
}

impl Default for VADConfig {
    fn default() -> Self {
        Self {
            speech_threshold: 0.035,
            silence_threshold: 0.015,
            smoothing: 0.2,
            pause_ms: 650,
            sample_rate: 16000,
            frame_size: 2048,
        }
    }
}

impl VADConfig {
    /// Create a new VADConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause_duration(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }

    /// Calculate frame duration in milliseconds
    pub fn frame_duration_ms(&self) -> f32 {
        (self.frame_size as f32 / self.sample_rate as f32) * 1000.0
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.speech_threshold) {
            anyhow::bail!("VAD speech_threshold must be between 0.0 and 1.0");
        }
        if self.silence_threshold < 0.0 {
            anyhow::bail!("VAD silence_threshold must not be negative");
        }
        if self.silence_threshold >= self.speech_threshold {
            anyhow::bail!(
                "VAD silence_threshold ({}) must be lower than speech_threshold ({})",
                self.silence_threshold,
                self.speech_threshold
            );
        }
        if self.smoothing <= 0.0 || self.smoothing > 1.0 {
            anyhow::bail!("VAD smoothing must be in (0.0, 1.0]");
        }
        if self.pause_ms == 0 {
            anyhow::bail!("VAD pause_ms must be greater than 0");
        }
        if self.sample_rate == 0 {
            anyhow::bail!("VAD sample_rate must be greater than 0");
        }
        if self.frame_size == 0 {
            anyhow::bail!("VAD frame_size must be greater than 0");
        }
        Ok(())
    }
}
