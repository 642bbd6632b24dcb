//! Energy VAD detector implementation

use anyhow::Result;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::config::VADConfig;
use crate::core::audio::rms;

/// Result of VAD processing for a single audio frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VADResult {
    /// Raw RMS of this frame
    pub rms: f32,
    /// Smoothed energy after this frame
    pub smoothed: f32,
    /// Smoothed energy is above the speech threshold
    pub is_speech: bool,
    /// Silence has lasted past the pause duration since the last speech.
    /// Fires once per silence period.
    pub speech_paused: bool,
}

/// Trait for Voice Activity Detection implementations
pub trait VoiceActivityDetector: Send + Sync {
    /// Process a single audio frame captured at `now`
    fn process_frame(&mut self, audio: &[f32], now: Instant) -> VADResult;

    /// Reset internal state (call when starting a new audio stream)
    fn reset(&mut self);

    /// Current smoothed energy
    fn level(&self) -> f32;

    /// Speech seen and no pause emitted yet
    fn is_speaking(&self) -> bool;

    /// Get the configuration
    fn config(&self) -> &VADConfig;
}

/// RMS energy detector with exponential smoothing and pause debounce
#[derive(Debug, Clone)]
pub struct EnergyVAD {
    config: VADConfig,
    smoothed: f32,
    /// Cleared after a pause fires so it fires only once
    last_speech: Option<Instant>,
    frame_count: u64,
}

impl EnergyVAD {
    pub fn new(config: VADConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            "Energy VAD initialized: speech={:.3}, silence={:.3}, alpha={:.2}, pause={}ms",
            config.speech_threshold, config.silence_threshold, config.smoothing, config.pause_ms
        );
        Ok(Self {
            config,
            smoothed: 0.0,
            last_speech: None,
            frame_count: 0,
        })
    }
}

impl VoiceActivityDetector for EnergyVAD {
    fn process_frame(&mut self, audio: &[f32], now: Instant) -> VADResult {
        let frame_rms = rms(audio);
        let alpha = self.config.smoothing;
        self.smoothed = alpha * frame_rms + (1.0 - alpha) * self.smoothed;
        self.frame_count += 1;

        let is_speech = self.smoothed > self.config.speech_threshold;
        let mut speech_paused = false;

        if is_speech {
            self.last_speech = Some(now);
        } else if self.smoothed < self.config.silence_threshold
            && let Some(last) = self.last_speech
            && now.saturating_duration_since(last) > self.config.pause_duration()
        {
            speech_paused = true;
            self.last_speech = None;
            debug!(
                "Speech pause after {}ms of silence",
                now.saturating_duration_since(last).as_millis()
            );
        }

        trace!(
            "VAD frame {}: rms={:.4}, smoothed={:.4}, speech={}, paused={}",
            self.frame_count, frame_rms, self.smoothed, is_speech, speech_paused
        );

        VADResult {
            rms: frame_rms,
            smoothed: self.smoothed,
            is_speech,
            speech_paused,
        }
    }

    fn reset(&mut self) {
        self.smoothed = 0.0;
        self.last_speech = None;
        self.frame_count = 0;
        debug!("VAD state reset");
    }

    fn level(&self) -> f32 {
        self.smoothed
    }

    fn is_speaking(&self) -> bool {
        self.last_speech.is_some()
    }

    fn config(&self) -> &VADConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn tone(level: f32) -> Vec<f32> {
        (0..512)
            .map(|i| if i % 2 == 0 { level } else { -level })
            .collect()
    }

    #[test]
    fn test_smoothing_follows_ema() {
        let mut vad = EnergyVAD::new(VADConfig::default()).unwrap();
        let now = Instant::now();
        let first = vad.process_frame(&tone(0.5), now);
        assert!((first.smoothed - 0.1).abs() < 1e-5);
        let second = vad.process_frame(&tone(0.5), now);
        assert!((second.smoothed - 0.18).abs() < 1e-5);
    }

    #[test]
    fn test_silence_without_speech_never_pauses() {
        let mut vad = EnergyVAD::new(VADConfig::default()).unwrap();
        let start = Instant::now();
        for i in 0..100 {
            let result = vad.process_frame(&tone(0.0), start + Duration::from_millis(i * 32));
            assert!(!result.is_speech);
            assert!(!result.speech_paused);
        }
    }

    #[test]
    fn test_pause_fires_once_per_silence_period() {
        let mut vad = EnergyVAD::new(VADConfig::default()).unwrap();
        let start = Instant::now();
        let mut t = start;

        for _ in 0..10 {
            vad.process_frame(&tone(0.5), t);
            t += Duration::from_millis(32);
        }
        assert!(vad.is_speaking());

        let mut pauses = 0;
        for _ in 0..100 {
            if vad.process_frame(&tone(0.0), t).speech_paused {
                pauses += 1;
            }
            t += Duration::from_millis(32);
        }
        assert_eq!(pauses, 1);
        assert!(!vad.is_speaking());

        for _ in 0..10 {
            vad.process_frame(&tone(0.5), t);
            t += Duration::from_millis(32);
        }
        for _ in 0..100 {
            if vad.process_frame(&tone(0.0), t).speech_paused {
                pauses += 1;
            }
            t += Duration::from_millis(32);
        }
        assert_eq!(pauses, 2);
    }

    #[test]
    fn test_no_pause_before_duration_elapses() {
        let config = VADConfig {
            smoothing: 1.0,
            ..Default::default()
        };
        let mut vad = EnergyVAD::new(config).unwrap();
        let start = Instant::now();
        assert!(vad.process_frame(&tone(0.5), start).is_speech);

        let early = vad.process_frame(&tone(0.0), start + Duration::from_millis(600));
        assert!(!early.speech_paused);

        let late = vad.process_frame(&tone(0.0), start + Duration::from_millis(700));
        assert!(late.speech_paused);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut vad = EnergyVAD::new(VADConfig::default()).unwrap();
        vad.process_frame(&tone(0.9), Instant::now());
        vad.reset();
        assert_eq!(vad.level(), 0.0);
        assert!(!vad.is_speaking());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = VADConfig {
            silence_threshold: 0.5,
            speech_threshold: 0.1,
            ..Default::default()
        };
        assert!(EnergyVAD::new(config).is_err());
    }
}
