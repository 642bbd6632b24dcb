//! Audio output and local speech collaborators
//!
//! The runtime does not own a sound device. Playback goes through an
//! [`AudioSink`] and greeting fallback speech through a
//! [`SpeechSynthesizer`]; both must return promptly once `stop` is cancelled.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::error::ClientResult;
use crate::core::audio::duration_of;

#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Play mono samples to completion, or until `stop` is cancelled.
    async fn play(&self, samples: Vec<f32>, sample_rate: u32, stop: CancellationToken)
    -> ClientResult<()>;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak `text` locally, returning when speech ends or `stop` is cancelled.
    async fn speak(&self, text: &str, stop: CancellationToken) -> ClientResult<()>;
}

pub type SharedSink = Arc<dyn AudioSink>;
pub type SharedSynthesizer = Arc<dyn SpeechSynthesizer>;

/// Discards audio but takes as long as real playback would
#[derive(Debug, Default, Clone)]
pub struct NullSink;

#[async_trait]
impl AudioSink for NullSink {
    async fn play(
        &self,
        samples: Vec<f32>,
        sample_rate: u32,
        stop: CancellationToken,
    ) -> ClientResult<()> {
        let duration = duration_of(samples.len(), sample_rate);
        tokio::select! {
            _ = stop.cancelled() => debug!("Playback stopped early"),
            _ = tokio::time::sleep(duration) => {}
        }
        Ok(())
    }
}

/// Logs the text and waits roughly as long as reading it aloud would take
#[derive(Debug, Clone)]
pub struct LogSynthesizer {
    per_word: Duration,
}

impl LogSynthesizer {
    pub fn new(per_word: Duration) -> Self {
        Self { per_word }
    }
}

impl Default for LogSynthesizer {
    fn default() -> Self {
        Self::new(Duration::from_millis(350))
    }
}

#[async_trait]
impl SpeechSynthesizer for LogSynthesizer {
    async fn speak(&self, text: &str, stop: CancellationToken) -> ClientResult<()> {
        info!(text = %text, "Speaking fallback text");
        let words = text.split_whitespace().count().max(1) as u32;
        tokio::select! {
            _ = stop.cancelled() => debug!("Fallback speech stopped early"),
            _ = tokio::time::sleep(self.per_word * words) => {}
        }
        Ok(())
    }
}
