//! Base traits and types for the real-time speech model.
//!
//! The speech model is an opaque upstream service that transcribes captured
//! user audio and synthesizes agent speech. The gateway only needs the two
//! streaming operations defined here.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Buffer size for speech channels
pub const SPEECH_CHANNEL_BUFFER: usize = 256;

/// Errors that can occur during speech operations.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    /// Synthesis task was aborted, e.g. by barge-in
    #[error("Synthesis cancelled")]
    Cancelled,
}

/// Result type for speech operations.
pub type SpeechResult<T> = Result<T, SpeechError>;

/// One captured chunk forwarded for transcription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioInput {
    /// PCM16 little-endian mono
    pub data: Bytes,
    pub sample_rate: u32,
}

/// One chunk of synthesized speech
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    pub data: Bytes,
    /// Transport metadata such as `audio/pcm;rate=24000`
    pub mime_type: Option<String>,
}

#[async_trait]
pub trait SpeechModel: Send + Sync {
    /// Synthesize `text`. The returned stream ends when synthesis is complete.
    async fn synthesize(
        &self,
        text: &str,
    ) -> SpeechResult<mpsc::Receiver<SpeechResult<SynthesizedAudio>>>;

    /// Transcribe audio until `audio` closes, yielding text fragments.
    async fn transcribe(
        &self,
        audio: mpsc::Receiver<AudioInput>,
    ) -> SpeechResult<mpsc::Receiver<String>>;

    /// Model name used in logs
    fn name(&self) -> &'static str;
}

/// Shared speech model handle stored in application state
pub type SharedSpeech = Arc<dyn SpeechModel>;
