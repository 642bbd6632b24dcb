//! Microphone frame pipeline: VAD, then PCM16/base64 encoding into
//! `audio_chunk` frames.

use tokio::time::Instant;
use tracing::trace;

use super::notice::VoiceState;
use crate::core::audio::{encode_base64, encode_pcm16};
use crate::core::vad::{VADConfig, VADResult, VoiceActivityDetector, create_vad};
use crate::protocol::ClientMessage;

/// Captured audio is only forwarded while the socket is open and the
/// session is listening. Greeting playback and agent speech suppress it.
pub fn capture_allowed(socket_open: bool, voice: VoiceState) -> bool {
    socket_open && voice == VoiceState::Listening
}

pub struct CapturePipeline {
    vad: Box<dyn VoiceActivityDetector>,
    sample_rate: u32,
    frames_sent: u64,
}

impl CapturePipeline {
    pub fn new(config: VADConfig) -> anyhow::Result<Self> {
        let sample_rate = config.sample_rate;
        Ok(Self {
            vad: create_vad(config)?,
            sample_rate,
            frames_sent: 0,
        })
    }

    /// Start of a new voice session
    pub fn reset(&mut self) {
        self.vad.reset();
        self.frames_sent = 0;
    }

    pub fn analyze(&mut self, frame: &[f32], now: Instant) -> VADResult {
        self.vad.process_frame(frame, now)
    }

    pub fn encode(&mut self, frame: &[f32]) -> ClientMessage {
        self.frames_sent += 1;
        trace!(frames = self.frames_sent, samples = frame.len(), "Encoding capture frame");
        ClientMessage::AudioChunk {
            audio: encode_base64(&encode_pcm16(frame)),
            sample_rate: i64::from(self.sample_rate),
        }
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }
}
