//! Speech model that produces nothing
//!
//! Synthesis yields no audio and transcription drains its input without
//! emitting text. Voice sessions still run end to end: greetings take the
//! `greeting_no_audio` path and clients fall back to local speech.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::base::{AudioInput, SpeechModel, SpeechResult, SynthesizedAudio};

#[derive(Debug, Clone, Copy, Default)]
pub struct NullSpeechModel;

#[async_trait]
impl SpeechModel for NullSpeechModel {
    async fn synthesize(
        &self,
        text: &str,
    ) -> SpeechResult<mpsc::Receiver<SpeechResult<SynthesizedAudio>>> {
        debug!("Null speech model skipping synthesis of {} chars", text.len());
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }

    async fn transcribe(
        &self,
        mut audio: mpsc::Receiver<AudioInput>,
    ) -> SpeechResult<mpsc::Receiver<String>> {
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            let mut bytes = 0usize;
            while let Some(chunk) = audio.recv().await {
                bytes += chunk.data.len();
            }
            debug!("Null speech model discarded {} bytes of audio", bytes);
            drop(tx);
        });
        Ok(rx)
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_synthesize_yields_nothing() {
        let mut rx = NullSpeechModel.synthesize("hello").await.unwrap();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_transcribe_ends_when_input_closes() {
        let (audio_tx, audio_rx) = mpsc::channel(crate::core::speech::SPEECH_CHANNEL_BUFFER);
        let mut text_rx = NullSpeechModel.transcribe(audio_rx).await.unwrap();
        audio_tx
            .send(AudioInput {
                data: Bytes::from_static(&[0, 0]),
                sample_rate: 16000,
            })
            .await
            .unwrap();
        drop(audio_tx);
        assert!(text_rx.recv().await.is_none());
    }
}
