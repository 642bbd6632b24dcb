pub mod base;
pub mod null;

pub use base::{
    AudioInput, SPEECH_CHANNEL_BUFFER, SharedSpeech, SpeechError, SpeechModel, SpeechResult,
    SynthesizedAudio,
};
pub use null::NullSpeechModel;
