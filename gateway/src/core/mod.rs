pub mod agent;
pub mod audio;
pub mod speech;
pub mod vad;

// Re-export commonly used types for convenience
pub use agent::{
    AgentBackend, AgentError, AgentEvent, AgentReply, AgentResult, EchoAgentBackend,
    HttpAgentBackend, SharedAgent, ToolDisplayMap, query_agent,
};

pub use audio::{AudioError, decode_pcm16, encode_pcm16, rms, sample_rate_from_mime};

pub use speech::{
    AudioInput, NullSpeechModel, SharedSpeech, SpeechError, SpeechModel, SpeechResult,
    SynthesizedAudio,
};

pub use vad::{EnergyVAD, VADConfig, VADResult, VoiceActivityDetector};
