//! Live session message types
//!
//! This module defines the JSON frames exchanged between the client runtime
//! and the gateway. Both directions are internally tagged on `type`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Maximum allowed size for user text (50 KB)
pub const MAX_TEXT_SIZE: usize = 50 * 1024;

/// Maximum allowed size for a base64 audio payload (2 MB)
pub const MAX_AUDIO_PAYLOAD_SIZE: usize = 2 * 1024 * 1024;

/// Sample rate assumed for `audio_chunk` frames that omit it
pub const DEFAULT_CAPTURE_SAMPLE_RATE: i64 = 16_000;

fn default_sample_rate() -> i64 {
    DEFAULT_CAPTURE_SAMPLE_RATE
}

// =============================================================================
// Incoming Messages (Client -> Gateway)
// =============================================================================

/// Frames sent by the client runtime
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Typed user message
    UserText {
        /// Message text
        text: String,
    },

    /// One chunk of captured microphone audio
    AudioChunk {
        /// Base64 encoded PCM16 little-endian mono samples
        audio: String,
        /// Sample rate of the encoded samples
        #[serde(default = "default_sample_rate")]
        sample_rate: i64,
    },

    /// Start the voice session
    LiveStart,

    /// Stop the voice session
    LiveStop,

    /// User speech interrupted agent playback
    BargeIn,

    /// User paused speaking
    SpeechPause,

    /// Keepalive
    Ping,
}

const CLIENT_MESSAGE_TYPES: &[&str] = &[
    "user_text",
    "audio_chunk",
    "live_start",
    "live_stop",
    "barge_in",
    "speech_pause",
    "ping",
];

/// Errors raised while parsing or validating a client frame.
///
/// The `Display` text is what the gateway sends back in `error{message}`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Invalid JSON payload")]
    InvalidJson,

    #[error("Payload must be a JSON object")]
    NotAnObject,

    #[error("Unsupported payload type")]
    UnsupportedType(Option<String>),

    #[error("Invalid text payload")]
    InvalidText,

    #[error("Empty message")]
    EmptyMessage,

    #[error("Invalid audio payload")]
    InvalidAudio,

    #[error("Missing audio payload")]
    MissingAudio,

    #[error("Invalid sample_rate")]
    InvalidSampleRate,

    #[error("Live session not started")]
    LiveNotStarted,

    #[error("{field} too large: {size} bytes (max: {max} bytes)")]
    TooLarge {
        field: &'static str,
        size: usize,
        max: usize,
    },
}

impl ClientMessage {
    /// Parse a text frame, classifying failures the way the gateway reports them.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let mut value: Value =
            serde_json::from_str(text).map_err(|_| ProtocolError::InvalidJson)?;
        let Some(object) = value.as_object_mut() else {
            return Err(ProtocolError::NotAnObject);
        };

        // Integer strings such as "16000" are accepted as sample rates
        if let Some(rate) = object.get_mut("sample_rate")
            && let Some(parsed) = rate.as_str().and_then(|r| r.trim().parse::<i64>().ok())
        {
            *rate = Value::from(parsed);
        }

        let kind = object.get("type").and_then(Value::as_str).map(str::to_owned);
        match kind.as_deref() {
            Some(k) if CLIENT_MESSAGE_TYPES.contains(&k) => {}
            _ => return Err(ProtocolError::UnsupportedType(kind)),
        }

        let sample_rate_is_integer = object
            .get("sample_rate")
            .is_none_or(|rate| rate.is_i64() || rate.is_u64());

        serde_json::from_value::<ClientMessage>(value).map_err(|_| match kind.as_deref() {
            Some("user_text") => ProtocolError::InvalidText,
            Some("audio_chunk") if !sample_rate_is_integer => ProtocolError::InvalidSampleRate,
            Some("audio_chunk") => ProtocolError::InvalidAudio,
            _ => ProtocolError::UnsupportedType(kind.clone()),
        })
    }

    /// Validates field sizes and values that serde cannot express.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            ClientMessage::UserText { text } => {
                if text.len() > MAX_TEXT_SIZE {
                    return Err(ProtocolError::TooLarge {
                        field: "Text",
                        size: text.len(),
                        max: MAX_TEXT_SIZE,
                    });
                }
                if text.trim().is_empty() {
                    return Err(ProtocolError::EmptyMessage);
                }
            }
            ClientMessage::AudioChunk { audio, sample_rate } => {
                if *sample_rate <= 0 || *sample_rate > u32::MAX as i64 {
                    return Err(ProtocolError::InvalidSampleRate);
                }
                if audio.is_empty() {
                    return Err(ProtocolError::MissingAudio);
                }
                if audio.len() > MAX_AUDIO_PAYLOAD_SIZE {
                    return Err(ProtocolError::TooLarge {
                        field: "Audio payload",
                        size: audio.len(),
                        max: MAX_AUDIO_PAYLOAD_SIZE,
                    });
                }
            }
            ClientMessage::LiveStart
            | ClientMessage::LiveStop
            | ClientMessage::BargeIn
            | ClientMessage::SpeechPause
            | ClientMessage::Ping => {}
        }
        Ok(())
    }
}

// =============================================================================
// Outgoing Messages (Gateway -> Client)
// =============================================================================

/// Frames sent by the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Final agent reply
    AgentResponse {
        /// Reply text
        text: String,
        /// Request the reply belongs to
        request_id: String,
    },

    /// Agent thinking / tool-call telemetry
    AgentActivity(ActivityEvent),

    /// Text the agent is speaking
    LiveText { text: String },

    /// Running transcript of the user's speech
    LiveUserText { text: String },

    /// Synthesized agent audio
    LiveAudio {
        /// Base64 encoded audio bytes
        audio: String,
        /// Transport metadata, e.g. `audio/pcm;rate=24000`
        #[serde(default)]
        mime_type: Option<String>,
    },

    /// Voice session lifecycle
    LiveStatus {
        status: LiveStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },

    /// Recoverable error
    Error { message: String },

    /// Keepalive reply
    Pong,
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    pub fn status(status: LiveStatus) -> Self {
        ServerMessage::LiveStatus { status, text: None }
    }
}

/// `live_status.status` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveStatus {
    Started,
    Stopped,
    BargeIn,
    SpeechPause,
    GreetingNoAudio,
    GreetingError,
    #[serde(other)]
    Unknown,
}

/// Lifecycle stage of an agent request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Thinking,
    ToolCall,
    ToolResult,
    Done,
}

/// Outcome of a tool call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    Error,
}

/// Tool-call progress counters for one request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    #[serde(rename = "completed_tool_calls", alias = "completed", default)]
    pub completed: u32,
    #[serde(rename = "total_tool_calls", alias = "total", default)]
    pub total: u32,
}

/// One `agent_activity` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub activity: ActivityKind,
    pub request_id: String,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ToolStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default)]
    pub progress: Progress,
}

// =============================================================================
// Message Routing
// =============================================================================

/// Routing for the per-connection sender task
#[derive(Debug)]
pub enum MessageRoute {
    /// JSON text frame
    Outgoing(ServerMessage),
    /// Close the connection
    Close,
}
