//! Wire protocol shared by the gateway and the client runtime
//!
//! Every frame is a JSON object tagged by its `type` field and travels over a
//! single persistent WebSocket.
//!
//! ## Client → Gateway
//!
//! - **user_text**: Typed user message
//! - **audio_chunk**: Base64 PCM16 mono microphone audio with its sample rate
//! - **live_start** / **live_stop**: Open or close the voice session
//! - **barge_in**: User interrupted agent speech
//! - **speech_pause**: User stopped talking, the gateway may answer
//! - **ping**: Keepalive
//!
//! ## Gateway → Client
//!
//! - **agent_response**: Final agent reply for a request
//! - **agent_activity**: Thinking / tool-call telemetry for a request
//! - **live_text** / **live_user_text**: Agent speech text and user transcript
//! - **live_audio**: Base64 synthesized audio
//! - **live_status**: Voice session lifecycle
//! - **error**: Recoverable error, the connection stays open
//! - **pong**: Keepalive reply

pub mod messages;

pub use messages::{
    ActivityEvent, ActivityKind, ClientMessage, DEFAULT_CAPTURE_SAMPLE_RATE, LiveStatus,
    MAX_AUDIO_PAYLOAD_SIZE, MAX_TEXT_SIZE, MessageRoute, Progress, ProtocolError, ServerMessage,
    ToolStatus,
};
