//! Live session WebSocket handlers
//!
//! One persistent connection carries typed text, streamed microphone audio,
//! synthesized agent audio, agent activity telemetry and keepalives.
//!
//! # Protocol
//!
//! ## Client → Gateway
//!
//! - **user_text**: Typed message for the agent
//! - **audio_chunk**: Base64 PCM16 microphone audio with its sample rate
//! - **live_start** / **live_stop**: Start or stop the voice session
//! - **barge_in**: User interrupted agent speech
//! - **speech_pause**: User stopped speaking
//! - **ping**: Keepalive
//!
//! ## Gateway → Client
//!
//! - **agent_response**: Final reply for a request
//! - **agent_activity**: thinking / tool_call / tool_result / done telemetry
//! - **live_text** / **live_user_text**: Agent speech text and user transcript
//! - **live_audio**: Synthesized agent speech
//! - **live_status**: Voice session lifecycle
//! - **error**: Recoverable error
//! - **pong**: Keepalive reply

mod handler;
pub mod session;

pub use handler::live_handler;
pub use session::LiveSession;
