//! Events reported by the client runtime to its owner

use serde::Serialize;

use super::activity::ActivityView;
use super::health::HealthSample;
use crate::protocol::LiveStatus;

/// Socket lifecycle as seen by the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Error,
}

/// Why the socket closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// `disconnect()` was called; no error should be shown
    UserRequested,
    /// A socket error preceded the close
    AfterError,
    /// The peer went away without an error
    Unexpected,
}

/// Voice session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceState {
    Idle,
    /// Capture is suppressed until the greeting has played
    AwaitingGreeting,
    Listening,
    /// Agent audio is playing; user speech barges in
    Speaking,
}

/// How the greeting gate was released
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GreetingUnlock {
    /// Greeting audio arrived and finished playing
    Played,
    /// Local fallback speech finished
    Fallback,
    /// Gateway reported a failure and no greeting text was known
    NoText,
    /// Nothing arrived in time; capture was released without a greeting
    TimedOut,
}

/// Why a `send_text` call was refused locally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextRejection {
    NotConnected,
    Empty,
    RequestInFlight,
}

/// Notifications emitted by [`super::LiveClient`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientNotice {
    ConnectionChanged {
        state: ConnectionState,
        generation: u64,
    },
    Connected {
        generation: u64,
        reconnect_count: u32,
    },
    Disconnected {
        reason: CloseReason,
    },
    /// Error received from the socket itself
    SocketError {
        message: String,
    },
    VoiceChanged {
        state: VoiceState,
    },
    TextRejected {
        reason: TextRejection,
    },
    AgentResponse {
        request_id: String,
        text: String,
    },
    Activity {
        view: ActivityView,
    },
    /// Agent speech text (`live_text`)
    AgentText {
        text: String,
    },
    /// Running user transcript (`live_user_text`)
    UserTranscript {
        text: String,
    },
    LiveStatus {
        status: LiveStatus,
    },
    GreetingUnlocked {
        how: GreetingUnlock,
    },
    BargeIn,
    /// Smoothed capture level for visualization
    AudioLevel {
        level: f32,
    },
    Health {
        sample: HealthSample,
    },
    /// `error{message}` frame from the gateway
    GatewayError {
        message: String,
    },
    PlaybackFailed {
        message: String,
    },
}
