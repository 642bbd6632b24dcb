//! Base traits and types for conversational agent backends.
//!
//! The gateway forwards user text and voice transcripts to an agent backend and
//! consumes its streamed reply. A reply is a sequence of [`AgentEvent`]s: text
//! fragments interleaved with function calls and their responses.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Buffer size for agent event channels
pub const AGENT_EVENT_BUFFER: usize = 64;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while querying an agent.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Backend is not configured
    #[error("Agent not configured: {0}")]
    NotConfigured(String),

    /// Request could not be sent
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Backend answered with a non-success status
    #[error("Agent request failed ({status}): {body}")]
    RequestFailed { status: u16, body: String },

    /// Reply stream broke mid-way
    #[error("Stream error: {0}")]
    Stream(String),

    /// An event could not be decoded
    #[error("Invalid agent event: {0}")]
    InvalidEvent(String),
}

/// Result type for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

// =============================================================================
// Events
// =============================================================================

/// One unit of a streamed agent reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Reply text fragment
    Text { text: String },
    /// Agent invoked a tool
    FunctionCall { name: String },
    /// Tool returned
    FunctionResponse {
        name: String,
        #[serde(default)]
        response: Value,
    },
}

impl AgentEvent {
    pub fn text(text: impl Into<String>) -> Self {
        AgentEvent::Text { text: text.into() }
    }

    /// Extract events from one agent content record.
    ///
    /// Records look like `{"content": {"parts": [...]}}` where each part is one
    /// of `{"text": ..}`, `{"function_call": {"name": ..}}` or
    /// `{"function_response": {"name": .., "response": {..}}}`. Parts that match
    /// none of these are skipped.
    pub fn from_content(record: &Value) -> Vec<AgentEvent> {
        let Some(parts) = record
            .get("content")
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
        else {
            return Vec::new();
        };

        let mut events = Vec::with_capacity(parts.len());
        for part in parts {
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                events.push(AgentEvent::text(text));
            } else if let Some(call) = part.get("function_call") {
                events.push(AgentEvent::FunctionCall {
                    name: tool_name(call),
                });
            } else if let Some(response) = part.get("function_response") {
                events.push(AgentEvent::FunctionResponse {
                    name: tool_name(response),
                    response: response
                        .get("response")
                        .cloned()
                        .unwrap_or_else(|| Value::Object(Default::default())),
                });
            }
        }
        events
    }
}

fn tool_name(value: &Value) -> String {
    value
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string()
}

// =============================================================================
// Backend Trait
// =============================================================================

/// A conversational agent reachable by the gateway.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Start a query and return the receiving end of its event stream.
    ///
    /// The stream ends when the sender is dropped. A stream error is delivered
    /// as an `Err` item and ends the reply.
    async fn stream_query(
        &self,
        user_id: &str,
        message: &str,
    ) -> AgentResult<mpsc::Receiver<AgentResult<AgentEvent>>>;

    /// Backend name used in logs
    fn name(&self) -> &'static str;
}

/// Shared agent handle stored in application state
pub type SharedAgent = Arc<dyn AgentBackend>;
