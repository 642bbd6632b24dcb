//! Echo agent backend for local development
//!
//! Replies with the user's message. When `tool` is set each reply is preceded
//! by a simulated call to that tool so activity telemetry can be exercised
//! without a real agent.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;

use super::base::{AGENT_EVENT_BUFFER, AgentBackend, AgentEvent, AgentResult};

#[derive(Debug, Clone, Default)]
pub struct EchoAgentBackend {
    tool: Option<String>,
    delay: Duration,
}

impl EchoAgentBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a call to `tool` before each reply
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    /// Pause between events
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl AgentBackend for EchoAgentBackend {
    async fn stream_query(
        &self,
        _user_id: &str,
        message: &str,
    ) -> AgentResult<mpsc::Receiver<AgentResult<AgentEvent>>> {
        let mut events = Vec::new();
        if let Some(tool) = &self.tool {
            events.push(AgentEvent::FunctionCall { name: tool.clone() });
            events.push(AgentEvent::FunctionResponse {
                name: tool.clone(),
                response: json!({ "status": "success" }),
            });
        }
        events.push(AgentEvent::text(format!("You said: {}", message.trim())));

        let (tx, rx) = mpsc::channel(AGENT_EVENT_BUFFER);
        let delay = self.delay;
        tokio::spawn(async move {
            for event in events {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if tx.send(Ok(event)).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }

    fn name(&self) -> &'static str {
        "echo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_reply() {
        let agent = EchoAgentBackend::new();
        let mut rx = agent.stream_query("u", " hello ").await.unwrap();
        let event = rx.recv().await.unwrap().unwrap();
        assert_eq!(event, AgentEvent::text("You said: hello"));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_echo_with_tool() {
        let agent = EchoAgentBackend::new().with_tool("lookup");
        let mut rx = agent.stream_query("u", "hi").await.unwrap();
        let mut kinds = Vec::new();
        while let Some(event) = rx.recv().await {
            kinds.push(event.unwrap());
        }
        assert_eq!(kinds.len(), 3);
        assert!(matches!(kinds[0], AgentEvent::FunctionCall { .. }));
        assert!(matches!(kinds[1], AgentEvent::FunctionResponse { .. }));
    }
}
