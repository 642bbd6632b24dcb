//! Agent query relay
//!
//! Runs one agent query and narrates it to the client as `agent_activity`
//! events: one `thinking`, a `tool_call`/`tool_result` per tool invocation and
//! exactly one `done`, all tagged with a fresh request id.

use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::base::{AgentBackend, AgentError, AgentEvent};
use super::tools::{ToolDisplayMap, extract_error_detail, is_error_response};
use crate::protocol::{ActivityEvent, ActivityKind, MessageRoute, Progress, ServerMessage, ToolStatus};

const THINKING_ICON: &str = "brain";
const DONE_ICON: &str = "check-circle-2";

/// Final text of a completed query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReply {
    pub request_id: String,
    pub text: String,
}

impl AgentReply {
    pub fn into_message(self) -> ServerMessage {
        ServerMessage::AgentResponse {
            text: self.text,
            request_id: self.request_id,
        }
    }
}

/// `req-` followed by 10 hex characters
pub fn new_request_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("req-{}", &hex[..10])
}

async fn emit(tx: &mpsc::Sender<MessageRoute>, event: ActivityEvent) {
    // Client may already be gone
    let _ = tx
        .send(MessageRoute::Outgoing(ServerMessage::AgentActivity(event)))
        .await;
}

/// Query `agent` and stream its activity to `tx`.
///
/// `done` is emitted even when the agent fails, so the client never stays in
/// flight; the error is returned for the caller to report.
pub async fn query_agent(
    agent: &dyn AgentBackend,
    tools: &ToolDisplayMap,
    user_id: &str,
    message: &str,
    tx: &mpsc::Sender<MessageRoute>,
) -> Result<AgentReply, AgentError> {
    let request_id = new_request_id();
    let mut progress = Progress::default();
    let mut chunks: Vec<String> = Vec::new();

    debug!(request_id = %request_id, agent = agent.name(), "Querying agent");
    emit(
        tx,
        ActivityEvent {
            activity: ActivityKind::Thinking,
            request_id: request_id.clone(),
            tool: None,
            icon: Some(THINKING_ICON.to_string()),
            message: "Analyzing request...".to_string(),
            status: None,
            detail: None,
            progress,
        },
    )
    .await;

    let outcome = match agent.stream_query(user_id, message).await {
        Ok(mut events) => {
            let mut failure = None;
            while let Some(event) = events.recv().await {
                match event {
                    Ok(AgentEvent::Text { text }) => chunks.push(text),
                    Ok(AgentEvent::FunctionCall { name }) => {
                        progress.total += 1;
                        emit(
                            tx,
                            ActivityEvent {
                                activity: ActivityKind::ToolCall,
                                request_id: request_id.clone(),
                                icon: Some(tools.icon(&name)),
                                message: tools.label(&name),
                                tool: Some(name),
                                status: None,
                                detail: None,
                                progress,
                            },
                        )
                        .await;
                    }
                    Ok(AgentEvent::FunctionResponse { name, response }) => {
                        progress.completed += 1;
                        let failed = is_error_response(&response);
                        let (status, suffix, detail) = if failed {
                            (ToolStatus::Error, "failed", extract_error_detail(&response))
                        } else {
                            (ToolStatus::Success, "done", None)
                        };
                        emit(
                            tx,
                            ActivityEvent {
                                activity: ActivityKind::ToolResult,
                                request_id: request_id.clone(),
                                icon: None,
                                message: format!("{} - {}", tools.label(&name), suffix),
                                tool: Some(name),
                                status: Some(status),
                                detail,
                                progress,
                            },
                        )
                        .await;
                    }
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }
            failure.map_or(Ok(()), Err)
        }
        Err(e) => Err(e),
    };

    if let Err(e) = &outcome {
        warn!(request_id = %request_id, "Agent query failed: {}", e);
    }

    emit(
        tx,
        ActivityEvent {
            activity: ActivityKind::Done,
            request_id: request_id.clone(),
            tool: None,
            icon: Some(DONE_ICON.to_string()),
            message: "Analysis complete".to_string(),
            status: None,
            detail: None,
            progress,
        },
    )
    .await;

    outcome.map(|()| AgentReply {
        request_id,
        text: chunks.concat().trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::agent::base::AgentResult;
    use crate::core::agent::echo::EchoAgentBackend;
    use async_trait::async_trait;
    use serde_json::json;

    struct ScriptedAgent(Vec<AgentResult<AgentEvent>>);

    #[async_trait]
    impl AgentBackend for ScriptedAgent {
        async fn stream_query(
            &self,
            _user_id: &str,
            _message: &str,
        ) -> AgentResult<mpsc::Receiver<AgentResult<AgentEvent>>> {
            let (tx, rx) = mpsc::channel(16);
            for event in &self.0 {
                let event = match event {
                    Ok(e) => Ok(e.clone()),
                    Err(e) => Err(AgentError::Stream(e.to_string())),
                };
                tx.send(event).await.unwrap();
            }
            Ok(rx)
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn drain(rx: &mut mpsc::Receiver<MessageRoute>) -> Vec<ActivityEvent> {
        let mut out = Vec::new();
        while let Ok(route) = rx.try_recv() {
            if let MessageRoute::Outgoing(ServerMessage::AgentActivity(event)) = route {
                out.push(event);
            }
        }
        out
    }

    #[test]
    fn test_request_id_format() {
        let id = new_request_id();
        assert!(id.starts_with("req-"));
        assert_eq!(id.len(), 14);
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_activity_sequence_and_progress() {
        let agent = ScriptedAgent(vec![
            Ok(AgentEvent::FunctionCall {
                name: "lookup".to_string(),
            }),
            Ok(AgentEvent::FunctionResponse {
                name: "lookup".to_string(),
                response: json!({"status": "error", "error": {"message": "not found"}}),
            }),
            Ok(AgentEvent::text(" Sorry, ")),
            Ok(AgentEvent::text("nothing. ")),
        ]);
        let (tx, mut rx) = mpsc::channel(32);
        let reply = query_agent(&agent, &ToolDisplayMap::new(), "u", "q", &tx)
            .await
            .unwrap();
        assert_eq!(reply.text, "Sorry, nothing.");

        let events = drain(&mut rx);
        let kinds: Vec<_> = events.iter().map(|e| e.activity).collect();
        assert_eq!(
            kinds,
            vec![
                ActivityKind::Thinking,
                ActivityKind::ToolCall,
                ActivityKind::ToolResult,
                ActivityKind::Done
            ]
        );
        assert!(events.iter().all(|e| e.request_id == reply.request_id));
        assert_eq!(events[0].icon.as_deref(), Some("brain"));
        assert_eq!(events[1].icon.as_deref(), Some("wrench"));
        assert_eq!(events[1].progress, Progress { completed: 0, total: 1 });
        assert_eq!(events[2].status, Some(ToolStatus::Error));
        assert_eq!(events[2].detail.as_deref(), Some("not found"));
        assert_eq!(events[2].message, "Running lookup - failed");
        assert_eq!(events[3].progress, Progress { completed: 1, total: 1 });
        assert_eq!(events[3].icon.as_deref(), Some("check-circle-2"));
    }

    #[tokio::test]
    async fn test_failure_still_emits_done() {
        let agent = ScriptedAgent(vec![
            Ok(AgentEvent::FunctionCall {
                name: "lookup".to_string(),
            }),
            Err(AgentError::Stream("reset".to_string())),
        ]);
        let (tx, mut rx) = mpsc::channel(32);
        let result = query_agent(&agent, &ToolDisplayMap::new(), "u", "q", &tx).await;
        assert!(matches!(result, Err(AgentError::Stream(_))));

        let events = drain(&mut rx);
        assert_eq!(events.last().map(|e| e.activity), Some(ActivityKind::Done));
        assert_eq!(
            events.iter().filter(|e| e.activity == ActivityKind::Done).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_success_result_has_no_detail() {
        let agent = EchoAgentBackend::new().with_tool("notify");
        let mut tools = ToolDisplayMap::new();
        tools.insert("notify", "Sending notification", "bell");
        let (tx, mut rx) = mpsc::channel(32);
        let reply = query_agent(&agent, &tools, "u", "ping", &tx).await.unwrap();
        assert_eq!(reply.text, "You said: ping");

        let events = drain(&mut rx);
        assert_eq!(events[1].icon.as_deref(), Some("bell"));
        assert_eq!(events[2].status, Some(ToolStatus::Success));
        assert_eq!(events[2].detail, None);
        assert_eq!(events[2].message, "Sending notification - done");
    }
}
