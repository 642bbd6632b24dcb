//! HTTP agent backend
//!
//! POSTs `{"user_id", "message"}` to a configured endpoint and reads the reply
//! as newline-delimited JSON content records (see [`AgentEvent::from_content`]).

use async_trait::async_trait;
use futures_util::TryStreamExt;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use super::base::{AGENT_EVENT_BUFFER, AgentBackend, AgentError, AgentEvent, AgentResult};

/// Agent reachable over HTTP with a streamed NDJSON reply
pub struct HttpAgentBackend {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpAgentBackend {
    pub fn new(endpoint: Url, connect_timeout: Duration) -> AgentResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| AgentError::NotConfigured(e.to_string()))?;
        info!(endpoint = %endpoint, "HTTP agent backend configured");
        Ok(Self { client, endpoint })
    }
}

/// Decode complete lines from `buffer`, leaving any partial trailing line.
fn drain_lines(buffer: &mut String) -> Vec<AgentResult<AgentEvent>> {
    let mut out = Vec::new();
    while let Some(newline_pos) = buffer.find('\n') {
        let line: String = buffer.drain(..=newline_pos).collect();
        out.extend(decode_line(&line));
    }
    out
}

fn decode_line(line: &str) -> Vec<AgentResult<AgentEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Value>(line) {
        Ok(record) => AgentEvent::from_content(&record).into_iter().map(Ok).collect(),
        Err(e) => vec![Err(AgentError::InvalidEvent(e.to_string()))],
    }
}

#[async_trait]
impl AgentBackend for HttpAgentBackend {
    async fn stream_query(
        &self,
        user_id: &str,
        message: &str,
    ) -> AgentResult<mpsc::Receiver<AgentResult<AgentEvent>>> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&json!({ "user_id": user_id, "message": message }))
            .send()
            .await
            .map_err(|e| AgentError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AgentError::RequestFailed {
                status: status.as_u16(),
                body,
            });
        }

        let (tx, rx) = mpsc::channel(AGENT_EVENT_BUFFER);
        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buffer = String::new();

            loop {
                let chunk = match stream.try_next().await {
                    Ok(Some(chunk)) => chunk,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Agent reply stream failed: {}", e);
                        let _ = tx.send(Err(AgentError::Stream(e.to_string()))).await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                for event in drain_lines(&mut buffer) {
                    if tx.send(event).await.is_err() {
                        debug!("Agent event receiver dropped");
                        return;
                    }
                }
            }

            for event in decode_line(&buffer) {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        });

        Ok(rx)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
