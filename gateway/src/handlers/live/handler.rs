//! Live session WebSocket handler
//!
//! Every frame is a JSON object tagged with `type`. Malformed frames are
//! answered with `error{message}` and the connection stays open.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::{select, time::Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::protocol::{ClientMessage, LiveStatus, MessageRoute, ProtocolError, ServerMessage};
use crate::state::AppState;

use super::session::LiveSession;

/// Channel buffer size for outgoing frames
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (4 MB)
const MAX_WS_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// Maximum WebSocket message size (4 MB)
const MAX_WS_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Upper bound on how often idle connections are checked
const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Time allowed for queued frames to flush after the loop ends
const SENDER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Live WebSocket handler
///
/// Upgrades the HTTP connection to WebSocket for mixed text/voice sessions.
pub async fn live_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    debug!("Live WebSocket connection upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_live_socket(socket, state))
}

fn conversation_user_id(prefix: &str) -> String {
    let conversation_id = Uuid::new_v4().simple().to_string();
    format!("{}:anonymous:{}", prefix, &conversation_id[..10])
}

/// Handle the live WebSocket connection
async fn handle_live_socket(socket: WebSocket, app_state: Arc<AppState>) {
    let user_id = conversation_user_id(&app_state.config.user_id_prefix);
    info!(user_id = %user_id, "Live WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();
    let (message_tx, mut message_rx) = mpsc::channel::<MessageRoute>(CHANNEL_BUFFER_SIZE);

    // Sender task for outgoing messages
    let mut sender_task = tokio::spawn(async move {
        while let Some(route) = message_rx.recv().await {
            let result = match route {
                MessageRoute::Outgoing(message) => match serde_json::to_string(&message) {
                    Ok(json_str) => sender.send(Message::Text(json_str.into())).await,
                    Err(e) => {
                        error!("Failed to serialize outgoing message: {}", e);
                        continue;
                    }
                },
                MessageRoute::Close => {
                    debug!("Closing live WebSocket connection");
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            };

            if let Err(e) = result {
                debug!("Failed to send WebSocket message: {}", e);
                break;
            }
        }
    });

    let session = LiveSession::new(app_state.clone(), user_id.clone(), message_tx.clone());

    let idle_timeout = app_state.config.idle_timeout();
    let check_interval = IDLE_CHECK_INTERVAL.min(idle_timeout);
    let mut last_activity = tokio::time::Instant::now();

    loop {
        select! {
            msg_result = receiver.next() => {
                last_activity = tokio::time::Instant::now();

                match msg_result {
                    Some(Ok(msg)) => {
                        if !process_live_message(msg, &session).await {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!("Live WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        info!("Live WebSocket connection closed by client");
                        break;
                    }
                }
            }
            _ = tokio::time::sleep(check_interval) => {
                if last_activity.elapsed() >= idle_timeout {
                    warn!(
                        "Live WebSocket connection idle for {}s, closing stale connection",
                        last_activity.elapsed().as_secs()
                    );
                    session
                        .send(ServerMessage::error("Connection closed due to inactivity"))
                        .await;
                    let _ = message_tx.send(MessageRoute::Close).await;
                    break;
                }
                debug!("Live WebSocket connection idle check - still active");
            }
        }
    }

    // Cleanup
    session.shutdown();
    drop(session);
    drop(message_tx);
    if tokio::time::timeout(SENDER_DRAIN_TIMEOUT, &mut sender_task)
        .await
        .is_err()
    {
        sender_task.abort();
    }

    info!(user_id = %user_id, "Live WebSocket connection terminated");
}

/// Process one incoming WebSocket frame. Returns `false` to end the connection.
async fn process_live_message(msg: Message, session: &LiveSession) -> bool {
    match msg {
        Message::Text(text) => {
            debug!("Received text message: {} bytes", text.len());

            let parsed = ClientMessage::parse(&text).and_then(|message| {
                message.validate()?;
                Ok(message)
            });

            match parsed {
                Ok(message) => handle_client_message(message, session).await,
                Err(e) => {
                    let e = match e {
                        ProtocolError::InvalidAudio
                        | ProtocolError::InvalidSampleRate
                        | ProtocolError::MissingAudio
                            if !session.is_live() =>
                        {
                            ProtocolError::LiveNotStarted
                        }
                        other => other,
                    };
                    debug!("Rejected client message: {}", e);
                    session.send(ServerMessage::error(e.to_string())).await;
                }
            }
            true
        }
        Message::Binary(data) => {
            debug!("Received unexpected binary frame: {} bytes", data.len());
            session
                .send(ServerMessage::error(
                    ProtocolError::UnsupportedType(None).to_string(),
                ))
                .await;
            true
        }
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            info!("Live WebSocket close received");
            false
        }
    }
}

/// Dispatch a validated client message
async fn handle_client_message(message: ClientMessage, session: &LiveSession) {
    match message {
        ClientMessage::Ping => session.send(ServerMessage::Pong).await,
        ClientMessage::UserText { text } => session.user_text(text).await,
        ClientMessage::LiveStart => match session.start_live().await {
            Ok(()) => session.send(ServerMessage::status(LiveStatus::Started)).await,
            Err(e) => {
                error!("Failed to start live session: {}", e);
                session.send(ServerMessage::error(e.to_string())).await;
            }
        },
        ClientMessage::LiveStop => {
            session.stop_live();
            session.send(ServerMessage::status(LiveStatus::Stopped)).await;
        }
        ClientMessage::AudioChunk { audio, sample_rate } => {
            if let Err(e) = session.push_audio(&audio, sample_rate).await {
                session.send(ServerMessage::error(e.to_string())).await;
            }
        }
        ClientMessage::SpeechPause => {
            session.speech_pause();
            session
                .send(ServerMessage::status(LiveStatus::SpeechPause))
                .await;
        }
        ClientMessage::BargeIn => {
            session.barge_in();
            session.send(ServerMessage::status(LiveStatus::BargeIn)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_user_id_format() {
        let id = conversation_user_id("live_gateway");
        let parts: Vec<&str> = id.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "live_gateway");
        assert_eq!(parts[1], "anonymous");
        assert_eq!(parts[2].len(), 10);
    }
}
