//! Connection controller and socket task
//!
//! Every `connect` allocates a new generation. Socket tasks tag everything
//! they report with the generation they were started for, and the controller
//! drops reports that are not for the active generation. A superseded or
//! closed socket therefore cannot touch session state.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::notice::{CloseReason, ConnectionState};
use super::session::SessionInput;
use crate::protocol::{ClientMessage, ServerMessage};

/// Something that happened on a generation's socket
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    Opened,
    Message(ServerMessage),
    Error(String),
    Closed,
}

/// Generation and lifecycle bookkeeping. Performs no I/O.
#[derive(Debug)]
pub struct ConnectionController {
    generation: u64,
    active: Option<u64>,
    state: ConnectionState,
    ever_opened: bool,
    reconnect_count: u32,
    user_closed: bool,
    errored: bool,
}

impl Default for ConnectionController {
    fn default() -> Self {
        Self {
            generation: 0,
            active: None,
            state: ConnectionState::Disconnected,
            ever_opened: false,
            reconnect_count: 0,
            user_closed: false,
            errored: false,
        }
    }
}

impl ConnectionController {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn reconnect_count(&self) -> u32 {
        self.reconnect_count
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.active == Some(generation)
    }

    /// Start a new generation, superseding any active one
    pub fn begin_connect(&mut self) -> u64 {
        self.generation += 1;
        self.active = Some(self.generation);
        self.state = ConnectionState::Connecting;
        self.user_closed = false;
        self.errored = false;
        self.generation
    }

    /// Mark the active socket as closing on request. Returns `false` if
    /// there is nothing to close.
    pub fn request_close(&mut self) -> bool {
        if self.active.is_none() {
            return false;
        }
        self.user_closed = true;
        true
    }

    pub fn on_open(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        if self.ever_opened {
            self.reconnect_count += 1;
        }
        self.ever_opened = true;
        self.state = ConnectionState::Open;
        true
    }

    pub fn on_error(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.errored = true;
        self.state = ConnectionState::Error;
        true
    }

    /// Retire the generation and classify the close
    pub fn on_close(&mut self, generation: u64) -> Option<CloseReason> {
        if !self.is_current(generation) {
            return None;
        }
        let reason = if self.user_closed {
            CloseReason::UserRequested
        } else if self.errored {
            CloseReason::AfterError
        } else {
            CloseReason::Unexpected
        };
        self.active = None;
        self.state = ConnectionState::Disconnected;
        self.user_closed = false;
        self.errored = false;
        Some(reason)
    }
}

/// Control side of one generation's socket task
pub struct SocketLink {
    pub generation: u64,
    outbound: mpsc::UnboundedSender<ClientMessage>,
    cancel: CancellationToken,
}

impl SocketLink {
    /// Queue a frame. Dropped if the socket task has ended.
    pub fn send(&self, message: ClientMessage) -> bool {
        self.outbound.send(message).is_ok()
    }

    /// Close the socket; the task still reports `Closed`.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Link whose frames go to `outbound` with no socket behind it
    #[cfg(test)]
    pub(crate) fn detached(generation: u64, outbound: mpsc::UnboundedSender<ClientMessage>) -> Self {
        Self {
            generation,
            outbound,
            cancel: CancellationToken::new(),
        }
    }
}

impl Drop for SocketLink {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Connect to `url` in the background, reporting to `events`
pub(crate) fn spawn_socket(
    generation: u64,
    url: String,
    keepalive: Duration,
    events: mpsc::UnboundedSender<SessionInput>,
) -> SocketLink {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    tokio::spawn(run_socket(
        generation,
        url,
        keepalive,
        outbound_rx,
        events,
        cancel.clone(),
    ));

    SocketLink {
        generation,
        outbound: outbound_tx,
        cancel,
    }
}

async fn run_socket(
    generation: u64,
    url: String,
    keepalive: Duration,
    mut outbound: mpsc::UnboundedReceiver<ClientMessage>,
    events: mpsc::UnboundedSender<SessionInput>,
    cancel: CancellationToken,
) {
    let report = |event: SocketEvent| {
        let _ = events.send(SessionInput::Socket { generation, event });
    };

    debug!(generation, url = %url, "Connecting to gateway");
    let connected = tokio::select! {
        _ = cancel.cancelled() => {
            report(SocketEvent::Closed);
            return;
        }
        result = connect_async(url.as_str()) => result,
    };

    let stream = match connected {
        Ok((stream, _)) => stream,
        Err(e) => {
            warn!(generation, "Gateway connection failed: {}", e);
            report(SocketEvent::Error(e.to_string()));
            report(SocketEvent::Closed);
            return;
        }
    };

    info!(generation, "Gateway connected");
    report(SocketEvent::Opened);

    let (mut ws_tx, mut ws_rx) = stream.split();
    let mut keepalive = tokio::time::interval_at(tokio::time::Instant::now() + keepalive, keepalive);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let outgoing = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(generation, "Closing gateway socket");
                let _ = ws_tx.close().await;
                break;
            }
            Some(message) = outbound.recv() => message,
            _ = keepalive.tick() => ClientMessage::Ping,
            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ServerMessage>(text.as_str()) {
                            Ok(message) => report(SocketEvent::Message(message)),
                            Err(e) => warn!(generation, "Ignoring unrecognized frame: {}", e),
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(generation, ?frame, "Gateway closed the socket");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(generation, "Gateway socket error: {}", e);
                        report(SocketEvent::Error(e.to_string()));
                        break;
                    }
                    None => break,
                }
                continue;
            }
        };

        let json = match serde_json::to_string(&outgoing) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize outgoing frame: {}", e);
                continue;
            }
        };
        if let Err(e) = ws_tx.send(Message::Text(json.into())).await {
            warn!(generation, "Failed to send frame: {}", e);
            report(SocketEvent::Error(e.to_string()));
            break;
        }
    }

    info!(generation, "Gateway socket closed");
    report(SocketEvent::Closed);
}
