//! Serialized playback queue with barge-in
//!
//! One drain task plays queued `live_audio` payloads strictly in arrival
//! order. [`PlaybackQueue::barge_in`] clears the queue and stops the active
//! item under the same lock the drain task uses to pick up work, so no stale
//! chunk can start after it returns. Once the queue has been empty for the
//! idle debounce, [`PlaybackEvent::Idle`] is reported.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::session::SessionInput;
use super::sink::SharedSink;
use crate::core::audio::{decode_payload, sample_rate_from_mime};

/// One `live_audio` payload waiting to be played
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackItem {
    /// Base64 PCM16 mono
    pub audio: String,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Queue drained and stayed empty for the idle debounce
    Idle,
    /// An item was skipped; the queue continues
    ItemFailed(String),
}

#[derive(Default)]
struct QueueState {
    items: VecDeque<PlaybackItem>,
    /// Stop token of the item being played
    active: Option<CancellationToken>,
}

struct Shared {
    state: Mutex<QueueState>,
    notify: Notify,
}

/// Handle to the playback drain task. The task stops when this is dropped.
pub struct PlaybackQueue {
    shared: Arc<Shared>,
    shutdown: CancellationToken,
}

impl PlaybackQueue {
    pub(crate) fn spawn(
        sink: SharedSink,
        default_sample_rate: u32,
        idle_after: Duration,
        events: mpsc::UnboundedSender<SessionInput>,
    ) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        });
        let shutdown = CancellationToken::new();

        tokio::spawn(drain(
            shared.clone(),
            sink,
            default_sample_rate,
            idle_after,
            events,
            shutdown.clone(),
        ));

        Self { shared, shutdown }
    }

    pub fn enqueue(&self, item: PlaybackItem) {
        self.shared.state.lock().items.push_back(item);
        self.shared.notify.notify_one();
    }

    /// Drop everything queued and stop the active item. Idempotent.
    pub fn barge_in(&self) {
        let mut state = self.shared.state.lock();
        let dropped = state.items.len();
        state.items.clear();
        if let Some(active) = state.active.take() {
            active.cancel();
        }
        debug!(dropped, "Playback cleared");
    }

    /// Nothing playing and nothing queued
    pub fn is_idle(&self) -> bool {
        let state = self.shared.state.lock();
        state.items.is_empty() && state.active.is_none()
    }

    pub fn queued(&self) -> usize {
        self.shared.state.lock().items.len()
    }
}

impl Drop for PlaybackQueue {
    fn drop(&mut self) {
        self.barge_in();
        self.shutdown.cancel();
    }
}

async fn drain(
    shared: Arc<Shared>,
    sink: SharedSink,
    default_sample_rate: u32,
    idle_after: Duration,
    events: mpsc::UnboundedSender<SessionInput>,
    shutdown: CancellationToken,
) {
    // Something was played since the last Idle report
    let mut played = false;

    loop {
        let next = {
            let mut state = shared.state.lock();
            state.items.pop_front().map(|item| {
                let stop = CancellationToken::new();
                state.active = Some(stop.clone());
                (item, stop)
            })
        };

        let Some((item, stop)) = next else {
            if played {
                let idle = tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = shared.notify.notified() => false,
                    _ = tokio::time::sleep(idle_after) => true,
                };
                if idle && shared.state.lock().items.is_empty() {
                    played = false;
                    trace!("Playback idle");
                    if events
                        .send(SessionInput::Playback(PlaybackEvent::Idle))
                        .is_err()
                    {
                        return;
                    }
                }
            } else {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = shared.notify.notified() => {}
                }
            }
            continue;
        };

        played = true;
        let sample_rate = item
            .mime_type
            .as_deref()
            .and_then(sample_rate_from_mime)
            .unwrap_or(default_sample_rate);

        let result = match decode_payload(&item.audio) {
            Ok(samples) if !stop.is_cancelled() => sink
                .play(samples, sample_rate, stop.clone())
                .await
                .map_err(|e| e.to_string()),
            Ok(_) => Ok(()),
            Err(e) => Err(e.to_string()),
        };

        // Only this task sets `active`; barge-in may already have taken it
        shared.state.lock().active = None;

        if let Err(message) = result {
            warn!("Skipping audio chunk: {}", message);
            if events
                .send(SessionInput::Playback(PlaybackEvent::ItemFailed(message)))
                .is_err()
            {
                return;
            }
        }
    }
}
