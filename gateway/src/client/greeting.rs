//! Greeting handshake
//!
//! After `live_start`, capture stays suppressed until the greeting is over.
//! Exactly one of these releases it:
//! - greeting audio arrives and playback goes idle
//! - the gateway reports `greeting_no_audio` or `greeting_error` and the
//!   local fallback speech finishes (or no greeting text is known)
//! - the timeout fires
//!
//! The timeout and fallback completion race inside one watch task per
//! greeting; whichever fires first is reported, and the handshake only
//! honors signals for the greeting it is currently waiting on.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::notice::GreetingUnlock;
use super::session::SessionInput;
use super::sink::SharedSynthesizer;

/// Reported by a greeting watch task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GreetingSignal {
    TimedOut { id: u64 },
    FallbackFinished { id: u64 },
}

/// What the caller should do after feeding the handshake an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GreetingAction {
    Nothing,
    FallbackStarted,
    Unlocked(GreetingUnlock),
}

struct Pending {
    id: u64,
    deadline: Instant,
    text: Option<String>,
    received_audio: bool,
    fallback_started: bool,
    /// Stops the watch task and any fallback speech
    cancel: CancellationToken,
}

pub struct GreetingHandshake {
    timeout: Duration,
    synthesizer: SharedSynthesizer,
    inputs: mpsc::UnboundedSender<SessionInput>,
    next_id: u64,
    pending: Option<Pending>,
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

impl GreetingHandshake {
    pub(crate) fn new(
        timeout: Duration,
        synthesizer: SharedSynthesizer,
        inputs: mpsc::UnboundedSender<SessionInput>,
    ) -> Self {
        Self {
            timeout,
            synthesizer,
            inputs,
            next_id: 0,
            pending: None,
        }
    }

    pub fn is_awaiting(&self) -> bool {
        self.pending.is_some()
    }

    /// Arm a new greeting, abandoning any previous one
    pub fn begin(&mut self) -> u64 {
        self.cancel();
        self.next_id += 1;
        let id = self.next_id;
        let deadline = Instant::now() + self.timeout;
        let cancel = CancellationToken::new();

        self.spawn_watch(id, Some(deadline), None, cancel.clone());
        self.pending = Some(Pending {
            id,
            deadline,
            text: None,
            received_audio: false,
            fallback_started: false,
            cancel,
        });
        debug!(greeting = id, timeout_ms = self.timeout.as_millis() as u64, "Awaiting greeting");
        id
    }

    /// Abandon the greeting without unlocking
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel.cancel();
        }
    }

    /// Remember agent text in case a fallback is needed
    pub fn note_text(&mut self, text: &str) {
        if let Some(pending) = self.pending.as_mut()
            && !text.trim().is_empty()
        {
            pending.text = Some(text.to_string());
        }
    }

    /// Greeting audio arrived; unlock waits for playback to go idle.
    pub fn on_audio(&mut self) {
        if let Some(pending) = self.pending.as_mut()
            && !pending.received_audio
            && !pending.fallback_started
        {
            pending.received_audio = true;
            pending.cancel.cancel();
            debug!(greeting = pending.id, "Greeting audio received");
        }
    }

    pub fn on_playback_idle(&mut self) -> GreetingAction {
        match &self.pending {
            Some(pending) if pending.received_audio => self.finish(GreetingUnlock::Played),
            _ => GreetingAction::Nothing,
        }
    }

    /// Gateway reported `greeting_no_audio` or `greeting_error`
    pub fn on_failure(&mut self, text: Option<String>) -> GreetingAction {
        let Some(pending) = self.pending.as_ref() else {
            return GreetingAction::Nothing;
        };
        if pending.received_audio || pending.fallback_started {
            return GreetingAction::Nothing;
        }

        match non_blank(text).or_else(|| pending.text.clone()) {
            Some(text) => {
                let deadline = pending.deadline;
                self.start_fallback(text, Some(deadline));
                GreetingAction::FallbackStarted
            }
            None => self.finish(GreetingUnlock::NoText),
        }
    }

    pub fn on_signal(&mut self, signal: GreetingSignal) -> GreetingAction {
        let id = match signal {
            GreetingSignal::TimedOut { id } | GreetingSignal::FallbackFinished { id } => id,
        };
        let Some(pending) = self.pending.as_ref().filter(|p| p.id == id) else {
            debug!(greeting = id, "Ignoring signal for stale greeting");
            return GreetingAction::Nothing;
        };

        match signal {
            GreetingSignal::FallbackFinished { .. } => self.finish(GreetingUnlock::Fallback),
            GreetingSignal::TimedOut { .. } => {
                match pending.text.clone() {
                    Some(text) if !pending.fallback_started && !pending.received_audio => {
                        warn!(greeting = id, "Greeting timed out, speaking fallback");
                        self.start_fallback(text, None);
                        GreetingAction::FallbackStarted
                    }
                    _ => {
                        warn!(greeting = id, "Greeting timed out, continuing without it");
                        self.finish(GreetingUnlock::TimedOut)
                    }
                }
            }
        }
    }

    fn finish(&mut self, how: GreetingUnlock) -> GreetingAction {
        match self.pending.take() {
            Some(pending) => {
                pending.cancel.cancel();
                info!(greeting = pending.id, how = ?how, "Greeting complete");
                GreetingAction::Unlocked(how)
            }
            None => GreetingAction::Nothing,
        }
    }

    fn start_fallback(&mut self, text: String, deadline: Option<Instant>) {
        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        pending.cancel.cancel();
        let cancel = CancellationToken::new();
        pending.cancel = cancel.clone();
        pending.fallback_started = true;
        let id = pending.id;

        let (done_tx, done_rx) = oneshot::channel();
        let synthesizer = self.synthesizer.clone();
        let stop = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = synthesizer.speak(&text, stop).await {
                warn!("Fallback speech failed: {}", e);
            }
            let _ = done_tx.send(());
        });

        self.spawn_watch(id, deadline, Some(done_rx), cancel);
    }

    fn spawn_watch(
        &self,
        id: u64,
        deadline: Option<Instant>,
        fallback: Option<oneshot::Receiver<()>>,
        cancel: CancellationToken,
    ) {
        let inputs = self.inputs.clone();
        tokio::spawn(async move {
            let timed_out = async {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };
            let fallback_done = async {
                match fallback {
                    Some(done) => {
                        let _ = done.await;
                    }
                    None => std::future::pending::<()>().await,
                }
            };

            let signal = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = timed_out => GreetingSignal::TimedOut { id },
                _ = fallback_done => GreetingSignal::FallbackFinished { id },
            };
            let _ = inputs.send(SessionInput::Greeting(signal));
        });
    }
}
