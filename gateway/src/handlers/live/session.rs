//! Per-connection voice session state
//!
//! A [`LiveSession`] owns every task spawned on behalf of one WebSocket
//! connection: the typed-text request, the transcription stream, the greeting,
//! the voice response and its synthesis. Task handles live behind a short
//! `parking_lot` lock so control messages (`barge_in`, `live_stop`) can abort
//! them from the connection loop at any time.

use std::sync::Arc;

use base64::prelude::*;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, error, info, warn};

use crate::core::agent::query_agent;
use crate::core::speech::{AudioInput, SPEECH_CHANNEL_BUFFER, SpeechError, SpeechResult};
use crate::protocol::{LiveStatus, MessageRoute, ProtocolError, ServerMessage};
use crate::state::AppState;

/// Mime type reported for synthesized audio without metadata
pub const DEFAULT_AUDIO_MIME: &str = "audio/pcm";

#[derive(Default)]
struct Tasks {
    /// Sender side of the transcription audio queue; `Some` while live
    audio_tx: Option<mpsc::Sender<AudioInput>>,
    live: Option<AbortHandle>,
    greeting: Option<AbortHandle>,
    response: Option<AbortHandle>,
    tts: Option<AbortHandle>,
    text: Option<AbortHandle>,
}

fn running(handle: &Option<AbortHandle>) -> bool {
    handle.as_ref().is_some_and(|h| !h.is_finished())
}

fn abort(handle: &mut Option<AbortHandle>) {
    if let Some(handle) = handle.take() {
        handle.abort();
    }
}

#[derive(Default)]
struct Transcript {
    parts: Vec<String>,
    /// Index of the first part not yet answered
    last_response_index: usize,
    last_response_at: Option<Instant>,
}

struct Inner {
    state: Arc<AppState>,
    user_id: String,
    tx: mpsc::Sender<MessageRoute>,
    tasks: Mutex<Tasks>,
    transcript: Mutex<Transcript>,
}

/// Voice and text session for one connection
#[derive(Clone)]
pub struct LiveSession {
    inner: Arc<Inner>,
}

impl LiveSession {
    pub fn new(state: Arc<AppState>, user_id: String, tx: mpsc::Sender<MessageRoute>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state,
                user_id,
                tx,
                tasks: Mutex::new(Tasks::default()),
                transcript: Mutex::new(Transcript::default()),
            }),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    /// A voice session has been started and not stopped
    pub fn is_live(&self) -> bool {
        self.inner.tasks.lock().audio_tx.is_some()
    }

    pub async fn send(&self, message: ServerMessage) {
        self.inner.send(message).await;
    }

    /// Run a typed-text agent request in the background.
    pub async fn user_text(&self, text: String) {
        let busy = {
            let mut tasks = self.inner.tasks.lock();
            if running(&tasks.text) {
                true
            } else {
                let inner = self.inner.clone();
                let handle = tokio::spawn(async move {
                    match query_agent(
                        inner.state.agent.as_ref(),
                        &inner.state.config.tool_display,
                        &inner.user_id,
                        text.trim(),
                        &inner.tx,
                    )
                    .await
                    {
                        Ok(reply) => inner.send(reply.into_message()).await,
                        Err(e) => inner.send(ServerMessage::error(e.to_string())).await,
                    }
                });
                tasks.text = Some(handle.abort_handle());
                false
            }
        };

        if busy {
            self.send(ServerMessage::error("Request already in progress"))
                .await;
        }
    }

    /// Start the voice session. Idempotent while one is running.
    pub async fn start_live(&self) -> SpeechResult<()> {
        if running(&self.inner.tasks.lock().live) {
            debug!(user_id = %self.inner.user_id, "Live session already running");
            return Ok(());
        }

        let (audio_tx, audio_rx) = mpsc::channel::<AudioInput>(SPEECH_CHANNEL_BUFFER);
        let fragments = self.inner.state.speech.transcribe(audio_rx).await?;
        *self.inner.transcript.lock() = Transcript::default();

        let live = tokio::spawn(self.inner.clone().stream_transcription(fragments));
        let greeting = tokio::spawn(self.inner.clone().greeting());

        let mut tasks = self.inner.tasks.lock();
        tasks.audio_tx = Some(audio_tx);
        tasks.live = Some(live.abort_handle());
        tasks.greeting = Some(greeting.abort_handle());
        info!(user_id = %self.inner.user_id, "Live session started");
        Ok(())
    }

    /// Close the audio queue and abort every voice task.
    pub fn stop_live(&self) {
        let mut tasks = self.inner.tasks.lock();
        let was_live = tasks.audio_tx.take().is_some();
        abort(&mut tasks.live);
        abort(&mut tasks.greeting);
        abort(&mut tasks.response);
        abort(&mut tasks.tts);
        if was_live {
            info!(user_id = %self.inner.user_id, "Live session stopped");
        }
    }

    /// Forward one captured chunk to transcription.
    pub async fn push_audio(&self, audio: &str, sample_rate: i64) -> Result<(), ProtocolError> {
        let Some(audio_tx) = self.inner.tasks.lock().audio_tx.clone() else {
            return Err(ProtocolError::LiveNotStarted);
        };
        let sample_rate = u32::try_from(sample_rate).map_err(|_| ProtocolError::InvalidSampleRate)?;
        let data = BASE64_STANDARD
            .decode(audio)
            .map_err(|_| ProtocolError::InvalidAudio)?;
        if data.is_empty() {
            return Err(ProtocolError::MissingAudio);
        }

        if audio_tx
            .send(AudioInput {
                data: Bytes::from(data),
                sample_rate,
            })
            .await
            .is_err()
        {
            debug!("Transcription stream closed, dropping audio");
        }
        Ok(())
    }

    /// Answer the transcript so far unless a response is already running.
    pub fn speech_pause(&self) {
        if self.is_live() {
            self.inner.clone().trigger_response();
        }
    }

    /// Abort greeting, response and synthesis.
    pub fn barge_in(&self) {
        let mut tasks = self.inner.tasks.lock();
        abort(&mut tasks.greeting);
        abort(&mut tasks.response);
        abort(&mut tasks.tts);
        debug!(user_id = %self.inner.user_id, "Barge-in");
    }

    /// Connection is going away
    pub fn shutdown(&self) {
        self.stop_live();
        abort(&mut self.inner.tasks.lock().text);
    }
}

impl Inner {
    async fn send(&self, message: ServerMessage) {
        if self.tx.send(MessageRoute::Outgoing(message)).await.is_err() {
            debug!("Connection closed, dropping outgoing message");
        }
    }

    async fn stream_transcription(self: Arc<Self>, mut fragments: mpsc::Receiver<String>) {
        while let Some(fragment) = fragments.recv().await {
            let fragment = fragment.trim();
            if fragment.is_empty() {
                continue;
            }

            let joined = {
                let mut transcript = self.transcript.lock();
                transcript.parts.push(fragment.to_string());
                transcript.parts.join(" ").trim().to_string()
            };
            self.send(ServerMessage::LiveUserText { text: joined }).await;

            let cooled_down = self
                .transcript
                .lock()
                .last_response_at
                .is_none_or(|at| at.elapsed() > self.state.config.response_cooldown());
            if cooled_down {
                self.clone().trigger_response();
            }
        }
        debug!(user_id = %self.user_id, "Transcription stream ended");
    }

    fn trigger_response(self: Arc<Self>) {
        let mut tasks = self.tasks.lock();
        if running(&tasks.response) {
            return;
        }
        let handle = tokio::spawn(self.clone().respond());
        tasks.response = Some(handle.abort_handle());
    }

    async fn respond(self: Arc<Self>) {
        let transcript = {
            let mut transcript = self.transcript.lock();
            let pending = transcript.parts[transcript.last_response_index..]
                .join(" ")
                .trim()
                .to_string();
            if pending.is_empty() {
                return;
            }
            transcript.last_response_index = transcript.parts.len();
            pending
        };

        let reply = match query_agent(
            self.state.agent.as_ref(),
            &self.state.config.tool_display,
            &self.user_id,
            &transcript,
            &self.tx,
        )
        .await
        {
            Ok(reply) => reply,
            Err(e) => {
                self.send(ServerMessage::error(e.to_string())).await;
                self.transcript.lock().last_response_at = Some(Instant::now());
                return;
            }
        };

        let text = reply.text.clone();
        self.send(reply.into_message()).await;
        if !text.is_empty() {
            self.send(ServerMessage::LiveText { text: text.clone() }).await;
            match self.clone().speak(&text).await {
                Ok(_) | Err(SpeechError::Cancelled) => {}
                Err(e) => warn!("Response TTS failed: {}", e),
            }
        }
        self.transcript.lock().last_response_at = Some(Instant::now());
    }

    async fn greeting(self: Arc<Self>) {
        let greeting = self.state.config.greeting().to_string();
        self.send(ServerMessage::LiveText {
            text: greeting.clone(),
        })
        .await;

        match self.clone().speak(&greeting).await {
            Ok(true) => {}
            Ok(false) => {
                self.send(ServerMessage::LiveStatus {
                    status: LiveStatus::GreetingNoAudio,
                    text: Some(greeting),
                })
                .await;
            }
            Err(SpeechError::Cancelled) => debug!("Greeting cancelled"),
            Err(e) => {
                error!("Greeting TTS failed: {}", e);
                self.send(ServerMessage::LiveText {
                    text: greeting.clone(),
                })
                .await;
                self.send(ServerMessage::LiveStatus {
                    status: LiveStatus::GreetingError,
                    text: Some(greeting),
                })
                .await;
            }
        }
    }

    /// Synthesize `text` as `live_audio`, returning whether any audio was sent.
    async fn speak(self: Arc<Self>, text: &str) -> SpeechResult<bool> {
        let inner = self.clone();
        let text = text.to_string();
        // Registered under the tasks lock; aborting the caller aborts synthesis
        let task = {
            let mut tasks = self.tasks.lock();
            let task = AbortOnDropHandle::new(tokio::spawn(async move {
                let mut chunks = inner.state.speech.synthesize(&text).await?;
                let mut has_audio = false;
                while let Some(chunk) = chunks.recv().await {
                    let chunk = chunk?;
                    if chunk.data.is_empty() {
                        continue;
                    }
                    has_audio = true;
                    inner
                        .send(ServerMessage::LiveAudio {
                            audio: BASE64_STANDARD.encode(&chunk.data),
                            mime_type: Some(
                                chunk
                                    .mime_type
                                    .unwrap_or_else(|| DEFAULT_AUDIO_MIME.to_string()),
                            ),
                        })
                        .await;
                }
                Ok::<bool, SpeechError>(has_audio)
            }));
            tasks.tts = Some(task.abort_handle());
            task
        };

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(SpeechError::Cancelled),
            Err(e) => Err(SpeechError::SynthesisFailed(e.to_string())),
        }
    }
}
