//! Client session event loop
//!
//! A single task owns all session state. Commands from [`super::ClientHandle`]
//! and reports from the socket, playback, greeting and health tasks arrive on
//! one channel and are applied in order, so state transitions never race.

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::activity::{ActivityCorrelator, ActivityView};
use super::capture::{CapturePipeline, capture_allowed};
use super::connection::{ConnectionController, SocketEvent, SocketLink, spawn_socket};
use super::error::{ClientError, ClientResult};
use super::greeting::{GreetingAction, GreetingHandshake, GreetingSignal};
use super::health::{HealthProber, HealthSample, health_url};
use super::notice::{ClientNotice, ConnectionState, TextRejection, VoiceState};
use super::playback::{PlaybackEvent, PlaybackItem, PlaybackQueue};
use super::sink::{SharedSink, SharedSynthesizer};
use crate::config::{ClientConfig, ConfigError};
use crate::protocol::{ClientMessage, LiveStatus, ServerMessage};

/// Requests from the session owner
#[derive(Debug)]
pub(crate) enum Command {
    /// Connect to the given URL, or the configured one
    Connect(Option<String>),
    Disconnect,
    SendText(String),
    StartVoice,
    StopVoice,
    AudioFrame(Vec<f32>),
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Shutdown,
}

/// Everything the session loop reacts to
#[derive(Debug)]
pub(crate) enum SessionInput {
    Command(Command),
    Socket { generation: u64, event: SocketEvent },
    Playback(PlaybackEvent),
    Greeting(GreetingSignal),
    Health { generation: u64, sample: HealthSample },
}

/// Point-in-time view of session state
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SessionSnapshot {
    pub generation: u64,
    pub connection: ConnectionState,
    pub reconnect_count: u32,
    pub voice: VoiceState,
    pub in_flight: bool,
    pub awaiting_greeting: bool,
    pub playback_idle: bool,
    pub latency_ms: Option<u64>,
    pub frames_sent: u64,
    pub activity: Option<ActivityView>,
}

pub(crate) struct Session {
    config: ClientConfig,
    inputs: mpsc::UnboundedSender<SessionInput>,
    notices: mpsc::UnboundedSender<ClientNotice>,
    http: reqwest::Client,
    url: String,

    controller: ConnectionController,
    link: Option<SocketLink>,
    health: Option<HealthProber>,
    latency_ms: Option<u64>,

    voice: VoiceState,
    in_flight: bool,
    /// Set by barge-in; `live_audio` is dropped until the next `live_text`
    discard_audio: bool,

    capture: CapturePipeline,
    playback: PlaybackQueue,
    greeting: GreetingHandshake,
    activity: ActivityCorrelator,
}

impl Session {
    pub(crate) fn new(
        config: ClientConfig,
        sink: SharedSink,
        synthesizer: SharedSynthesizer,
        inputs: mpsc::UnboundedSender<SessionInput>,
        notices: mpsc::UnboundedSender<ClientNotice>,
    ) -> ClientResult<Self> {
        let capture = CapturePipeline::new(config.vad.clone())
            .map_err(|e| ClientError::Config(ConfigError::Invalid(e.to_string())))?;
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ClientError::ConnectionFailed(e.to_string()))?;
        let playback = PlaybackQueue::spawn(
            sink,
            config.playback_sample_rate,
            config.playback_idle(),
            inputs.clone(),
        );
        let greeting =
            GreetingHandshake::new(config.greeting_timeout(), synthesizer, inputs.clone());
        let activity = ActivityCorrelator::new(config.finished_request_history);

        Ok(Self {
            url: config.url.clone(),
            config,
            inputs,
            notices,
            http,
            controller: ConnectionController::default(),
            link: None,
            health: None,
            latency_ms: None,
            voice: VoiceState::Idle,
            in_flight: false,
            discard_audio: false,
            capture,
            playback,
            greeting,
            activity,
        })
    }

    pub(crate) async fn run(mut self, mut inputs: mpsc::UnboundedReceiver<SessionInput>) {
        while let Some(input) = inputs.recv().await {
            if !self.handle(input) {
                break;
            }
        }
        self.teardown();
        debug!("Client session stopped");
    }

    /// Apply one input. Returns `false` when the session should stop.
    pub(crate) fn handle(&mut self, input: SessionInput) -> bool {
        match input {
            SessionInput::Command(command) => return self.handle_command(command),
            SessionInput::Socket { generation, event } => self.handle_socket(generation, event),
            SessionInput::Playback(PlaybackEvent::Idle) => self.on_playback_idle(),
            SessionInput::Playback(PlaybackEvent::ItemFailed(message)) => {
                self.notify(ClientNotice::PlaybackFailed { message });
            }
            SessionInput::Greeting(signal) => {
                let action = self.greeting.on_signal(signal);
                self.apply_greeting(action);
            }
            SessionInput::Health { generation, sample } => {
                if self.controller.is_current(generation) {
                    self.latency_ms = sample.latency_ms;
                    self.notify(ClientNotice::Health { sample });
                }
            }
        }
        true
    }

    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Connect(url) => self.connect(url),
            Command::Disconnect => self.disconnect(),
            Command::SendText(text) => self.send_text(&text),
            Command::StartVoice => self.start_voice(),
            Command::StopVoice => self.stop_voice(),
            Command::AudioFrame(frame) => self.audio_frame(&frame),
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown => return false,
        }
        true
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            generation: self.controller.generation(),
            connection: self.controller.state(),
            reconnect_count: self.controller.reconnect_count(),
            voice: self.voice,
            in_flight: self.in_flight,
            awaiting_greeting: self.greeting.is_awaiting(),
            playback_idle: self.playback.is_idle(),
            latency_ms: self.latency_ms,
            frames_sent: self.capture.frames_sent(),
            activity: self.activity.current().cloned(),
        }
    }

    fn notify(&self, notice: ClientNotice) {
        let _ = self.notices.send(notice);
    }

    fn send(&self, message: ClientMessage) -> bool {
        match &self.link {
            Some(link) if self.controller.is_open() => link.send(message),
            _ => false,
        }
    }

    fn set_voice(&mut self, state: VoiceState) {
        if self.voice != state {
            debug!(from = ?self.voice, to = ?state, "Voice state changed");
            self.voice = state;
            self.notify(ClientNotice::VoiceChanged { state });
        }
    }

    fn connection_changed(&self) {
        self.notify(ClientNotice::ConnectionChanged {
            state: self.controller.state(),
            generation: self.controller.generation(),
        });
    }

    // =========================================================================
    // Connection
    // =========================================================================

    fn connect(&mut self, url: Option<String>) {
        if let Some(link) = self.link.take() {
            debug!(generation = link.generation, "Replacing existing connection");
            link.close();
            self.health = None;
            self.reset_voice();
        }

        self.url = url.unwrap_or_else(|| self.config.url.clone());
        let generation = self.controller.begin_connect();
        self.link = Some(spawn_socket(
            generation,
            self.url.clone(),
            self.config.keepalive_interval(),
            self.inputs.clone(),
        ));
        self.connection_changed();
    }

    fn disconnect(&mut self) {
        if self.controller.request_close()
            && let Some(link) = &self.link
        {
            info!(generation = link.generation, "Disconnect requested");
            link.close();
        }
    }

    fn handle_socket(&mut self, generation: u64, event: SocketEvent) {
        if !self.controller.is_current(generation) {
            trace!(generation, ?event, "Dropping event from stale socket");
            return;
        }
        match event {
            SocketEvent::Opened => self.on_open(generation),
            SocketEvent::Error(message) => self.on_error(generation, message),
            SocketEvent::Closed => self.on_close(generation),
            SocketEvent::Message(message) => self.on_server_message(message),
        }
    }

    fn on_open(&mut self, generation: u64) {
        if !self.controller.on_open(generation) {
            return;
        }
        self.in_flight = false;
        self.reset_voice();
        self.activity.reset();

        self.health = match health_url(&self.url) {
            Ok(url) => Some(HealthProber::spawn(
                self.http.clone(),
                url,
                self.config.health_interval(),
                self.config.health_timeout(),
                generation,
                self.inputs.clone(),
            )),
            Err(e) => {
                warn!("Health probing disabled: {}", e);
                None
            }
        };

        self.connection_changed();
        self.notify(ClientNotice::Connected {
            generation,
            reconnect_count: self.controller.reconnect_count(),
        });
    }

    fn on_error(&mut self, generation: u64, message: String) {
        if !self.controller.on_error(generation) {
            return;
        }
        self.in_flight = false;
        self.connection_changed();
        self.notify(ClientNotice::SocketError { message });
    }

    fn on_close(&mut self, generation: u64) {
        let Some(reason) = self.controller.on_close(generation) else {
            return;
        };
        self.link = None;
        self.health = None;
        self.latency_ms = None;
        self.in_flight = false;
        self.reset_voice();

        self.connection_changed();
        self.notify(ClientNotice::Disconnected { reason });
    }

    fn teardown(&mut self) {
        if let Some(link) = self.link.take() {
            link.close();
        }
        self.health = None;
        self.greeting.cancel();
        self.playback.barge_in();
    }

    // =========================================================================
    // Text
    // =========================================================================

    fn send_text(&mut self, text: &str) {
        let rejection = if !self.controller.is_open() {
            Some(TextRejection::NotConnected)
        } else if text.trim().is_empty() {
            Some(TextRejection::Empty)
        } else if self.in_flight {
            Some(TextRejection::RequestInFlight)
        } else {
            None
        };

        if let Some(reason) = rejection {
            debug!(?reason, "Text message rejected");
            self.notify(ClientNotice::TextRejected { reason });
            return;
        }

        if self.send(ClientMessage::UserText {
            text: text.trim().to_string(),
        }) {
            self.in_flight = true;
        }
    }

    // =========================================================================
    // Voice
    // =========================================================================

    fn start_voice(&mut self) {
        if !self.controller.is_open() {
            warn!("Cannot start voice without an open connection");
            return;
        }
        if self.voice != VoiceState::Idle {
            return;
        }
        self.capture.reset();
        self.discard_audio = false;
        self.greeting.begin();
        self.set_voice(VoiceState::AwaitingGreeting);
        self.send(ClientMessage::LiveStart);
    }

    fn stop_voice(&mut self) {
        if self.voice == VoiceState::Idle {
            return;
        }
        self.send(ClientMessage::LiveStop);
        self.reset_voice();
    }

    /// Voice off, greeting abandoned, playback cleared
    fn reset_voice(&mut self) {
        self.greeting.cancel();
        self.playback.barge_in();
        self.discard_audio = false;
        self.set_voice(VoiceState::Idle);
    }

    fn audio_frame(&mut self, frame: &[f32]) {
        if self.voice == VoiceState::Idle {
            return;
        }

        let result = self.capture.analyze(frame, Instant::now());
        self.notify(ClientNotice::AudioLevel {
            level: result.smoothed,
        });

        if result.is_speech && self.voice == VoiceState::Speaking {
            self.barge_in();
        }
        if result.speech_paused && self.voice == VoiceState::Listening {
            debug!("Speech pause detected");
            self.send(ClientMessage::SpeechPause);
        }

        if capture_allowed(self.controller.is_open(), self.voice) {
            let chunk = self.capture.encode(frame);
            self.send(chunk);
        }
    }

    fn barge_in(&mut self) {
        info!("Barge-in: user spoke over agent audio");
        self.playback.barge_in();
        self.discard_audio = true;
        self.send(ClientMessage::BargeIn);
        self.notify(ClientNotice::BargeIn);
        self.set_voice(VoiceState::Listening);
    }

    fn on_playback_idle(&mut self) {
        // Audio may have been queued after the drain task reported idle
        if !self.playback.is_idle() {
            debug!(queued = self.playback.queued(), "Ignoring stale playback idle");
            return;
        }
        match self.greeting.on_playback_idle() {
            GreetingAction::Nothing => {
                if self.voice == VoiceState::Speaking {
                    self.set_voice(VoiceState::Listening);
                }
            }
            action => self.apply_greeting(action),
        }
    }

    fn apply_greeting(&mut self, action: GreetingAction) {
        match action {
            GreetingAction::Nothing => {}
            GreetingAction::FallbackStarted => debug!("Greeting fallback speech started"),
            GreetingAction::Unlocked(how) => {
                self.notify(ClientNotice::GreetingUnlocked { how });
                if self.voice == VoiceState::AwaitingGreeting {
                    self.set_voice(VoiceState::Listening);
                }
            }
        }
    }

    // =========================================================================
    // Gateway frames
    // =========================================================================

    fn on_server_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::AgentResponse { text, request_id } => {
                self.in_flight = false;
                self.notify(ClientNotice::AgentResponse { request_id, text });
            }
            ServerMessage::AgentActivity(event) => {
                if let Some(view) = self.activity.apply(event) {
                    if view.finished {
                        self.in_flight = false;
                    }
                    self.notify(ClientNotice::Activity { view });
                }
            }
            ServerMessage::LiveText { text } => {
                self.discard_audio = false;
                self.greeting.note_text(&text);
                self.notify(ClientNotice::AgentText { text });
            }
            ServerMessage::LiveUserText { text } => {
                self.notify(ClientNotice::UserTranscript { text });
            }
            ServerMessage::LiveAudio { audio, mime_type } => self.on_live_audio(audio, mime_type),
            ServerMessage::LiveStatus { status, text } => self.on_live_status(status, text),
            ServerMessage::Error { message } => {
                warn!("Gateway error: {}", message);
                self.in_flight = false;
                self.notify(ClientNotice::GatewayError { message });
            }
            ServerMessage::Pong => trace!("Pong"),
        }
    }

    fn on_live_audio(&mut self, audio: String, mime_type: Option<String>) {
        if self.voice == VoiceState::Idle || self.discard_audio {
            debug!("Dropping live audio");
            return;
        }
        if self.greeting.is_awaiting() {
            self.greeting.on_audio();
        }
        self.playback.enqueue(PlaybackItem { audio, mime_type });
        if self.voice == VoiceState::Listening {
            self.set_voice(VoiceState::Speaking);
        }
    }

    fn on_live_status(&mut self, status: LiveStatus, text: Option<String>) {
        match status {
            LiveStatus::GreetingNoAudio | LiveStatus::GreetingError => {
                warn!(?status, "Gateway could not voice the greeting");
                let action = self.greeting.on_failure(text);
                self.apply_greeting(action);
            }
            LiveStatus::Unknown => debug!("Ignoring unknown live status"),
            _ => debug!(?status, "Live status"),
        }
        self.notify(ClientNotice::LiveStatus { status });
    }
}
