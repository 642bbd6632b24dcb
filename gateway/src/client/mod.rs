//! Client runtime for the live gateway
//!
//! [`LiveClient::spawn`] starts a session task and returns a
//! [`ClientHandle`] for commands plus a receiver of [`ClientNotice`]s. The
//! runtime keeps one socket per connection generation, gates microphone
//! capture behind the greeting handshake, plays agent audio through an
//! [`AudioSink`] with barge-in, correlates agent activity per request and
//! probes gateway health while connected.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use live_gateway::client::{LiveClient, LogSynthesizer, NullSink};
//! use live_gateway::config::ClientConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (client, mut notices) = LiveClient::spawn(
//!     ClientConfig::default(),
//!     Arc::new(NullSink),
//!     Arc::new(LogSynthesizer::default()),
//! )?;
//! client.connect()?;
//! client.send_text("What's the weather?")?;
//! while let Some(notice) = notices.recv().await {
//!     println!("{:?}", notice);
//! }
//! # Ok(())
//! # }
//! ```

pub mod activity;
pub mod capture;
pub mod connection;
pub mod error;
pub mod greeting;
pub mod health;
pub mod notice;
pub mod playback;
mod session;
pub mod sink;

pub use activity::{ActivityCorrelator, ActivityView, EntryState, ToolEntry};
pub use connection::{ConnectionController, SocketEvent};
pub use error::{ClientError, ClientResult};
pub use health::{HealthSample, health_url};
pub use notice::{
    ClientNotice, CloseReason, ConnectionState, GreetingUnlock, TextRejection, VoiceState,
};
pub use session::SessionSnapshot;
pub use sink::{AudioSink, LogSynthesizer, NullSink, SharedSink, SharedSynthesizer, SpeechSynthesizer};

use tokio::sync::{mpsc, oneshot};
use tracing::info;

use crate::config::ClientConfig;
use session::{Command, Session, SessionInput};

pub struct LiveClient;

impl LiveClient {
    /// Start a client session on the current Tokio runtime
    pub fn spawn(
        config: ClientConfig,
        sink: SharedSink,
        synthesizer: SharedSynthesizer,
    ) -> ClientResult<(ClientHandle, mpsc::UnboundedReceiver<ClientNotice>)> {
        config.validate()?;

        let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();
        let (notices_tx, notices_rx) = mpsc::unbounded_channel();
        let session = Session::new(config, sink, synthesizer, inputs_tx.clone(), notices_tx)?;
        tokio::spawn(session.run(inputs_rx));
        info!("Live client started");

        Ok((ClientHandle { inputs: inputs_tx }, notices_rx))
    }
}

/// Cloneable command handle for a running client session
#[derive(Clone)]
pub struct ClientHandle {
    inputs: mpsc::UnboundedSender<SessionInput>,
}

impl ClientHandle {
    fn command(&self, command: Command) -> ClientResult<()> {
        self.inputs
            .send(SessionInput::Command(command))
            .map_err(|_| ClientError::Closed)
    }

    /// Connect to the configured gateway URL
    pub fn connect(&self) -> ClientResult<()> {
        self.command(Command::Connect(None))
    }

    pub fn connect_to(&self, url: impl Into<String>) -> ClientResult<()> {
        self.command(Command::Connect(Some(url.into())))
    }

    pub fn disconnect(&self) -> ClientResult<()> {
        self.command(Command::Disconnect)
    }

    /// Send a typed message. Rejections are reported as
    /// [`ClientNotice::TextRejected`].
    pub fn send_text(&self, text: impl Into<String>) -> ClientResult<()> {
        self.command(Command::SendText(text.into()))
    }

    pub fn start_voice(&self) -> ClientResult<()> {
        self.command(Command::StartVoice)
    }

    pub fn stop_voice(&self) -> ClientResult<()> {
        self.command(Command::StopVoice)
    }

    /// Feed one microphone frame of mono samples in `[-1, 1]`
    pub fn push_frame(&self, samples: Vec<f32>) -> ClientResult<()> {
        self.command(Command::AudioFrame(samples))
    }

    pub async fn snapshot(&self) -> ClientResult<SessionSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.command(Command::Snapshot(tx))?;
        rx.await.map_err(|_| ClientError::Closed)
    }

    /// Close the connection and stop the session task
    pub fn shutdown(&self) -> ClientResult<()> {
        self.command(Command::Shutdown)
    }
}
