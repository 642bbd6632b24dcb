//! Shared helpers for integration tests
//!
//! - `ScriptedSpeech`: speech model with configurable synthesis outcome
//! - `spawn_gateway`: in-process gateway on an ephemeral port
//! - `WsClient`: raw protocol client for driving the gateway
//! - tone and silence generators for capture frames

#![allow(dead_code)]

use std::f32::consts::PI;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use live_gateway::core::audio::{encode_pcm16, pcm_mime_type};
use live_gateway::core::speech::{
    AudioInput, SpeechError, SpeechModel, SpeechResult, SynthesizedAudio,
};
use live_gateway::{AppState, ServerConfig, ServerMessage, SharedAgent, routes};

/// Frames wait at most this long in tests
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// What `ScriptedSpeech::synthesize` does
#[derive(Debug, Clone)]
pub enum Synthesis {
    /// Emit `chunks` chunks of `samples` samples each, `delay` apart
    Audio {
        chunks: usize,
        samples: usize,
        delay: Duration,
    },
    /// Finish without audio
    Silent,
    /// Fail before producing anything
    Fail,
}

impl Synthesis {
    /// `chunks` chunks of 100ms at 24kHz
    pub fn short(chunks: usize) -> Self {
        Synthesis::Audio {
            chunks,
            samples: 2400,
            delay: Duration::from_millis(10),
        }
    }
}

/// Speech model for tests. The first synthesis (the greeting) follows
/// `greeting`, later ones follow `reply`. Transcription emits one scripted
/// fragment per received audio chunk until the script runs out.
#[derive(Debug, Clone)]
pub struct ScriptedSpeech {
    pub greeting: Synthesis,
    pub reply: Synthesis,
    pub transcript: Vec<String>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedSpeech {
    pub fn new(synthesis: Synthesis) -> Self {
        Self {
            greeting: synthesis.clone(),
            reply: synthesis,
            transcript: Vec::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn audio(chunks: usize) -> Self {
        Self::new(Synthesis::short(chunks))
    }

    pub fn silent() -> Self {
        Self::new(Synthesis::Silent)
    }

    pub fn failing() -> Self {
        Self::new(Synthesis::Fail)
    }

    pub fn with_reply(mut self, reply: Synthesis) -> Self {
        self.reply = reply;
        self
    }

    pub fn with_transcript(mut self, fragments: &[&str]) -> Self {
        self.transcript = fragments.iter().map(|s| s.to_string()).collect();
        self
    }
}

#[async_trait]
impl SpeechModel for ScriptedSpeech {
    async fn synthesize(
        &self,
        _text: &str,
    ) -> SpeechResult<mpsc::Receiver<SpeechResult<SynthesizedAudio>>> {
        let (tx, rx) = mpsc::channel(16);
        let synthesis = if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.greeting.clone()
        } else {
            self.reply.clone()
        };
        match synthesis {
            Synthesis::Fail => return Err(SpeechError::SynthesisFailed("scripted".to_string())),
            Synthesis::Silent => {}
            Synthesis::Audio {
                chunks,
                samples,
                delay,
            } => {
                tokio::spawn(async move {
                    for _ in 0..chunks {
                        tokio::time::sleep(delay).await;
                        let chunk = SynthesizedAudio {
                            data: Bytes::from(encode_pcm16(&tone(samples, 24_000, 0.2))),
                            mime_type: Some(pcm_mime_type(24_000)),
                        };
                        if tx.send(Ok(chunk)).await.is_err() {
                            break;
                        }
                    }
                });
            }
        }
        Ok(rx)
    }

    async fn transcribe(
        &self,
        mut audio: mpsc::Receiver<AudioInput>,
    ) -> SpeechResult<mpsc::Receiver<String>> {
        let (tx, rx) = mpsc::channel(16);
        let mut script = self.transcript.clone().into_iter();
        tokio::spawn(async move {
            while audio.recv().await.is_some() {
                if let Some(fragment) = script.next()
                    && tx.send(fragment).await.is_err()
                {
                    break;
                }
            }
        });
        Ok(rx)
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Gateway settings suited to tests: no cooldown, short greeting
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        greeting_text: "Hello from the gateway".to_string(),
        response_cooldown_ms: 0,
        ..ServerConfig::default()
    }
}

pub fn test_state(
    config: ServerConfig,
    agent: SharedAgent,
    speech: ScriptedSpeech,
) -> Arc<AppState> {
    AppState::with_backends(config, agent, Arc::new(speech))
}

/// Serve the gateway on an ephemeral localhost port
pub async fn spawn_gateway(state: Arc<AppState>) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        axum::serve(listener, routes::create_app(state))
            .await
            .expect("gateway server failed");
    });
    addr
}

pub fn ws_url(addr: SocketAddr) -> String {
    format!("ws://{}/ws", addr)
}

/// Raw protocol client
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let (stream, _) = connect_async(ws_url(addr))
            .await
            .expect("Failed to connect to gateway");
        Self { stream }
    }

    pub async fn send_json(&mut self, value: Value) {
        self.send_raw(&value.to_string()).await;
    }

    pub async fn send_raw(&mut self, text: &str) {
        self.stream
            .send(Message::Text(text.to_string().into()))
            .await
            .expect("Failed to send frame");
    }

    pub async fn send_binary(&mut self, data: Vec<u8>) {
        self.stream
            .send(Message::Binary(data.into()))
            .await
            .expect("Failed to send frame");
    }

    /// Next server message, or `None` if the socket closed
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        loop {
            let frame = tokio::time::timeout(RECV_TIMEOUT, self.stream.next())
                .await
                .expect("Timed out waiting for a frame");
            match frame {
                Some(Ok(Message::Text(text))) => {
                    return Some(
                        serde_json::from_str(text.as_str()).expect("Unparseable server frame"),
                    );
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return None,
                Some(Ok(_)) => continue,
            }
        }
    }

    /// Collect messages up to and including the first one matching `done`
    pub async fn recv_until(
        &mut self,
        mut done: impl FnMut(&ServerMessage) -> bool,
    ) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Some(message) = self.recv().await {
            let finished = done(&message);
            messages.push(message);
            if finished {
                return messages;
            }
        }
        panic!("Socket closed before the expected message; got {:?}", messages);
    }

    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }
}

/// Mono sine frame
pub fn tone(samples: usize, sample_rate: u32, amplitude: f32) -> Vec<f32> {
    (0..samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * PI * 440.0 * t).sin() * amplitude
        })
        .collect()
}

pub fn silence(samples: usize) -> Vec<f32> {
    vec![0.0; samples]
}
