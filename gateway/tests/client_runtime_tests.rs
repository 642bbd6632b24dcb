//! Client Runtime Tests
//!
//! Runs `LiveClient` against an in-process gateway and follows the
//! notices it reports.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use common::{ScriptedSpeech, Synthesis, spawn_gateway, test_config, test_state, tone, ws_url};
use live_gateway::client::{
    ClientHandle, ClientNotice, CloseReason, ConnectionState, GreetingUnlock, LiveClient,
    LogSynthesizer, NullSink, TextRejection, VoiceState,
};
use live_gateway::{ClientConfig, EchoAgentBackend};

const NOTICE_TIMEOUT: Duration = Duration::from_secs(10);

async fn gateway(speech: ScriptedSpeech) -> SocketAddr {
    let agent = Arc::new(EchoAgentBackend::new().with_tool("lookup"));
    spawn_gateway(test_state(test_config(), agent, speech)).await
}

fn client_config(addr: SocketAddr) -> ClientConfig {
    ClientConfig {
        url: ws_url(addr),
        playback_idle_ms: 50,
        greeting_timeout_ms: 3000,
        health_interval_seconds: 3600,
        ..ClientConfig::default()
    }
}

fn start(config: ClientConfig) -> (ClientHandle, mpsc::UnboundedReceiver<ClientNotice>) {
    LiveClient::spawn(
        config,
        Arc::new(NullSink),
        Arc::new(LogSynthesizer::new(Duration::from_millis(10))),
    )
    .expect("client should start")
}

/// Skip notices until one matches
async fn wait_for(
    notices: &mut mpsc::UnboundedReceiver<ClientNotice>,
    matches: impl Fn(&ClientNotice) -> bool,
) -> ClientNotice {
    tokio::time::timeout(NOTICE_TIMEOUT, async {
        loop {
            let notice = notices.recv().await.expect("client stopped");
            if matches(&notice) {
                return notice;
            }
        }
    })
    .await
    .expect("Timed out waiting for notice")
}

async fn connected(
    notices: &mut mpsc::UnboundedReceiver<ClientNotice>,
) -> (u64, u32) {
    match wait_for(notices, |n| matches!(n, ClientNotice::Connected { .. })).await {
        ClientNotice::Connected {
            generation,
            reconnect_count,
        } => (generation, reconnect_count),
        _ => unreachable!(),
    }
}

async fn voice_state(notices: &mut mpsc::UnboundedReceiver<ClientNotice>, state: VoiceState) {
    wait_for(notices, |n| *n == ClientNotice::VoiceChanged { state }).await;
}

#[tokio::test]
async fn test_text_round_trip() {
    let addr = gateway(ScriptedSpeech::silent()).await;
    let (client, mut notices) = start(client_config(addr));

    client.send_text("too early").unwrap();
    wait_for(&mut notices, |n| {
        *n == ClientNotice::TextRejected {
            reason: TextRejection::NotConnected,
        }
    })
    .await;

    client.connect().unwrap();
    connected(&mut notices).await;

    client.send_text("status report").unwrap();
    let response = wait_for(&mut notices, |n| {
        matches!(n, ClientNotice::AgentResponse { .. })
    })
    .await;
    assert!(matches!(
        response,
        ClientNotice::AgentResponse { text, .. } if text == "You said: status report"
    ));

    let snapshot = client.snapshot().await.unwrap();
    assert_eq!(snapshot.connection, ConnectionState::Open);
    assert!(!snapshot.in_flight);
    let activity = snapshot.activity.expect("activity timeline");
    assert!(activity.finished);
    assert_eq!(activity.entries.len(), 1);
    assert_eq!(activity.progress.completed, 1);

    client.shutdown().unwrap();
}

#[tokio::test]
async fn test_health_probe_reports_latency() {
    let addr = gateway(ScriptedSpeech::silent()).await;
    let (client, mut notices) = start(client_config(addr));
    client.connect().unwrap();

    let notice = wait_for(&mut notices, |n| matches!(n, ClientNotice::Health { .. })).await;
    match notice {
        ClientNotice::Health { sample } => assert!(sample.is_healthy()),
        _ => unreachable!(),
    }
    assert!(client.snapshot().await.unwrap().latency_ms.is_some());
}

#[tokio::test]
async fn test_disconnect_and_reconnect() {
    let addr = gateway(ScriptedSpeech::silent()).await;
    let (client, mut notices) = start(client_config(addr));

    client.connect().unwrap();
    let (first, count) = connected(&mut notices).await;
    assert_eq!(count, 0);

    client.disconnect().unwrap();
    wait_for(&mut notices, |n| {
        *n == ClientNotice::Disconnected {
            reason: CloseReason::UserRequested,
        }
    })
    .await;

    client.connect().unwrap();
    let (second, count) = connected(&mut notices).await;
    assert_eq!(second, first + 1);
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_unreachable_gateway_reports_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (client, mut notices) = start(client_config(addr));
    client.connect().unwrap();

    wait_for(&mut notices, |n| matches!(n, ClientNotice::SocketError { .. })).await;
    wait_for(&mut notices, |n| {
        *n == ClientNotice::Disconnected {
            reason: CloseReason::AfterError,
        }
    })
    .await;
    let snapshot = client.snapshot().await.unwrap();
    assert_eq!(snapshot.connection, ConnectionState::Disconnected);
    assert_eq!(snapshot.reconnect_count, 0);
}

#[tokio::test]
async fn test_greeting_audio_unlocks_capture() {
    let addr = gateway(ScriptedSpeech::audio(2)).await;
    let (client, mut notices) = start(client_config(addr));
    client.connect().unwrap();
    connected(&mut notices).await;

    client.start_voice().unwrap();
    voice_state(&mut notices, VoiceState::AwaitingGreeting).await;

    // Suppressed while the greeting plays
    client.push_frame(tone(1600, 16_000, 0.3)).unwrap();
    assert_eq!(client.snapshot().await.unwrap().frames_sent, 0);

    wait_for(&mut notices, |n| {
        *n == ClientNotice::GreetingUnlocked {
            how: GreetingUnlock::Played,
        }
    })
    .await;
    voice_state(&mut notices, VoiceState::Listening).await;

    client.push_frame(tone(1600, 16_000, 0.3)).unwrap();
    assert_eq!(client.snapshot().await.unwrap().frames_sent, 1);
}

#[tokio::test]
async fn test_silent_greeting_uses_local_fallback() {
    let addr = gateway(ScriptedSpeech::silent()).await;
    let (client, mut notices) = start(client_config(addr));
    client.connect().unwrap();
    connected(&mut notices).await;

    client.start_voice().unwrap();
    wait_for(&mut notices, |n| {
        *n == ClientNotice::GreetingUnlocked {
            how: GreetingUnlock::Fallback,
        }
    })
    .await;
    assert_eq!(
        client.snapshot().await.unwrap().voice,
        VoiceState::Listening
    );
}

#[tokio::test]
async fn test_greeting_timeout_falls_back_to_known_text() {
    // Greeting audio would take far longer than the timeout to arrive
    let speech = ScriptedSpeech::new(Synthesis::Audio {
        chunks: 1,
        samples: 2400,
        delay: Duration::from_secs(60),
    });
    let addr = gateway(speech).await;
    let config = ClientConfig {
        greeting_timeout_ms: 300,
        ..client_config(addr)
    };
    let (client, mut notices) = start(config);
    client.connect().unwrap();
    connected(&mut notices).await;

    client.start_voice().unwrap();
    wait_for(&mut notices, |n| {
        *n == ClientNotice::GreetingUnlocked {
            how: GreetingUnlock::Fallback,
        }
    })
    .await;
    voice_state(&mut notices, VoiceState::Listening).await;
}

#[tokio::test]
async fn test_barge_in_stops_agent_audio() {
    // Three seconds of reply audio
    let speech = ScriptedSpeech::audio(1)
        .with_reply(Synthesis::Audio {
            chunks: 3,
            samples: 24_000,
            delay: Duration::from_millis(10),
        })
        .with_transcript(&["tell me a story"]);
    let addr = gateway(speech).await;
    let (client, mut notices) = start(client_config(addr));
    client.connect().unwrap();
    connected(&mut notices).await;

    client.start_voice().unwrap();
    voice_state(&mut notices, VoiceState::Listening).await;

    client.push_frame(tone(1600, 16_000, 0.3)).unwrap();
    voice_state(&mut notices, VoiceState::Speaking).await;

    client.push_frame(tone(1600, 16_000, 0.3)).unwrap();
    wait_for(&mut notices, |n| *n == ClientNotice::BargeIn).await;
    voice_state(&mut notices, VoiceState::Listening).await;

    let snapshot = client.snapshot().await.unwrap();
    assert_eq!(snapshot.voice, VoiceState::Listening);
    assert!(snapshot.playback_idle);
}

#[tokio::test]
async fn test_stop_voice_returns_to_idle() {
    let addr = gateway(ScriptedSpeech::audio(1)).await;
    let (client, mut notices) = start(client_config(addr));
    client.connect().unwrap();
    connected(&mut notices).await;

    client.start_voice().unwrap();
    voice_state(&mut notices, VoiceState::Listening).await;

    client.stop_voice().unwrap();
    voice_state(&mut notices, VoiceState::Idle).await;
    client.push_frame(tone(1600, 16_000, 0.3)).unwrap();

    let snapshot = client.snapshot().await.unwrap();
    assert_eq!(snapshot.frames_sent, 0);
    assert!(!snapshot.awaiting_greeting);
}
