//! Integration tests for the energy VAD
//!
//! Feeds generated capture frames through the detector on a simulated clock
//! and checks speech onsets and pause detection.

mod common;

use std::time::Duration;

use tokio::time::Instant;

use common::{silence, tone};
use live_gateway::core::vad::{EnergyVAD, VADConfig, VoiceActivityDetector, create_vad};

const FRAME: usize = 1600; // 100ms at 16kHz
const FRAME_DURATION: Duration = Duration::from_millis(100);

/// Run frames through `vad`, returning (frame index, result) for each
fn run(
    vad: &mut dyn VoiceActivityDetector,
    frames: &[Vec<f32>],
) -> Vec<live_gateway::core::vad::VADResult> {
    let start = Instant::now();
    frames
        .iter()
        .enumerate()
        .map(|(i, frame)| vad.process_frame(frame, start + FRAME_DURATION * i as u32))
        .collect()
}

#[test]
fn test_vad_config_default() {
    let config = VADConfig::default();
    assert_eq!(config.speech_threshold, 0.035);
    assert_eq!(config.silence_threshold, 0.015);
    assert_eq!(config.pause_ms, 650);
    assert_eq!(config.sample_rate, 16000);
    assert!(config.validate().is_ok());
}

#[test]
fn test_silence_never_triggers() {
    let mut vad = create_vad(VADConfig::default()).unwrap();
    let frames = vec![silence(FRAME); 30];
    let results = run(vad.as_mut(), &frames);
    assert!(results.iter().all(|r| !r.is_speech && !r.speech_paused));
    assert!(!vad.is_speaking());
}

#[test]
fn test_utterance_then_pause() {
    let mut vad = EnergyVAD::new(VADConfig::default()).unwrap();

    // 1s of speech, then 1.5s of silence
    let mut frames = vec![tone(FRAME, 16_000, 0.3); 10];
    frames.extend(vec![silence(FRAME); 15]);
    let results = run(&mut vad, &frames);

    let onset = results.iter().position(|r| r.is_speech).unwrap();
    assert!(onset < 3, "speech detected late at frame {}", onset);

    let pauses: Vec<_> = results
        .iter()
        .enumerate()
        .filter(|(_, r)| r.speech_paused)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(pauses.len(), 1, "pause should fire exactly once");
    // Silence starts at frame 10; smoothing delays the drop below threshold
    assert!(pauses[0] >= 17, "pause fired early at frame {}", pauses[0]);
}

#[test]
fn test_short_gap_is_not_a_pause() {
    let mut vad = EnergyVAD::new(VADConfig::default()).unwrap();

    let mut frames = vec![tone(FRAME, 16_000, 0.3); 5];
    frames.extend(vec![silence(FRAME); 3]);
    frames.extend(vec![tone(FRAME, 16_000, 0.3); 5]);
    let results = run(&mut vad, &frames);
    assert!(results.iter().all(|r| !r.speech_paused));
}

#[test]
fn test_quiet_noise_stays_below_threshold() {
    let mut vad = EnergyVAD::new(VADConfig::default()).unwrap();
    let frames = vec![tone(FRAME, 16_000, 0.01); 20];
    let results = run(&mut vad, &frames);
    assert!(results.iter().all(|r| !r.is_speech));
}

#[test]
fn test_reset_between_sessions() {
    let mut vad = EnergyVAD::new(VADConfig::default()).unwrap();
    run(&mut vad, &vec![tone(FRAME, 16_000, 0.3); 5]);
    assert!(vad.level() > 0.0);

    vad.reset();
    assert_eq!(vad.level(), 0.0);
    assert!(!vad.is_speaking());
}
