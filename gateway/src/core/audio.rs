//! PCM16 framing helpers shared by capture and playback
//!
//! Audio crosses the wire as base64 of signed 16-bit little-endian mono
//! samples. In memory both directions use `f32` samples in `[-1.0, 1.0]`.

use base64::prelude::*;
use thiserror::Error;

/// Playback sample rate used when `live_audio` carries no usable rate
pub const DEFAULT_PLAYBACK_SAMPLE_RATE: u32 = 24_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AudioError {
    #[error("invalid base64 audio: {0}")]
    Base64(String),

    #[error("PCM16 payload has odd length {0}")]
    OddLength(usize),

    #[error("empty audio payload")]
    Empty,
}

/// Convert float samples to PCM16 little-endian bytes.
///
/// Samples are clamped to `[-1, 1]`; negative values scale by 32768 and
/// positive values by 32767 so both extremes map onto the i16 range.
pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let s = if sample.is_nan() {
            0.0
        } else {
            sample.clamp(-1.0, 1.0)
        };
        let value = if s < 0.0 {
            (s * 32768.0) as i16
        } else {
            (s * 32767.0) as i16
        };
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

/// Convert PCM16 little-endian bytes to float samples.
pub fn decode_pcm16(bytes: &[u8]) -> Result<Vec<f32>, AudioError> {
    if bytes.len() % 2 != 0 {
        return Err(AudioError::OddLength(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect())
}

pub fn encode_base64(bytes: &[u8]) -> String {
    BASE64_STANDARD.encode(bytes)
}

pub fn decode_base64(payload: &str) -> Result<Vec<u8>, AudioError> {
    BASE64_STANDARD
        .decode(payload.trim())
        .map_err(|e| AudioError::Base64(e.to_string()))
}

/// Decode a `live_audio` payload into samples.
pub fn decode_payload(payload: &str) -> Result<Vec<f32>, AudioError> {
    let bytes = decode_base64(payload)?;
    if bytes.is_empty() {
        return Err(AudioError::Empty);
    }
    decode_pcm16(&bytes)
}

/// Extract `rate=N` from a mime type such as `audio/pcm;rate=24000`.
pub fn sample_rate_from_mime(mime_type: &str) -> Option<u32> {
    mime_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("rate") {
            value.trim().parse::<u32>().ok().filter(|rate| *rate > 0)
        } else {
            None
        }
    })
}

pub fn pcm_mime_type(sample_rate: u32) -> String {
    format!("audio/pcm;rate={sample_rate}")
}

/// Root mean square of a frame. Empty frames have zero energy.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

/// Playback duration of `samples` at `sample_rate`.
pub fn duration_of(samples: usize, sample_rate: u32) -> std::time::Duration {
    if sample_rate == 0 {
        return std::time::Duration::ZERO;
    }
    std::time::Duration::from_secs_f64(samples as f64 / sample_rate as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_extremes_and_clamping() {
        let bytes = encode_pcm16(&[1.0, -1.0, 0.0, 2.5, -3.0]);
        let values: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|p| i16::from_le_bytes([p[0], p[1]]))
            .collect();
        assert_eq!(values, vec![32767, -32768, 0, 32767, -32768]);
    }

    #[test]
    fn test_encode_is_little_endian() {
        let bytes = encode_pcm16(&[-1.0]);
        assert_eq!(bytes, vec![0x00, 0x80]);
    }

    #[test]
    fn test_decode_rejects_odd_length() {
        assert_eq!(decode_pcm16(&[0, 1, 2]), Err(AudioError::OddLength(3)));
    }

    #[test]
    fn test_decode_scale() {
        let samples = decode_pcm16(&[0x00, 0x80, 0x00, 0x40]).unwrap();
        assert_eq!(samples, vec![-1.0, 0.5]);
    }

    #[test]
    fn test_decode_payload_errors() {
        assert!(matches!(
            decode_payload("not base64!!"),
            Err(AudioError::Base64(_))
        ));
        assert_eq!(decode_payload(""), Err(AudioError::Empty));
    }

    #[test]
    fn test_sample_rate_from_mime() {
        assert_eq!(sample_rate_from_mime("audio/pcm;rate=24000"), Some(24_000));
        assert_eq!(sample_rate_from_mime("audio/pcm; Rate = 16000"), Some(16_000));
        assert_eq!(sample_rate_from_mime("audio/pcm"), None);
        assert_eq!(sample_rate_from_mime("audio/pcm;rate=fast"), None);
        assert_eq!(sample_rate_from_mime("audio/pcm;rate=0"), None);
    }

    #[test]
    fn test_rms() {
        assert_eq!(rms(&[]), 0.0);
        assert!((rms(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_duration_of() {
        assert_eq!(duration_of(24_000, 24_000).as_millis(), 1000);
        assert_eq!(duration_of(100, 0), std::time::Duration::ZERO);
    }
}
