//! Voice Activity Detection (VAD) module
//!
//! Energy-based speech detection for captured microphone frames. Each frame's
//! RMS feeds an exponential moving average which is classified against two
//! thresholds:
//!
//! - above `speech_threshold`: speech observed now (drives barge-in)
//! - below `silence_threshold` for longer than `pause_ms` after speech: a
//!   single "speech paused" signal
//!
//! # Example
//!
//! ```rust,ignore
//! use live_gateway::core::vad::{EnergyVAD, VADConfig, VoiceActivityDetector};
//!
//! let mut vad = EnergyVAD::new(VADConfig::default())?;
//! let result = vad.process_frame(&samples, tokio::time::Instant::now());
//!
//! if result.speech_paused {
//!     println!("User paused");
//! }
//! ```

pub mod config;
pub mod detector;

pub use config::VADConfig;
pub use detector::{EnergyVAD, VADResult, VoiceActivityDetector};

use anyhow::Result;

/// Create a VAD instance with the given configuration
pub fn create_vad(config: VADConfig) -> Result<Box<dyn VoiceActivityDetector>> {
    Ok(Box::new(EnergyVAD::new(config)?))
}
