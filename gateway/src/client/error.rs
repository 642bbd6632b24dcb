use thiserror::Error;

/// Errors surfaced by the client runtime
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid gateway URL: {0}")]
    InvalidUrl(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Audio output failed: {0}")]
    Playback(String),

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("Client runtime has shut down")]
    Closed,

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

pub type ClientResult<T> = Result<T, ClientError>;
