//! Error types for parley

use thiserror::Error;

/// Result type alias for parley operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in parley
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// No usable capture/playback hardware; the session degrades to
    /// text-only or silent mode instead of retrying per turn
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Audio processing error (encode/decode, stream setup)
    #[error("audio error: {0}")]
    Audio(String),

    /// Transcription backend error
    #[error("transcription error: {0}")]
    Transcription(String),

    /// Completion backend error
    #[error("completion error: {0}")]
    Completion(String),

    /// Playback error surfaced only after the fallback player also failed
    #[error("playback error: {0}")]
    Playback(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
