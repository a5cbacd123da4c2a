//! Error types for the companion client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur talking to the backend or the audio devices
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level HTTP failure
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("server error {status}: {message}")]
    Status { status: u16, message: String },

    /// Payload could not be decoded (base64, MP3, ...)
    #[error("decode error: {0}")]
    Decode(String),

    /// Audio device or stream error
    #[error("audio error: {0}")]
    Audio(String),

    /// Microphone unavailable or access denied
    #[error("microphone error: {0}")]
    Microphone(String),
}
