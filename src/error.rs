//! Error types for the relay

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Video error: {0}")]
    Video(#[from] VideoError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Video capture and encoding errors
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Frame capture failed: {0}")]
    CaptureFailed(String),

    #[error("Frame encode failed: {0}")]
    EncodeFailed(String),
}

/// Audio capture errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Audio input device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open audio stream: {0}")]
    OpenFailed(String),

    #[error("Audio stream error: {0}")]
    StreamError(String),

    #[error("Audio device disconnected")]
    Disconnected,
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
