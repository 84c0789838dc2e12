//! Audio backend error types

use thiserror::Error;

/// Errors that can occur while setting up audio output
#[derive(Error, Debug)]
pub enum AudioError {
    /// No audio devices available
    #[error("No audio output devices found")]
    NoDevices,

    /// Device not found by name
    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    /// Failed to enumerate or query device configurations
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// The device cannot run at the engine rate
    #[error("Device does not support {0} Hz f32 output")]
    UnsupportedSampleRate(u32),

    /// Failed to build the output stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start the output stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
