/// Desktop binding errors
use remix_audio::AudioError;
use remix_engine::{BackendError, EngineError};
use thiserror::Error;

/// Result type for desktop operations
pub type Result<T> = std::result::Result<T, DesktopError>;

/// Desktop errors
#[derive(Debug, Error)]
pub enum DesktopError {
    /// A thread panicked while holding the render graph
    #[error("Render graph lock poisoned")]
    Poisoned,

    /// Audio device not found
    #[error("Audio device not found")]
    DeviceNotFound,

    /// Failed to build or start the output stream
    #[error("Output stream error: {0}")]
    Stream(String),

    /// Output thread is gone
    #[error("Output thread disconnected")]
    Disconnected,

    /// Invalid desktop configuration
    #[error("Invalid desktop configuration: {0}")]
    Config(String),

    /// Decoding or encoding failed
    #[error(transparent)]
    Audio(#[from] AudioError),

    /// Session rejected the operation
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl From<cpal::BuildStreamError> for DesktopError {
    fn from(err: cpal::BuildStreamError) -> Self {
        DesktopError::Stream(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for DesktopError {
    fn from(err: cpal::PlayStreamError) -> Self {
        DesktopError::Stream(err.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for DesktopError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        DesktopError::Stream(err.to_string())
    }
}

impl From<DesktopError> for BackendError {
    fn from(err: DesktopError) -> Self {
        BackendError::Runtime(err.to_string())
    }
}
