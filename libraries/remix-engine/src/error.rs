//! Error types for the remix engine

use thiserror::Error;

/// Errors reported by platform primitives (audio runtime, nodes, recorders, media)
///
/// Backends return these from the capability traits in [`crate::nodes`] and
/// [`crate::media`]. The engine converts them into [`EngineError`] variants
/// that carry user-facing meaning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Audio runtime could not be started or resumed
    #[error("Audio runtime error: {0}")]
    Runtime(String),

    /// A processing node could not be constructed
    #[error("Node construction failed: {0}")]
    NodeConstruction(String),

    /// Two nodes could not be connected
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Capture recorder could not be constructed or started
    #[error("Recorder error: {0}")]
    Recorder(String),

    /// Media element refused to play
    #[error("Playback error: {0}")]
    Playback(String),

    /// Handle does not refer to a live node or media element
    #[error("Unknown handle: {0}")]
    UnknownHandle(String),
}

/// Engine errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Processing graph failed to construct; playback falls back to the raw source
    #[error("Audio processing unavailable: {0}")]
    ProcessingUnavailable(String),

    /// Capture recorder could not be constructed
    #[error("Recorder unsupported: {0}")]
    RecorderUnsupported(String),

    /// Recorder stopped without producing any data
    #[error("Recorder produced no audio")]
    EmptyCapture,

    /// Playback could not start
    #[error("Playback failed to start: {0}")]
    PlaybackStart(String),

    /// Export requested with no loaded source or processing graph
    #[error("Export unavailable: no processed source is loaded")]
    ExportUnavailable,

    /// Export requested while another export is running
    #[error("An export is already in progress")]
    ExportInProgress,

    /// File is neither audio nor video
    #[error("Unsupported media type: {0}")]
    UnsupportedMedia(String),

    /// Rate value is NaN or infinite
    #[error("Invalid ratio: {0}")]
    InvalidRatio(f64),

    /// Operation requires a loaded media source
    #[error("No media loaded")]
    NoMediaLoaded,

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Platform primitive failure not covered by a more specific variant
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl EngineError {
    /// Short user-facing message for the error surface
    ///
    /// Returns `None` for errors that are programming mistakes rather than
    /// conditions the user should be told about.
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            EngineError::ProcessingUnavailable(_) => {
                Some("Audio processing is unavailable; playing without speed/pitch processing.")
            }
            EngineError::RecorderUnsupported(_) => {
                Some("Could not start recording. Try a platform that supports audio capture.")
            }
            EngineError::EmptyCapture => Some("No audio data was produced."),
            EngineError::PlaybackStart(_) => Some("Could not play the file for export."),
            EngineError::ExportUnavailable => Some("Load a file before exporting."),
            EngineError::ExportInProgress => Some("An export is already running."),
            EngineError::UnsupportedMedia(_) => Some("Please choose an audio or video file."),
            EngineError::Backend(BackendError::Runtime(_)) => {
                Some("The audio system could not be started.")
            }
            EngineError::InvalidRatio(_)
            | EngineError::NoMediaLoaded
            | EngineError::Config(_)
            | EngineError::Backend(_) => None,
        }
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
