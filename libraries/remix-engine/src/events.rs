//! Session events
//!
//! The session queues events as it changes state; the shell drains them and
//! updates its controls. Nothing in the engine renders UI directly.

use crate::error::EngineError;
use crate::export::ExportStatus;
use crate::media::{MediaKind, SourceId};
use crate::nodes::{ExportTicket, FrameRequest};
use crate::transport::TransportState;
use serde::{Deserialize, Serialize};

/// Which controls the shell should enable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlState {
    /// Play/pause and stop
    pub transport: bool,

    /// Export trigger
    pub export: bool,

    /// Pitch slider (speed stays usable without a processing graph)
    pub pitch: bool,
}

impl ControlState {
    /// Nothing loaded yet
    pub const fn unloaded() -> Self {
        Self {
            transport: false,
            export: false,
            pitch: true,
        }
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self::unloaded()
    }
}

/// Notice severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeLevel {
    /// Progress information
    Info,
    /// Something failed; the session is still usable
    Error,
}

/// Events emitted by the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// A file was installed as the media source
    MediaLoaded {
        source: SourceId,
        name: String,
        kind: MediaKind,
    },

    /// The previous media source was released
    MediaUnloaded { source: SourceId },

    /// Metadata became available
    MetadataReady {
        source: SourceId,
        duration_ms: Option<u64>,
    },

    /// Processing graph attached (`true`) or unavailable (`false`)
    ProcessingChanged { available: bool },

    /// Transport state changed
    TransportChanged { state: TransportState },

    /// Time display refreshed
    TimeChanged {
        /// `MM:SS / MM:SS`
        label: String,
        position_ms: u64,
        duration_ms: Option<u64>,
    },

    /// Rate controls changed
    RatesChanged {
        speed: f64,
        pitch: f64,
        semitones: f64,
        locked: bool,
        /// e.g. `1.50×`
        speed_label: String,
        pitch_label: String,
    },

    /// Lock toggled
    LockChanged { locked: bool },

    /// Control enablement changed
    ControlsChanged(ControlState),

    /// Export state machine moved
    ExportStatusChanged { status: ExportStatus },

    /// A downloadable artifact is ready
    ExportReady {
        file_name: String,
        mime_type: String,
        size_bytes: usize,
        label: String,
    },

    /// A previous artifact was discarded; the shell should release any URL it created for it
    ExportArtifactReleased { file_name: String },

    /// User-facing status text
    Notice { level: NoticeLevel, message: String },
}

/// Callbacks delivered by the platform
///
/// Each carries the identifier of the resource it belongs to so late
/// callbacks for replaced media, cancelled frames or abandoned exports can
/// be recognised and ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    /// Media metadata (duration, dimensions) became available
    MetadataLoaded { source: SourceId },

    /// Playback position advanced
    TimeUpdate { source: SourceId },

    /// Playback reached the natural end
    Ended { source: SourceId },

    /// A scheduled display refresh fired
    Frame(FrameRequest),

    /// Recorder produced a segment
    RecorderData { ticket: ExportTicket, bytes: Vec<u8> },

    /// Recorder stopped; no further data follows
    RecorderStopped { ticket: ExportTicket },
}

/// Pending event queue
#[derive(Debug, Default)]
pub(crate) struct EventQueue {
    pending: Vec<SessionEvent>,
}

impl EventQueue {
    pub fn push(&mut self, event: SessionEvent) {
        self.pending.push(event);
    }

    pub fn drain(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.pending)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(SessionEvent::Notice {
            level: NoticeLevel::Info,
            message: message.into(),
        });
    }

    /// Queue the user-facing notice for `error`, if it has one
    pub fn error(&mut self, error: &EngineError) {
        if let Some(message) = error.notice() {
            self.push(SessionEvent::Notice {
                level: NoticeLevel::Error,
                message: message.to_string(),
            });
        }
    }
}
