//! Remix - Speed/Pitch Engine
//!
//! Platform-agnostic core of the remix tool: load one audio or video file,
//! change its playback speed and pitch independently or locked together,
//! preview the result and export a processed copy.
//!
//! This crate provides:
//! - Time-scale math (speed and pitch ratios to a semitone offset)
//! - Speed/pitch lock coordination
//! - Processing graph lifecycle (source -> pitch shift -> speakers + capture)
//! - Transport with a once-per-frame display refresh
//! - Export by replaying the source into a recorder
//!
//! # Architecture
//!
//! `remix-engine` never touches audio hardware or codecs. The audio
//! runtime, graph nodes, recorder, media element and frame scheduler are
//! traits ([`AudioBackend`], [`MediaElement`], [`FrameScheduler`], ...)
//! implemented per platform. The engine drives them and reports what
//! happened as [`SessionEvent`]s.
//!
//! # Example: Rates
//!
//! ```rust
//! use remix_engine::LockCoordinator;
//!
//! let mut rates = LockCoordinator::new(1.0, 1.0, false);
//! rates.set_speed(1.5).unwrap();
//! rates.set_pitch(1.0).unwrap();
//!
//! // Faster playback, original pitch: the pitch node shifts down
//! assert!(rates.state().semitones() < 0.0);
//!
//! // Locking copies the last touched control (pitch) onto speed
//! let state = rates.toggle();
//! assert_eq!(state.speed, 1.0);
//! ```
//!
//! # Example: Session
//!
//! ```rust,ignore
//! use remix_engine::{EngineConfig, MediaFile, PlatformEvent, Session};
//!
//! let mut session = Session::new(EngineConfig::load()?, backend, scheduler);
//! let source = session.load_media(MediaFile::new("song.mp3", "audio/mpeg"), element)?;
//! session.handle(PlatformEvent::MetadataLoaded { source }).await?;
//!
//! session.set_speed(1.25)?;
//! session.play().await?;
//!
//! for event in session.drain_events() {
//!     // update controls
//! }
//! ```

pub mod config;
mod error;
pub mod events;
pub mod export;
pub mod format;
pub mod graph;
pub mod lock;
pub mod media;
pub mod nodes;
mod session;
pub mod time_scale;
pub mod transport;

// Public exports
pub use config::EngineConfig;
pub use error::{BackendError, EngineError, Result};
pub use events::{ControlState, NoticeLevel, PlatformEvent, SessionEvent};
pub use export::{ExportArtifact, ExportFailure, ExportStatus};
pub use graph::{GraphHandle, GraphManager};
pub use lock::{LockCoordinator, LockState, RateControl, RateState};
pub use media::{MediaElement, MediaFile, MediaHandle, MediaKind, SourceId};
pub use nodes::{
    AudioBackend, AudioSink, ExportTicket, FrameRequest, FrameScheduler, NodeId, PitchShifter,
    RecorderState, StreamRecorder,
};
pub use session::Session;
pub use transport::{Transport, TransportState};
