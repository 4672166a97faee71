//! Platform capability traits
//!
//! The engine never touches audio hardware, codecs or a concrete pitch
//! algorithm. Platforms implement these traits (Web Audio nodes, a native
//! render graph, test doubles) and the engine drives them.

use crate::error::BackendError;
use crate::media::MediaHandle;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identifier of a node inside a backend's audio graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Generation number tagging one export attempt
///
/// Recorders are constructed with the ticket of the attempt they belong to
/// and must report data and stop callbacks with it. Callbacks carrying an
/// older ticket are ignored by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExportTicket(pub u64);

/// Any node that can be routed into another node
pub trait AudioSink: Send {
    /// Node identifier inside the backend graph
    fn id(&self) -> NodeId;

    /// Route this node's output into `next`
    fn connect(&mut self, next: NodeId) -> Result<(), BackendError>;

    /// Remove every outgoing connection
    fn disconnect(&mut self);

    /// Release the node; it must not be used afterwards
    fn dispose(&mut self);
}

/// Pitch-shift node with a semitone parameter
pub trait PitchShifter: AudioSink {
    /// Set the pitch offset in semitones
    fn set_semitones(&mut self, semitones: f64);

    /// Current pitch offset in semitones
    fn semitones(&self) -> f64;
}

/// Recorder state as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecorderState {
    /// Not capturing
    Inactive,
    /// Capturing
    Recording,
}

/// Stream recorder bound to a capture-destination node
///
/// Data and stop notifications are delivered asynchronously by the platform
/// through [`crate::Session::on_recorder_data`] and
/// [`crate::Session::on_recorder_stopped`], tagged with the recorder's
/// [`ExportTicket`].
pub trait StreamRecorder: Send {
    /// Begin capturing
    fn start(&mut self) -> Result<(), BackendError>;

    /// Stop capturing; the platform later reports any pending data followed by a stop event
    fn stop(&mut self);

    /// Current recorder state
    fn state(&self) -> RecorderState;

    /// MIME type of the produced segments (e.g. `audio/webm`)
    fn mime_type(&self) -> &str;
}

/// Audio runtime and node factory
#[async_trait]
pub trait AudioBackend: Send {
    /// Start or resume the audio runtime
    ///
    /// Browsers require a user gesture before audio may start; native
    /// backends usually succeed immediately.
    async fn resume(&mut self) -> Result<(), BackendError>;

    /// Wrap a media element as a graph source node
    fn create_media_source(&mut self, media: MediaHandle) -> Result<Box<dyn AudioSink>, BackendError>;

    /// Create a pitch-shift node with the given analysis window (seconds)
    fn create_pitch_shifter(&mut self, window_size: f64) -> Result<Box<dyn PitchShifter>, BackendError>;

    /// Create a unity-gain output node
    fn create_gain(&mut self) -> Result<Box<dyn AudioSink>, BackendError>;

    /// Create a node whose input can be captured by a recorder
    fn create_capture_destination(&mut self) -> Result<Box<dyn AudioSink>, BackendError>;

    /// Node representing the speakers
    fn speakers(&self) -> NodeId;

    /// Construct a recorder reading from `capture`
    fn create_recorder(
        &mut self,
        capture: NodeId,
        ticket: ExportTicket,
    ) -> Result<Box<dyn StreamRecorder>, BackendError>;
}

/// Handle for one scheduled display refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRequest(pub u64);

/// Once-per-rendered-frame scheduler (`requestAnimationFrame` and friends)
pub trait FrameScheduler: Send {
    /// Ask for one callback on the next frame
    fn request_frame(&mut self) -> FrameRequest;

    /// Cancel a pending callback
    fn cancel_frame(&mut self, request: FrameRequest);
}
