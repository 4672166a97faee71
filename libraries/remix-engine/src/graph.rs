//! Processing graph lifecycle
//!
//! One graph per loaded media source:
//!
//! ```text
//! source -> pitch shift -> output -+-> speakers
//!                                  +-> capture destination -> recorder
//! ```
//!
//! Attaching always tears the previous graph down first. A failed build is
//! rolled back node by node and the media element is left playing directly.

use crate::error::{BackendError, EngineError, Result};
use crate::media::{MediaElement, MediaHandle};
use crate::nodes::{
    AudioBackend, AudioSink, ExportTicket, NodeId, PitchShifter, RecorderState, StreamRecorder,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Node identifiers of the live graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphHandle {
    pub source: NodeId,
    pub pitch: NodeId,
    pub output: NodeId,
    pub capture: NodeId,
}

/// A fully wired graph
struct ProcessingGraph {
    source: Box<dyn AudioSink>,
    pitch: Box<dyn PitchShifter>,
    output: Box<dyn AudioSink>,
    capture: Box<dyn AudioSink>,
    recorder: Option<Box<dyn StreamRecorder>>,
}

impl ProcessingGraph {
    fn handle(&self) -> GraphHandle {
        GraphHandle {
            source: self.source.id(),
            pitch: self.pitch.id(),
            output: self.output.id(),
            capture: self.capture.id(),
        }
    }

    fn stop_recorder(&mut self) {
        if let Some(recorder) = self.recorder.as_mut() {
            if recorder.state() == RecorderState::Recording {
                debug!("Stopping recorder bound to torn-down graph");
                recorder.stop();
            }
        }
    }

    fn dispose(mut self) {
        self.stop_recorder();
        self.recorder = None;
        discard(self.source.as_mut());
        discard(self.pitch.as_mut());
        discard(self.output.as_mut());
        discard(self.capture.as_mut());
    }
}

/// Nodes created so far during one attach, kept for rollback
#[derive(Default)]
struct GraphBuilder {
    source: Option<Box<dyn AudioSink>>,
    pitch: Option<Box<dyn PitchShifter>>,
    output: Option<Box<dyn AudioSink>>,
    capture: Option<Box<dyn AudioSink>>,
}

impl GraphBuilder {
    fn build(
        &mut self,
        backend: &mut dyn AudioBackend,
        media: MediaHandle,
        window_size: f64,
        semitones: f64,
    ) -> std::result::Result<(), BackendError> {
        self.source = Some(backend.create_media_source(media)?);

        let pitch = self.pitch.insert(backend.create_pitch_shifter(window_size)?);
        pitch.set_semitones(semitones);
        let pitch_id = pitch.id();

        let output_id = self.output.insert(backend.create_gain()?).id();
        let capture_id = self.capture.insert(backend.create_capture_destination()?).id();
        let speakers = backend.speakers();

        if let Some(source) = self.source.as_mut() {
            source.connect(pitch_id)?;
        }
        if let Some(pitch) = self.pitch.as_mut() {
            pitch.connect(output_id)?;
        }
        if let Some(output) = self.output.as_mut() {
            output.connect(speakers)?;
            output.connect(capture_id)?;
        }

        Ok(())
    }

    fn finish(&mut self) -> Option<ProcessingGraph> {
        match (
            self.source.take(),
            self.pitch.take(),
            self.output.take(),
            self.capture.take(),
        ) {
            (Some(source), Some(pitch), Some(output), Some(capture)) => Some(ProcessingGraph {
                source,
                pitch,
                output,
                capture,
                recorder: None,
            }),
            (source, pitch, output, capture) => {
                self.source = source;
                self.pitch = pitch;
                self.output = output;
                self.capture = capture;
                None
            }
        }
    }

    /// Disconnect and dispose every node created so far
    fn rollback(&mut self) {
        if let Some(mut node) = self.source.take() {
            discard(node.as_mut());
        }
        if let Some(mut node) = self.pitch.take() {
            discard(node.as_mut());
        }
        if let Some(mut node) = self.output.take() {
            discard(node.as_mut());
        }
        if let Some(mut node) = self.capture.take() {
            discard(node.as_mut());
        }
    }
}

fn discard<N: AudioSink + ?Sized>(node: &mut N) {
    node.disconnect();
    node.dispose();
}

/// Owns the processing graph for the current media source
pub struct GraphManager {
    graph: Option<ProcessingGraph>,
    window_size: f64,
}

impl GraphManager {
    /// Create a manager whose pitch nodes use the given analysis window (seconds)
    pub fn new(window_size: f64) -> Self {
        Self {
            graph: None,
            window_size,
        }
    }

    /// Build a graph for `media`, replacing any existing one
    ///
    /// On success the media element's own output is muted so only the
    /// processed signal is heard. On failure every partially built node is
    /// disposed, the element is unmuted and [`EngineError::ProcessingUnavailable`]
    /// is returned.
    pub async fn attach(
        &mut self,
        backend: &mut dyn AudioBackend,
        media: &mut dyn MediaElement,
        semitones: f64,
    ) -> Result<GraphHandle> {
        let resumed = backend.resume().await;
        self.teardown();

        if let Err(e) = resumed {
            warn!("Audio runtime unavailable: {}", e);
            media.set_muted(false);
            return Err(EngineError::ProcessingUnavailable(e.to_string()));
        }

        let mut builder = GraphBuilder::default();
        let built = builder
            .build(backend, media.handle(), self.window_size, semitones)
            .and_then(|()| {
                builder.finish().ok_or_else(|| {
                    BackendError::NodeConstruction("graph left incomplete".to_string())
                })
            });

        match built {
            Ok(graph) => {
                let handle = graph.handle();
                self.graph = Some(graph);
                media.set_muted(true);
                info!(
                    "Processing graph attached (pitch node {:?}, capture {:?})",
                    handle.pitch, handle.capture
                );
                Ok(handle)
            }
            Err(e) => {
                warn!("Processing graph construction failed: {}", e);
                builder.rollback();
                media.set_muted(false);
                Err(EngineError::ProcessingUnavailable(e.to_string()))
            }
        }
    }

    /// Set the pitch node's semitone offset; no-op without a graph
    pub fn set_pitch(&mut self, semitones: f64) {
        if let Some(graph) = self.graph.as_mut() {
            graph.pitch.set_semitones(semitones);
        }
    }

    /// Current pitch node offset, if a graph exists
    pub fn pitch(&self) -> Option<f64> {
        self.graph.as_ref().map(|graph| graph.pitch.semitones())
    }

    /// Stop any bound recorder and dispose every node. Idempotent.
    pub fn teardown(&mut self) {
        if let Some(graph) = self.graph.take() {
            debug!("Tearing down processing graph");
            graph.dispose();
        }
    }

    /// Check if a graph is alive
    pub fn is_attached(&self) -> bool {
        self.graph.is_some()
    }

    /// Node identifiers of the live graph
    pub fn handle(&self) -> Option<GraphHandle> {
        self.graph.as_ref().map(ProcessingGraph::handle)
    }

    /// Capture-destination node of the live graph
    pub fn capture(&self) -> Option<NodeId> {
        self.graph.as_ref().map(|graph| graph.capture.id())
    }

    /// Construct a recorder on the capture destination for one export attempt
    ///
    /// A recorder already bound to the graph is stopped and dropped first.
    pub fn bind_recorder(
        &mut self,
        backend: &mut dyn AudioBackend,
        ticket: ExportTicket,
    ) -> Result<()> {
        let graph = self.graph.as_mut().ok_or(EngineError::ExportUnavailable)?;
        graph.stop_recorder();
        graph.recorder = None;

        let recorder = backend
            .create_recorder(graph.capture.id(), ticket)
            .map_err(|e| EngineError::RecorderUnsupported(e.to_string()))?;

        debug!("Recorder bound for export {:?} ({})", ticket, recorder.mime_type());
        graph.recorder = Some(recorder);
        Ok(())
    }

    /// Start the bound recorder
    pub fn start_recorder(&mut self) -> Result<()> {
        let recorder = self
            .graph
            .as_mut()
            .and_then(|graph| graph.recorder.as_mut())
            .ok_or(EngineError::ExportUnavailable)?;
        recorder
            .start()
            .map_err(|e| EngineError::RecorderUnsupported(e.to_string()))
    }

    /// Ask the bound recorder to stop; returns `true` if it was recording
    pub fn stop_recorder(&mut self) -> bool {
        match self.graph.as_mut().and_then(|graph| graph.recorder.as_mut()) {
            Some(recorder) if recorder.state() == RecorderState::Recording => {
                recorder.stop();
                true
            }
            _ => false,
        }
    }

    /// State of the bound recorder, if any
    pub fn recorder_state(&self) -> Option<RecorderState> {
        self.graph
            .as_ref()
            .and_then(|graph| graph.recorder.as_ref())
            .map(|recorder| recorder.state())
    }

    /// MIME type of the bound recorder, if any
    pub fn recorder_mime_type(&self) -> Option<&str> {
        self.graph
            .as_ref()
            .and_then(|graph| graph.recorder.as_ref())
            .map(|recorder| recorder.mime_type())
    }

    /// Stop (if recording) and drop the bound recorder
    pub fn release_recorder(&mut self) {
        if let Some(graph) = self.graph.as_mut() {
            graph.stop_recorder();
            graph.recorder = None;
        }
    }
}

impl Drop for GraphManager {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for GraphManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphManager")
            .field("graph", &self.handle())
            .field("window_size", &self.window_size)
            .finish()
    }
}
