//! WAV capture recorder
use crate::render::{lock, BackendEvent, SharedGraph};
use remix_audio::{encode_wav, WAV_MIME_TYPE};
use remix_engine::{BackendError, ExportTicket, NodeId, RecorderState, StreamRecorder};
use tracing::{debug, warn};

/// Records a capture-destination node and delivers the take as WAV
///
/// Stopping produces at most one data segment followed by a stop
/// notification, both tagged with the recorder's ticket and delivered
/// through the backend's event channel.
#[derive(Debug)]
pub struct WavStreamRecorder {
    capture: NodeId,
    ticket: ExportTicket,
    sample_rate: u32,
    graph: SharedGraph,
    state: RecorderState,
}

impl WavStreamRecorder {
    pub(crate) fn new(
        capture: NodeId,
        ticket: ExportTicket,
        sample_rate: u32,
        graph: SharedGraph,
    ) -> Self {
        Self {
            capture,
            ticket,
            sample_rate,
            graph,
            state: RecorderState::Inactive,
        }
    }

    pub fn ticket(&self) -> ExportTicket {
        self.ticket
    }
}

impl StreamRecorder for WavStreamRecorder {
    fn start(&mut self) -> Result<(), BackendError> {
        if self.state == RecorderState::Recording {
            return Err(BackendError::Recorder("already recording".to_string()));
        }
        lock(&self.graph)?.start_capture(self.capture)?;
        self.state = RecorderState::Recording;
        debug!("Recorder {:?} started on node {}", self.ticket, self.capture.0);
        Ok(())
    }

    fn stop(&mut self) {
        if self.state != RecorderState::Recording {
            return;
        }
        self.state = RecorderState::Inactive;

        // The stop notification must go out even if a render panicked
        let mut graph = self.graph.lock().unwrap_or_else(|poisoned| {
            warn!("Recorder {:?} stopping on a poisoned graph", self.ticket);
            poisoned.into_inner()
        });

        let samples = graph.take_capture(self.capture).unwrap_or_default();
        if !samples.is_empty() {
            match encode_wav(&samples, self.sample_rate) {
                Ok(bytes) => graph.emit(BackendEvent::RecorderData {
                    ticket: self.ticket,
                    bytes,
                }),
                Err(e) => warn!("Recorder {:?} failed to encode: {}", self.ticket, e),
            }
        }
        graph.emit(BackendEvent::RecorderStopped {
            ticket: self.ticket,
        });
        debug!(
            "Recorder {:?} stopped after {} frames",
            self.ticket,
            samples.len() / 2
        );
    }

    fn state(&self) -> RecorderState {
        self.state
    }

    fn mime_type(&self) -> &str {
        WAV_MIME_TYPE
    }
}
