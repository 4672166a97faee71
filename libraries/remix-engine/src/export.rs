//! Export pipeline state
//!
//! Tracks one capture attempt at a time:
//!
//! ```text
//! Idle -> Recording -> Finalizing -> Succeeded
//!             |             |
//!             +-------------+-------> Failed
//! ```
//!
//! Every attempt gets a fresh [`ExportTicket`]. Data and stop callbacks that
//! carry any other ticket belong to an abandoned attempt and are dropped.
//! Orchestration (recorder, transport, controls) lives in the session; this
//! module owns the state machine, the captured segments and the artifact.

use crate::error::EngineError;
use crate::format::artifact_file_name;
use crate::nodes::ExportTicket;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Why an export attempt failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFailure {
    /// Recorder could not be constructed or started
    RecorderUnsupported(String),
    /// Recorder stopped without producing data
    EmptyCapture,
    /// Replay for export could not begin
    PlaybackStartFailure(String),
}

impl From<ExportFailure> for EngineError {
    fn from(failure: ExportFailure) -> Self {
        match failure {
            ExportFailure::RecorderUnsupported(reason) => EngineError::RecorderUnsupported(reason),
            ExportFailure::EmptyCapture => EngineError::EmptyCapture,
            ExportFailure::PlaybackStartFailure(reason) => EngineError::PlaybackStart(reason),
        }
    }
}

/// Export status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportStatus {
    Idle,
    /// Source is replaying into the recorder
    Recording,
    /// Recorder asked to stop; waiting for its final data
    Finalizing,
    /// Artifact ready
    Succeeded,
    Failed(ExportFailure),
}

impl ExportStatus {
    /// Recording or finalizing
    pub fn is_active(&self) -> bool {
        matches!(self, ExportStatus::Recording | ExportStatus::Finalizing)
    }
}

/// Encoded export result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportArtifact {
    /// `<basename>-<suffix>.<extension>`
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    /// Human-readable download label
    pub label: String,
}

/// Naming inputs for a finished artifact
#[derive(Debug, Clone, Copy)]
pub struct ArtifactNaming<'a> {
    pub basename: &'a str,
    pub suffix: &'a str,
    pub extension: &'a str,
    pub mime_type: &'a str,
    pub label: &'a str,
}

/// Outcome of a recorder-stopped callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finalized {
    /// Callback belonged to an abandoned or already settled attempt
    Ignored,
    Succeeded,
    Failed(ExportFailure),
}

/// Export state machine
#[derive(Debug)]
pub struct ExportPipeline {
    status: ExportStatus,
    chunks: Vec<Vec<u8>>,
    artifact: Option<ExportArtifact>,
    ticket: ExportTicket,
    end_listener: bool,
}

impl ExportPipeline {
    pub fn new() -> Self {
        Self {
            status: ExportStatus::Idle,
            chunks: Vec::new(),
            artifact: None,
            ticket: ExportTicket(0),
            end_listener: false,
        }
    }

    /// Current status
    pub fn status(&self) -> &ExportStatus {
        &self.status
    }

    /// Check if an attempt is recording or finalizing
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Ticket of the current (or most recent) attempt
    pub fn ticket(&self) -> ExportTicket {
        self.ticket
    }

    /// Finished artifact, if the last attempt succeeded
    pub fn artifact(&self) -> Option<&ExportArtifact> {
        self.artifact.as_ref()
    }

    /// Number of segments captured by the current attempt
    pub fn captured_segments(&self) -> usize {
        self.chunks.len()
    }

    /// Reset for a new attempt
    ///
    /// Discards captured segments, bumps the ticket and returns the prior
    /// artifact so the caller can announce its release.
    pub fn begin(&mut self) -> (ExportTicket, Option<ExportArtifact>) {
        let released = self.artifact.take();
        self.chunks.clear();
        self.end_listener = false;
        self.status = ExportStatus::Idle;
        self.ticket = ExportTicket(self.ticket.0 + 1);
        debug!("Export attempt {:?} prepared", self.ticket);
        (self.ticket, released)
    }

    /// Recorder is bound; arm the natural-end listener
    pub fn mark_recording(&mut self) {
        self.status = ExportStatus::Recording;
        self.end_listener = true;
    }

    /// Recorder was asked to stop
    pub fn mark_finalizing(&mut self) {
        if self.status == ExportStatus::Recording {
            self.status = ExportStatus::Finalizing;
        }
    }

    /// Consume the one-shot natural-end listener
    ///
    /// Returns `true` exactly once per armed attempt.
    pub fn take_end_listener(&mut self) -> bool {
        std::mem::take(&mut self.end_listener)
    }

    /// Settle the current attempt as failed
    pub fn fail(&mut self, failure: ExportFailure) {
        warn!("Export {:?} failed: {:?}", self.ticket, failure);
        self.end_listener = false;
        self.chunks.clear();
        self.status = ExportStatus::Failed(failure);
    }

    /// Append one recorder segment
    ///
    /// Empty segments and segments from other attempts are dropped. Returns
    /// `true` if the segment was kept.
    pub fn accept_data(&mut self, ticket: ExportTicket, bytes: Vec<u8>) -> bool {
        if ticket != self.ticket || !self.is_active() {
            debug!("Dropping segment from stale export {:?}", ticket);
            return false;
        }
        if bytes.is_empty() {
            return false;
        }
        self.chunks.push(bytes);
        true
    }

    /// Handle the recorder-stopped callback
    ///
    /// Only the current, still active attempt is finalized; repeated or stale
    /// callbacks are [`Finalized::Ignored`].
    pub fn finalize(&mut self, ticket: ExportTicket, naming: &ArtifactNaming<'_>) -> Finalized {
        if ticket != self.ticket || !self.is_active() {
            debug!("Ignoring stop from export {:?}", ticket);
            return Finalized::Ignored;
        }
        self.end_listener = false;

        let bytes = self.chunks.concat();
        self.chunks.clear();

        if bytes.is_empty() {
            self.fail(ExportFailure::EmptyCapture);
            return Finalized::Failed(ExportFailure::EmptyCapture);
        }

        let file_name = artifact_file_name(naming.basename, naming.suffix, naming.extension);
        info!("Export ready: {} ({} bytes)", file_name, bytes.len());
        self.artifact = Some(ExportArtifact {
            file_name,
            mime_type: naming.mime_type.to_string(),
            bytes,
            label: naming.label.to_string(),
        });
        self.status = ExportStatus::Succeeded;
        Finalized::Succeeded
    }

    /// Abandon the running attempt without producing an artifact
    ///
    /// The ticket is bumped so the abandoned recorder's callbacks are
    /// ignored. Returns `true` if an attempt was active.
    pub fn abandon(&mut self) -> bool {
        let was_active = self.is_active();
        self.chunks.clear();
        self.end_listener = false;
        if was_active {
            debug!("Abandoning export {:?}", self.ticket);
            self.ticket = ExportTicket(self.ticket.0 + 1);
            self.status = ExportStatus::Idle;
        }
        was_active
    }

    /// Drop the finished artifact, returning it
    pub fn release_artifact(&mut self) -> Option<ExportArtifact> {
        let released = self.artifact.take();
        if released.is_some() && self.status == ExportStatus::Succeeded {
            self.status = ExportStatus::Idle;
        }
        released
    }
}

impl Default for ExportPipeline {
    fn default() -> Self {
        Self::new()
    }
}
