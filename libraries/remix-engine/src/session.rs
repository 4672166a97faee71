//! Remix session - core orchestration
//!
//! Owns the single media source, its processing graph, the transport, the
//! rate controls and the export pipeline. Every mutating operation takes
//! `&mut self`, so attaches, exports and transport changes never interleave.
//! Platform callbacks enter through the `on_*` methods or [`Session::handle`].

use crate::{
    config::EngineConfig,
    error::{EngineError, Result},
    events::{ControlState, EventQueue, PlatformEvent, SessionEvent},
    export::{ArtifactNaming, ExportArtifact, ExportFailure, ExportPipeline, ExportStatus, Finalized},
    format::{extension_for_mime, format_multiplier, format_time_label},
    graph::GraphManager,
    lock::{LockCoordinator, RateControl, RateState},
    media::{LoadedMedia, MediaElement, MediaFile, SourceId},
    nodes::{AudioBackend, ExportTicket, FrameRequest, FrameScheduler},
    transport::{Transport, TransportState},
};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Speed/pitch remix session
pub struct Session {
    config: EngineConfig,
    backend: Box<dyn AudioBackend>,
    scheduler: Box<dyn FrameScheduler>,

    media: Option<LoadedMedia>,
    last_source: u64,

    graph: GraphManager,
    transport: Transport,
    rates: LockCoordinator,
    export: ExportPipeline,

    controls: ControlState,
    processing_available: bool,

    events: EventQueue,
}

impl Session {
    /// Create a session with no media loaded
    pub fn new(
        config: EngineConfig,
        backend: Box<dyn AudioBackend>,
        scheduler: Box<dyn FrameScheduler>,
    ) -> Self {
        let rates = LockCoordinator::new(
            config.rates.default_speed,
            config.rates.default_pitch,
            config.rates.locked_by_default,
        );
        let graph = GraphManager::new(config.pitch.window_size_secs);

        let mut session = Self {
            config,
            backend,
            scheduler,
            media: None,
            last_source: 0,
            graph,
            transport: Transport::new(),
            rates,
            export: ExportPipeline::new(),
            controls: ControlState::unloaded(),
            processing_available: false,
            events: EventQueue::default(),
        };

        session.emit_rates();
        session.events.push(SessionEvent::ControlsChanged(session.controls));
        session.emit_time();
        session
    }

    // ===== Media =====

    /// Install a new media source, releasing the previous one
    ///
    /// Anything that is not audio or video is rejected and the current
    /// source stays loaded. The processing graph is built later, in
    /// [`Session::on_metadata_loaded`].
    pub fn load_media(
        &mut self,
        file: MediaFile,
        mut element: Box<dyn MediaElement>,
    ) -> Result<SourceId> {
        let kind = match file.kind() {
            Ok(kind) => kind,
            Err(e) => {
                warn!("Rejected {}: {}", file.name, e);
                element.release();
                self.events.error(&e);
                return Err(e);
            }
        };

        self.clear_media();

        self.last_source += 1;
        let id = SourceId(self.last_source);
        element.set_playback_rate(self.rates.state().speed);

        info!("Loaded {} as {:?} source {:?}", file.name, kind, id);
        self.events.push(SessionEvent::MediaLoaded {
            source: id,
            name: file.name.clone(),
            kind,
        });

        self.media = Some(LoadedMedia {
            id,
            file,
            kind,
            element,
            metadata_ready: false,
        });
        self.emit_time();

        Ok(id)
    }

    /// Metadata for `source` is available: enable controls and attach the graph
    ///
    /// Returns [`EngineError::ProcessingUnavailable`] if the graph could not
    /// be built. The session has already fallen back to direct playback by
    /// then, with pitch and export disabled.
    pub async fn on_metadata_loaded(&mut self, source: SourceId) -> Result<()> {
        let Some(media) = self.media.as_mut().filter(|m| m.id == source) else {
            debug!("Ignoring metadata for stale source {:?}", source);
            return Ok(());
        };
        if media.metadata_ready {
            return Ok(());
        }
        media.metadata_ready = true;

        let duration_ms = media.element.duration().map(duration_ms);
        self.events.push(SessionEvent::MetadataReady {
            source,
            duration_ms,
        });

        self.set_controls(ControlState {
            transport: true,
            export: true,
            pitch: true,
        });
        self.emit_time();

        let semitones = self.rates.state().semitones();
        let attached = match self.media.as_mut() {
            Some(media) => {
                self.graph
                    .attach(self.backend.as_mut(), media.element.as_mut(), semitones)
                    .await
            }
            None => Err(EngineError::NoMediaLoaded),
        };

        let result = match attached {
            Ok(_) => {
                self.set_processing_available(true);
                Ok(())
            }
            Err(e) => {
                self.set_processing_available(false);
                self.events.error(&e);
                Err(e)
            }
        };

        self.apply_rates();
        result
    }

    /// Release the current media source and everything built on it
    pub fn unload(&mut self) {
        self.clear_media();
    }

    fn clear_media(&mut self) {
        self.transport.reset(self.scheduler.as_mut());
        self.graph.teardown();

        if self.export.abandon() {
            self.emit_export_status();
        }
        self.release_artifact();

        if let Some(mut media) = self.media.take() {
            media.element.pause();
            media.element.release();
            debug!("Released source {:?}", media.id);
            self.events
                .push(SessionEvent::MediaUnloaded { source: media.id });
            self.events.push(SessionEvent::TransportChanged {
                state: TransportState::Idle,
            });
        }

        self.set_processing_available(false);
        self.set_controls(ControlState::unloaded());
        self.emit_time();
    }

    // ===== Transport =====

    /// Start playback
    pub async fn play(&mut self) -> Result<()> {
        self.ensure_no_export()?;
        if self.media.is_none() {
            return Err(EngineError::NoMediaLoaded);
        }

        if self.graph.is_attached() {
            self.resume_runtime().await?;
        }
        let Some(media) = self.media.as_mut() else {
            return Err(EngineError::NoMediaLoaded);
        };

        self.transport
            .play(media.element.as_mut(), self.scheduler.as_mut())
            .await?;

        self.emit_transport();
        self.emit_time();
        Ok(())
    }

    /// Pause playback, keeping the position
    pub fn pause(&mut self) -> Result<()> {
        self.ensure_no_export()?;
        let Some(media) = self.media.as_mut() else {
            return Err(EngineError::NoMediaLoaded);
        };

        self.transport
            .pause(media.element.as_mut(), self.scheduler.as_mut());

        self.emit_transport();
        self.emit_time();
        Ok(())
    }

    /// Play if paused, pause if playing
    pub async fn toggle_playback(&mut self) -> Result<()> {
        let paused = self
            .media
            .as_ref()
            .map(|media| media.element.is_paused())
            .ok_or(EngineError::NoMediaLoaded)?;

        if paused {
            self.play().await
        } else {
            self.pause()
        }
    }

    /// Stop playback, optionally rewinding to the start
    pub fn stop(&mut self, reset: bool) -> Result<()> {
        self.ensure_no_export()?;
        self.stop_transport(reset)
    }

    fn stop_transport(&mut self, reset: bool) -> Result<()> {
        let Some(media) = self.media.as_mut() else {
            return Err(EngineError::NoMediaLoaded);
        };

        self.transport
            .stop(media.element.as_mut(), self.scheduler.as_mut(), reset);

        self.emit_transport();
        self.emit_time();
        Ok(())
    }

    /// Display refresh callback
    pub fn on_frame(&mut self, request: FrameRequest) {
        let Some(media) = self.media.as_ref() else {
            return;
        };

        if self
            .transport
            .on_frame(request, media.element.as_ref(), self.scheduler.as_mut())
        {
            self.emit_time();
        }
    }

    /// Position update callback
    pub fn on_time_update(&mut self, source: SourceId) {
        if self.is_current(source) {
            self.emit_time();
        }
    }

    /// Natural end of media
    ///
    /// Stops with rewind. If an export armed its end listener, the recorder
    /// is asked to stop and the export moves to finalizing.
    pub fn on_media_ended(&mut self, source: SourceId) {
        if !self.is_current(source) {
            debug!("Ignoring end of stale source {:?}", source);
            return;
        }

        if let Err(e) = self.stop_transport(true) {
            warn!("Stop at end of media failed: {}", e);
        }

        if self.export.take_end_listener() {
            info!("Source finished; finalizing export {:?}", self.export.ticket());
            self.graph.stop_recorder();
            self.export.mark_finalizing();
            self.emit_export_status();
        }
    }

    // ===== Rates =====

    /// Set the speed ratio (propagates to pitch while locked)
    pub fn set_speed(&mut self, value: f64) -> Result<RateState> {
        let state = self.rates.set_speed(value)?;
        self.apply_rates();
        Ok(state)
    }

    /// Set the pitch ratio (propagates to speed while locked)
    pub fn set_pitch(&mut self, value: f64) -> Result<RateState> {
        let state = self.rates.set_pitch(value)?;
        self.apply_rates();
        Ok(state)
    }

    /// Reset speed to 1.0
    pub fn reset_speed(&mut self) -> RateState {
        let state = self.rates.reset(RateControl::Speed);
        self.apply_rates();
        state
    }

    /// Reset pitch to 1.0
    pub fn reset_pitch(&mut self) -> RateState {
        let state = self.rates.reset(RateControl::Pitch);
        self.apply_rates();
        state
    }

    /// Flip the speed/pitch lock
    pub fn toggle_lock(&mut self) -> RateState {
        let locked = !self.rates.state().locked;
        self.set_locked(locked)
    }

    /// Lock or unlock speed and pitch
    pub fn set_locked(&mut self, locked: bool) -> RateState {
        let before = self.rates.state().locked;
        let state = self.rates.set_locked(locked);
        if before != state.locked {
            debug!("Rate lock {}", if state.locked { "on" } else { "off" });
            self.events.push(SessionEvent::LockChanged {
                locked: state.locked,
            });
        }
        self.apply_rates();
        state
    }

    fn apply_rates(&mut self) {
        let state = self.rates.state();
        if let Some(media) = self.media.as_mut() {
            media.element.set_playback_rate(state.speed);
        }
        self.graph.set_pitch(state.semitones());
        self.emit_rates();
    }

    /// Resume the audio runtime, reporting a failure as a notice
    async fn resume_runtime(&mut self) -> Result<()> {
        if let Err(e) = self.backend.resume().await {
            let e = EngineError::from(e);
            warn!("Audio runtime unavailable: {}", e);
            self.events.error(&e);
            return Err(e);
        }
        Ok(())
    }

    // ===== Export =====

    /// Replay the source from the start while recording the processed output
    ///
    /// Returns the ticket the recorder will report its callbacks with.
    pub async fn start_export(&mut self) -> Result<ExportTicket> {
        if self.export.is_active() {
            let e = EngineError::ExportInProgress;
            self.events.error(&e);
            return Err(e);
        }
        if self.media.is_none() || self.graph.capture().is_none() {
            let e = EngineError::ExportUnavailable;
            self.events.error(&e);
            return Err(e);
        }

        self.resume_runtime().await?;

        let (ticket, released) = self.export.begin();
        if let Some(artifact) = released {
            self.emit_artifact_released(&artifact);
        }

        if let Err(e) = self.graph.bind_recorder(self.backend.as_mut(), ticket) {
            self.export.fail(ExportFailure::RecorderUnsupported(e.to_string()));
            self.emit_export_status();
            self.events.error(&e);
            return Err(e);
        }

        self.export.mark_recording();
        self.emit_export_status();
        self.events.info("Exporting…");
        self.set_controls(ControlState {
            transport: false,
            export: false,
            ..self.controls
        });

        if let Err(e) = self.stop_transport(true) {
            self.abort_export_start(ExportFailure::PlaybackStartFailure(e.to_string()));
            return Err(e);
        }
        if let Some(media) = self.media.as_mut() {
            media.element.seek(Duration::ZERO);
        }

        if let Err(e) = self.graph.start_recorder() {
            self.abort_export_start(ExportFailure::RecorderUnsupported(e.to_string()));
            return Err(e);
        }

        let started = match self.media.as_mut() {
            Some(media) => {
                self.transport
                    .play(media.element.as_mut(), self.scheduler.as_mut())
                    .await
            }
            None => Err(EngineError::NoMediaLoaded),
        };

        match started {
            Ok(()) => {
                info!("Export {:?} recording", ticket);
                self.emit_transport();
                Ok(ticket)
            }
            Err(e) => {
                let reason = match &e {
                    EngineError::PlaybackStart(reason) => reason.clone(),
                    other => other.to_string(),
                };
                self.abort_export_start(ExportFailure::PlaybackStartFailure(reason.clone()));
                Err(EngineError::PlaybackStart(reason))
            }
        }
    }

    /// Abandon the running export (if any) and start a new one
    pub async fn restart_export(&mut self) -> Result<ExportTicket> {
        self.cancel_export();
        self.start_export().await
    }

    /// Stop recording now and finalize with what was captured so far
    pub fn finish_export(&mut self) -> Result<()> {
        if *self.export.status() != ExportStatus::Recording {
            return Ok(());
        }

        self.export.take_end_listener();
        self.graph.stop_recorder();
        self.export.mark_finalizing();
        self.emit_export_status();
        self.stop_transport(true)
    }

    /// Abort the running export without producing an artifact
    ///
    /// Returns `true` if an export was running.
    pub fn cancel_export(&mut self) -> bool {
        if !self.export.abandon() {
            return false;
        }

        info!("Export cancelled");
        self.graph.release_recorder();
        if let Err(e) = self.stop_transport(true) {
            debug!("No transport to stop after cancel: {}", e);
        }
        self.emit_export_status();
        self.restore_controls();
        true
    }

    /// Recorder segment callback
    pub fn on_recorder_data(&mut self, ticket: ExportTicket, bytes: Vec<u8>) {
        self.export.accept_data(ticket, bytes);
    }

    /// Recorder stopped callback
    ///
    /// Finalizes the attempt identified by `ticket`, if it is still the
    /// running one. Safe to call repeatedly.
    pub fn on_recorder_stopped(&mut self, ticket: ExportTicket) {
        let mime_type = self
            .graph
            .recorder_mime_type()
            .unwrap_or(self.config.export.mime_type.as_str())
            .to_string();
        let extension = extension_for_mime(&mime_type)
            .unwrap_or(self.config.export.fallback_extension.as_str())
            .to_string();
        let fallback = self.config.export.fallback_basename.as_str();
        let basename = self
            .media
            .as_ref()
            .map_or(fallback, |media| media.file.basename(fallback));

        let naming = ArtifactNaming {
            basename,
            suffix: &self.config.export.suffix,
            extension: &extension,
            mime_type: &mime_type,
            label: &self.config.export.download_label,
        };

        match self.export.finalize(ticket, &naming) {
            Finalized::Ignored => return,
            Finalized::Succeeded => {
                self.emit_export_status();
                if let Some(artifact) = self.export.artifact() {
                    self.events.push(SessionEvent::ExportReady {
                        file_name: artifact.file_name.clone(),
                        mime_type: artifact.mime_type.clone(),
                        size_bytes: artifact.bytes.len(),
                        label: artifact.label.clone(),
                    });
                }
            }
            Finalized::Failed(failure) => {
                self.emit_export_status();
                self.events.error(&EngineError::from(failure));
            }
        }

        self.graph.release_recorder();
        self.restore_controls();
    }

    /// Drop the finished artifact
    pub fn release_artifact(&mut self) {
        if let Some(artifact) = self.export.release_artifact() {
            self.emit_artifact_released(&artifact);
        }
    }

    fn abort_export_start(&mut self, failure: ExportFailure) {
        self.export.take_end_listener();
        self.graph.stop_recorder();
        let error = EngineError::from(failure.clone());
        self.export.fail(failure);
        self.emit_export_status();
        self.events.error(&error);
        self.restore_controls();
    }

    fn ensure_no_export(&self) -> Result<()> {
        if self.export.is_active() {
            Err(EngineError::ExportInProgress)
        } else {
            Ok(())
        }
    }

    // ===== Platform callbacks =====

    /// Dispatch one platform callback
    pub async fn handle(&mut self, event: PlatformEvent) -> Result<()> {
        match event {
            PlatformEvent::MetadataLoaded { source } => self.on_metadata_loaded(source).await?,
            PlatformEvent::TimeUpdate { source } => self.on_time_update(source),
            PlatformEvent::Ended { source } => self.on_media_ended(source),
            PlatformEvent::Frame(request) => self.on_frame(request),
            PlatformEvent::RecorderData { ticket, bytes } => self.on_recorder_data(ticket, bytes),
            PlatformEvent::RecorderStopped { ticket } => self.on_recorder_stopped(ticket),
        }
        Ok(())
    }

    // ===== Queries =====

    /// Current rate controls
    pub fn rates(&self) -> RateState {
        self.rates.state()
    }

    /// Transport state
    pub fn transport_state(&self) -> TransportState {
        self.transport.state()
    }

    /// Export status
    pub fn export_status(&self) -> &ExportStatus {
        self.export.status()
    }

    /// Finished export artifact
    pub fn artifact(&self) -> Option<&ExportArtifact> {
        self.export.artifact()
    }

    /// Which controls are enabled
    pub fn controls(&self) -> ControlState {
        self.controls
    }

    /// Check if the processing graph is attached
    pub fn is_processing_available(&self) -> bool {
        self.processing_available
    }

    /// Identifier of the loaded source
    pub fn source(&self) -> Option<SourceId> {
        self.media.as_ref().map(|media| media.id)
    }

    /// Loaded file
    pub fn media_file(&self) -> Option<&MediaFile> {
        self.media.as_ref().map(|media| &media.file)
    }

    /// Frame request the refresh loop is waiting on
    pub fn pending_frame(&self) -> Option<FrameRequest> {
        self.transport.pending_frame()
    }

    /// Current `MM:SS / MM:SS` label
    pub fn time_label(&self) -> String {
        let (position, duration) = self.times();
        format_time_label(position, duration)
    }

    /// Configuration in use
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Take all queued events
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.events.drain()
    }

    /// Release everything; the session stays usable for a new load
    pub fn close(&mut self) {
        info!("Closing session");
        self.clear_media();
    }

    // ===== Event helpers =====

    fn is_current(&self, source: SourceId) -> bool {
        self.media.as_ref().is_some_and(|media| media.id == source)
    }

    fn times(&self) -> (Option<Duration>, Option<Duration>) {
        match self.media.as_ref() {
            Some(media) => (Some(media.element.position()), media.element.duration()),
            None => (None, None),
        }
    }

    fn emit_time(&mut self) {
        let (position, duration) = self.times();
        self.events.push(SessionEvent::TimeChanged {
            label: format_time_label(position, duration),
            position_ms: position.map_or(0, duration_ms),
            duration_ms: duration.map(duration_ms),
        });
    }

    fn emit_transport(&mut self) {
        self.events.push(SessionEvent::TransportChanged {
            state: self.transport.state(),
        });
    }

    fn emit_rates(&mut self) {
        let state = self.rates.state();
        self.events.push(SessionEvent::RatesChanged {
            speed: state.speed,
            pitch: state.pitch,
            semitones: state.semitones(),
            locked: state.locked,
            speed_label: format_multiplier(state.speed),
            pitch_label: format_multiplier(state.pitch),
        });
    }

    fn emit_export_status(&mut self) {
        self.events.push(SessionEvent::ExportStatusChanged {
            status: self.export.status().clone(),
        });
    }

    fn emit_artifact_released(&mut self, artifact: &ExportArtifact) {
        debug!("Released artifact {}", artifact.file_name);
        self.events.push(SessionEvent::ExportArtifactReleased {
            file_name: artifact.file_name.clone(),
        });
    }

    fn set_controls(&mut self, controls: ControlState) {
        if self.controls != controls {
            self.controls = controls;
            self.events.push(SessionEvent::ControlsChanged(controls));
        }
    }

    /// Re-enable controls after an export settles
    fn restore_controls(&mut self) {
        let loaded = self.media.as_ref().is_some_and(|media| media.metadata_ready);
        self.set_controls(ControlState {
            transport: loaded,
            export: loaded && self.processing_available,
            pitch: self.controls.pitch,
        });
    }

    fn set_processing_available(&mut self, available: bool) {
        let changed = self.processing_available != available;
        self.processing_available = available;

        if self.media.is_some() {
            self.set_controls(ControlState {
                transport: self.controls.transport,
                export: self.controls.export && available,
                pitch: available,
            });
        }
        if changed {
            self.events
                .push(SessionEvent::ProcessingChanged { available });
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.transport.reset(self.scheduler.as_mut());
        self.graph.teardown();
        if let Some(mut media) = self.media.take() {
            media.element.release();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("source", &self.source())
            .field("rates", &self.rates.state())
            .field("transport", &self.transport.state())
            .field("export", self.export.status())
            .field("controls", &self.controls)
            .field("processing_available", &self.processing_available)
            .finish_non_exhaustive()
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
