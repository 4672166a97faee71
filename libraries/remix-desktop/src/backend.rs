//! Native implementation of the engine's audio backend
use crate::clock::FrameClock;
use crate::config::DesktopConfig;
use crate::error::Result;
use crate::media::NativeMedia;
use crate::recorder::WavStreamRecorder;
use crate::render::{lock, BackendEvent, RenderGraph, SharedGraph};
use async_trait::async_trait;
use crossbeam_channel::{unbounded, Receiver, Sender};
use remix_audio::{decode_file, resample, DecodedAudio};
use remix_engine::{
    AudioBackend, AudioSink, BackendError, ExportTicket, MediaHandle, NodeId, PitchShifter,
    PlatformEvent, SourceId, StreamRecorder,
};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Native audio backend
///
/// Cheap to clone: every clone shares the same render graph and event
/// channel. Hand one clone to the session and keep another to render,
/// open media and poll events.
#[derive(Clone)]
pub struct NativeBackend {
    graph: SharedGraph,
    speakers: NodeId,
    config: DesktopConfig,
    sender: Sender<BackendEvent>,
    receiver: Receiver<BackendEvent>,
}

impl NativeBackend {
    pub fn new(config: DesktopConfig) -> Self {
        let (sender, receiver) = unbounded();
        let graph = RenderGraph::new(
            config.sample_rate,
            config.time_update_frames(config.sample_rate),
            sender.clone(),
        );
        let speakers = graph.speakers();

        Self {
            graph: Arc::new(Mutex::new(graph)),
            speakers,
            config,
            sender,
            receiver,
        }
    }

    pub fn config(&self) -> &DesktopConfig {
        &self.config
    }

    pub(crate) fn shared_graph(&self) -> SharedGraph {
        Arc::clone(&self.graph)
    }

    /// Current output sample rate
    pub fn sample_rate(&self) -> Result<u32> {
        Ok(lock(&self.graph)?.sample_rate())
    }

    /// Adopt the sample rate of an opened output device
    ///
    /// Media already loaded is converted to the new rate, outside the
    /// render lock, one file at a time.
    pub fn set_sample_rate(&self, sample_rate: u32) -> Result<()> {
        let frames = self.config.time_update_frames(sample_rate);
        let stale = lock(&self.graph)?.set_sample_rate(sample_rate, frames);
        for (handle, original) in stale {
            let converted = Arc::new(resample(&original, sample_rate)?);
            lock(&self.graph)?.replace_audio(handle, converted);
        }
        Ok(())
    }

    /// Decode `path` and register it as a media element
    pub fn open_media(&self, path: &Path) -> Result<NativeMedia> {
        let audio = decode_file(path)?;
        info!("Opened {} ({:?})", path.display(), audio.duration());
        self.open_decoded(audio)
    }

    /// Register already decoded audio as a media element
    ///
    /// Audio at another rate is converted to the output rate first.
    /// Metadata is known immediately, so a metadata notification is queued
    /// right away; it reaches the session once the handle is bound.
    pub fn open_decoded(&self, audio: DecodedAudio) -> Result<NativeMedia> {
        let sample_rate = self.sample_rate()?;
        let original = Arc::new(audio);
        let playable = if original.sample_rate == sample_rate {
            Arc::clone(&original)
        } else {
            Arc::new(resample(&original, sample_rate)?)
        };

        let handle = {
            let mut graph = lock(&self.graph)?;
            let handle = graph.add_player(original, playable);
            graph.emit(BackendEvent::Metadata(handle));
            handle
        };
        Ok(NativeMedia::new(handle, self.shared_graph()))
    }

    /// Associate a media handle with the source id the session assigned it
    ///
    /// The binding lives as long as the media; releasing it drops the
    /// binding along with the player.
    pub fn bind_source(&self, handle: MediaHandle, source: SourceId) {
        match lock(&self.graph) {
            Ok(mut graph) => graph.bind_source(handle, source),
            Err(e) => warn!("Failed to bind {:?}: {}", handle, e),
        }
    }

    /// Frame scheduler that reports through this backend's event channel
    pub fn frame_clock(&self) -> FrameClock {
        FrameClock::new(self.sender.clone())
    }

    /// Drain pending notifications as session events
    ///
    /// Notifications for media that was never bound, or has since been
    /// released, are dropped.
    pub fn poll_events(&self) -> Vec<PlatformEvent> {
        let pending: Vec<BackendEvent> = self.receiver.try_iter().collect();
        if pending.is_empty() {
            return Vec::new();
        }

        // Lookups only, so a poisoned graph still answers them
        let graph = self.graph.lock().unwrap_or_else(PoisonError::into_inner);
        let source = |handle: MediaHandle| {
            let source = graph.source_id(handle);
            if source.is_none() {
                debug!("Dropping event for unbound media {:?}", handle);
            }
            source
        };

        pending
            .into_iter()
            .filter_map(|event| match event {
                BackendEvent::Metadata(handle) => {
                    source(handle).map(|source| PlatformEvent::MetadataLoaded { source })
                }
                BackendEvent::TimeUpdate(handle) => {
                    source(handle).map(|source| PlatformEvent::TimeUpdate { source })
                }
                BackendEvent::Ended(handle) => {
                    source(handle).map(|source| PlatformEvent::Ended { source })
                }
                BackendEvent::Frame(request) => Some(PlatformEvent::Frame(request)),
                BackendEvent::RecorderData { ticket, bytes } => {
                    Some(PlatformEvent::RecorderData { ticket, bytes })
                }
                BackendEvent::RecorderStopped { ticket } => {
                    Some(PlatformEvent::RecorderStopped { ticket })
                }
            })
            .collect()
    }

    /// Render one block of interleaved stereo
    pub fn render(&self, out: &mut [f32]) -> Result<()> {
        lock(&self.graph)?.render(out);
        Ok(())
    }

    /// Render `frames` frames and discard them (drives time without a device)
    pub fn advance(&self, frames: usize) -> Result<()> {
        let block = self.config.block_frames.max(1);
        let mut buffer = vec![0.0; block * DecodedAudio::CHANNELS];
        let mut remaining = frames;
        while remaining > 0 {
            let n = remaining.min(block);
            self.render(&mut buffer[..n * DecodedAudio::CHANNELS])?;
            remaining -= n;
        }
        Ok(())
    }

    /// Live node count, speakers included
    pub fn node_count(&self) -> Result<usize> {
        Ok(lock(&self.graph)?.node_count())
    }

    pub fn is_running(&self) -> Result<bool> {
        Ok(lock(&self.graph)?.is_running())
    }

    fn node(&self, id: NodeId) -> NativeNode {
        NativeNode {
            id,
            graph: self.shared_graph(),
            disposed: false,
        }
    }
}

impl std::fmt::Debug for NativeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBackend")
            .field("config", &self.config)
            .field("pending_events", &self.receiver.len())
            .finish()
    }
}

#[async_trait]
impl AudioBackend for NativeBackend {
    async fn resume(&mut self) -> std::result::Result<(), BackendError> {
        let mut graph = lock(&self.graph)?;
        if !graph.is_running() {
            debug!("Audio runtime running");
            graph.set_running(true);
        }
        Ok(())
    }

    fn create_media_source(
        &mut self,
        media: MediaHandle,
    ) -> std::result::Result<Box<dyn AudioSink>, BackendError> {
        let id = lock(&self.graph)?.add_source(media)?;
        Ok(Box::new(self.node(id)))
    }

    fn create_pitch_shifter(
        &mut self,
        window_size: f64,
    ) -> std::result::Result<Box<dyn PitchShifter>, BackendError> {
        if !(window_size.is_finite() && window_size > 0.0) {
            return Err(BackendError::NodeConstruction(format!(
                "invalid pitch window {window_size}"
            )));
        }
        let id = lock(&self.graph)?.add_pitch(window_size);
        Ok(Box::new(NativePitch {
            node: self.node(id),
            semitones: 0.0,
        }))
    }

    fn create_gain(&mut self) -> std::result::Result<Box<dyn AudioSink>, BackendError> {
        let id = lock(&self.graph)?.add_gain();
        Ok(Box::new(self.node(id)))
    }

    fn create_capture_destination(&mut self) -> std::result::Result<Box<dyn AudioSink>, BackendError> {
        let id = lock(&self.graph)?.add_capture();
        Ok(Box::new(self.node(id)))
    }

    fn speakers(&self) -> NodeId {
        self.speakers
    }

    fn create_recorder(
        &mut self,
        capture: NodeId,
        ticket: ExportTicket,
    ) -> std::result::Result<Box<dyn StreamRecorder>, BackendError> {
        let graph = lock(&self.graph)?;
        if !graph.is_capture(capture) {
            return Err(BackendError::Recorder(format!(
                "node {} is not a capture destination",
                capture.0
            )));
        }
        let sample_rate = graph.sample_rate();
        drop(graph);

        Ok(Box::new(WavStreamRecorder::new(
            capture,
            ticket,
            sample_rate,
            self.shared_graph(),
        )))
    }
}

/// Graph node handed to the engine
#[derive(Debug)]
pub(crate) struct NativeNode {
    id: NodeId,
    graph: SharedGraph,
    disposed: bool,
}

impl AudioSink for NativeNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn connect(&mut self, next: NodeId) -> std::result::Result<(), BackendError> {
        if self.disposed {
            return Err(BackendError::UnknownHandle(format!("node {} was disposed", self.id.0)));
        }
        lock(&self.graph)?.connect(self.id, next)
    }

    fn disconnect(&mut self) {
        match lock(&self.graph) {
            Ok(mut graph) => graph.disconnect(self.id),
            Err(e) => warn!("Failed to disconnect node {}: {}", self.id.0, e),
        }
    }

    fn dispose(&mut self) {
        if std::mem::replace(&mut self.disposed, true) {
            return;
        }
        match lock(&self.graph) {
            Ok(mut graph) => graph.remove_node(self.id),
            Err(e) => warn!("Failed to dispose node {}: {}", self.id.0, e),
        }
    }
}

/// Pitch-shift node handed to the engine
#[derive(Debug)]
pub(crate) struct NativePitch {
    node: NativeNode,
    semitones: f64,
}

impl AudioSink for NativePitch {
    fn id(&self) -> NodeId {
        self.node.id()
    }

    fn connect(&mut self, next: NodeId) -> std::result::Result<(), BackendError> {
        self.node.connect(next)
    }

    fn disconnect(&mut self) {
        self.node.disconnect();
    }

    fn dispose(&mut self) {
        self.node.dispose();
    }
}

impl PitchShifter for NativePitch {
    fn set_semitones(&mut self, semitones: f64) {
        self.semitones = semitones;
        match lock(&self.node.graph) {
            Ok(mut graph) => graph.set_semitones(self.node.id, semitones),
            Err(e) => warn!("Failed to set pitch: {}", e),
        }
    }

    fn semitones(&self) -> f64 {
        self.semitones
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remix_engine::MediaElement;
    use std::time::Duration;

    fn backend() -> NativeBackend {
        NativeBackend::new(DesktopConfig {
            sample_rate: 100,
            block_frames: 4,
            time_update_ms: 1000,
        })
    }

    #[test]
    fn unbound_media_events_are_dropped() {
        let backend = backend();
        let media = backend
            .open_decoded(DecodedAudio::new(vec![0.0; 20], 100))
            .unwrap();
        assert!(backend.poll_events().is_empty());

        let again = backend
            .open_decoded(DecodedAudio::new(vec![0.0; 20], 100))
            .unwrap();
        backend.bind_source(again.handle(), SourceId(7));
        assert_eq!(
            backend.poll_events(),
            vec![PlatformEvent::MetadataLoaded { source: SourceId(7) }]
        );
        drop(media);
    }

    fn device_backend() -> NativeBackend {
        NativeBackend::new(DesktopConfig {
            sample_rate: 48000,
            block_frames: 480,
            time_update_ms: 1000,
        })
    }

    fn tone(frames: usize, sample_rate: u32) -> DecodedAudio {
        let samples = (0..frames)
            .flat_map(|i| {
                let t = i as f32 / sample_rate as f32;
                let s = (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5;
                [s, s]
            })
            .collect();
        DecodedAudio::new(samples, sample_rate)
    }

    #[test]
    fn media_is_converted_to_the_output_rate() {
        let backend = device_backend();
        let media = backend.open_decoded(tone(4410, 44100)).unwrap();
        assert_eq!(media.duration(), Some(Duration::from_millis(100)));

        backend.graph.lock().unwrap().play(media.handle()).unwrap();
        backend.advance(4790).unwrap();
        assert!(!media.is_paused());
        backend.advance(20).unwrap();
        assert!(media.is_paused());
    }

    #[test]
    fn loaded_media_follows_a_device_rate_change() {
        let backend = device_backend();
        let media = backend.open_decoded(tone(4800, 48000)).unwrap();

        backend.set_sample_rate(96000).unwrap();
        assert_eq!(backend.sample_rate().unwrap(), 96000);
        assert_eq!(media.duration(), Some(Duration::from_millis(100)));

        backend.graph.lock().unwrap().play(media.handle()).unwrap();
        backend.advance(9590).unwrap();
        assert!(!media.is_paused());
        backend.advance(20).unwrap();
        assert!(media.is_paused());
    }

    #[test]
    fn releasing_media_drops_its_binding() {
        let backend = backend();
        let mut media = backend
            .open_decoded(DecodedAudio::new(vec![0.0; 20], 100))
            .unwrap();
        let handle = media.handle();
        backend.bind_source(handle, SourceId(2));
        assert_eq!(
            backend.poll_events(),
            vec![PlatformEvent::MetadataLoaded { source: SourceId(2) }]
        );

        // Queued before the release, delivered after it
        backend.graph.lock().unwrap().emit(BackendEvent::TimeUpdate(handle));
        media.release();

        assert!(backend.poll_events().is_empty());
        assert_eq!(backend.graph.lock().unwrap().source_id(handle), None);
    }

    #[test]
    fn recorder_stops_on_a_poisoned_graph() {
        let mut backend = backend();
        let capture = backend.create_capture_destination().unwrap();
        let ticket = ExportTicket(2);
        let mut recorder = backend.create_recorder(capture.id(), ticket).unwrap();
        recorder.start().unwrap();

        let graph = backend.shared_graph();
        let crashed = std::thread::spawn(move || {
            let _guard = graph.lock().unwrap();
            panic!("render thread crashed");
        })
        .join();
        assert!(crashed.is_err());
        assert!(backend.graph.is_poisoned());

        recorder.stop();
        assert_eq!(
            backend.poll_events(),
            vec![PlatformEvent::RecorderStopped { ticket }]
        );
    }

    #[test]
    fn recorder_delivers_one_segment_then_stop() {
        let mut backend = backend();
        let capture = backend.create_capture_destination().unwrap();
        let ticket = ExportTicket(3);
        let mut recorder = backend.create_recorder(capture.id(), ticket).unwrap();

        backend.graph.lock().unwrap().set_running(true);
        recorder.start().unwrap();
        backend.advance(8).unwrap();
        recorder.stop();

        let events = backend.poll_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            PlatformEvent::RecorderData { ticket: t, bytes } if *t == ticket && bytes.starts_with(b"RIFF")
        ));
        assert_eq!(events[1], PlatformEvent::RecorderStopped { ticket });
    }

    #[test]
    fn recorder_with_nothing_captured_only_stops() {
        let mut backend = backend();
        let capture = backend.create_capture_destination().unwrap();
        let mut recorder = backend.create_recorder(capture.id(), ExportTicket(1)).unwrap();
        recorder.start().unwrap();
        recorder.stop();

        assert_eq!(
            backend.poll_events(),
            vec![PlatformEvent::RecorderStopped {
                ticket: ExportTicket(1)
            }]
        );
    }

    #[test]
    fn recorder_requires_a_capture_node() {
        let mut backend = backend();
        let gain = backend.create_gain().unwrap();
        assert!(matches!(
            backend.create_recorder(gain.id(), ExportTicket(1)),
            Err(BackendError::Recorder(_))
        ));
    }
}
