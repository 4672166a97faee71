//! Shared test doubles for the remix engine
//!
//! Every double keeps its observable state behind an `Arc<Mutex<_>>` so a
//! test can inspect it after handing the double to the session.

#![allow(dead_code)]

use async_trait::async_trait;
use remix_engine::{
    AudioBackend, AudioSink, BackendError, EngineConfig, ExportTicket, FrameRequest,
    FrameScheduler, MediaElement, MediaFile, MediaHandle, NodeId, PitchShifter, RecorderState,
    Session, SourceId, StreamRecorder,
};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

pub const SPEAKERS: NodeId = NodeId(0);

static INIT: Once = Once::new();

/// Route engine logs to the test output once per test binary
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

// ===== Backend =====

/// Which backend primitive should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Resume,
    MediaSource,
    PitchShifter,
    Gain,
    CaptureDestination,
    Connect,
    Recorder,
    RecorderStart,
}

#[derive(Debug, Default)]
pub struct BackendState {
    /// Ordered log of every backend call
    pub log: Vec<String>,
    pub live_nodes: BTreeSet<u64>,
    pub next_node: u64,
    pub faults: Vec<Fault>,
    pub semitones: f64,
    pub recorders_created: Vec<ExportTicket>,
    pub recorders_stopped: Vec<ExportTicket>,
    pub recorder_mime: Option<String>,
    /// Ticket of every recorder still in the recording state
    pub recording: BTreeSet<ExportTicket>,
}

impl BackendState {
    fn fails(&self, fault: Fault) -> bool {
        self.faults.contains(&fault)
    }

    fn node(&mut self, kind: &str) -> NodeId {
        self.next_node += 1;
        let id = self.next_node;
        self.live_nodes.insert(id);
        self.log.push(format!("create {kind}#{id}"));
        NodeId(id)
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.log.iter().position(|line| line.starts_with(entry))
    }

    pub fn last_position(&self, entry: &str) -> Option<usize> {
        self.log.iter().rposition(|line| line.starts_with(entry))
    }
}

pub type Shared<T> = Arc<Mutex<T>>;

pub struct MockBackend {
    pub state: Shared<BackendState>,
}

struct MockNode {
    id: NodeId,
    kind: &'static str,
    state: Shared<BackendState>,
}

impl AudioSink for MockNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn connect(&mut self, next: NodeId) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        if state.fails(Fault::Connect) {
            return Err(BackendError::Connection(format!("{} -> {:?}", self.kind, next)));
        }
        state.log.push(format!("connect {}#{} -> {}", self.kind, self.id.0, next.0));
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.log.push(format!("disconnect {}#{}", self.kind, self.id.0));
    }

    fn dispose(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.live_nodes.remove(&self.id.0);
        state.log.push(format!("dispose {}#{}", self.kind, self.id.0));
    }
}

struct MockPitch {
    node: MockNode,
    semitones: f64,
}

impl AudioSink for MockPitch {
    fn id(&self) -> NodeId {
        self.node.id()
    }

    fn connect(&mut self, next: NodeId) -> Result<(), BackendError> {
        self.node.connect(next)
    }

    fn disconnect(&mut self) {
        self.node.disconnect();
    }

    fn dispose(&mut self) {
        self.node.dispose();
    }
}

impl PitchShifter for MockPitch {
    fn set_semitones(&mut self, semitones: f64) {
        self.semitones = semitones;
        self.node.state.lock().unwrap().semitones = semitones;
    }

    fn semitones(&self) -> f64 {
        self.semitones
    }
}

struct MockRecorder {
    ticket: ExportTicket,
    state: RecorderState,
    mime: String,
    shared: Shared<BackendState>,
}

impl StreamRecorder for MockRecorder {
    fn start(&mut self) -> Result<(), BackendError> {
        let mut shared = self.shared.lock().unwrap();
        if shared.fails(Fault::RecorderStart) {
            return Err(BackendError::Recorder("start refused".into()));
        }
        self.state = RecorderState::Recording;
        shared.recording.insert(self.ticket);
        shared.log.push(format!("recorder start #{}", self.ticket.0));
        Ok(())
    }

    fn stop(&mut self) {
        let mut shared = self.shared.lock().unwrap();
        self.state = RecorderState::Inactive;
        shared.recording.remove(&self.ticket);
        shared.recorders_stopped.push(self.ticket);
        shared.log.push(format!("recorder stop #{}", self.ticket.0));
    }

    fn state(&self) -> RecorderState {
        self.state
    }

    fn mime_type(&self) -> &str {
        &self.mime
    }
}

#[async_trait]
impl AudioBackend for MockBackend {
    async fn resume(&mut self) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        state.log.push("resume".to_string());
        if state.fails(Fault::Resume) {
            return Err(BackendError::Runtime("suspended".into()));
        }
        Ok(())
    }

    fn create_media_source(
        &mut self,
        _media: MediaHandle,
    ) -> Result<Box<dyn AudioSink>, BackendError> {
        self.create_node("source", Fault::MediaSource)
    }

    fn create_pitch_shifter(
        &mut self,
        _window_size: f64,
    ) -> Result<Box<dyn PitchShifter>, BackendError> {
        let mut state = self.state.lock().unwrap();
        if state.fails(Fault::PitchShifter) {
            return Err(BackendError::NodeConstruction("pitch".into()));
        }
        let id = state.node("pitch");
        Ok(Box::new(MockPitch {
            node: MockNode {
                id,
                kind: "pitch",
                state: Arc::clone(&self.state),
            },
            semitones: 0.0,
        }))
    }

    fn create_gain(&mut self) -> Result<Box<dyn AudioSink>, BackendError> {
        self.create_node("gain", Fault::Gain)
    }

    fn create_capture_destination(&mut self) -> Result<Box<dyn AudioSink>, BackendError> {
        self.create_node("capture", Fault::CaptureDestination)
    }

    fn speakers(&self) -> NodeId {
        SPEAKERS
    }

    fn create_recorder(
        &mut self,
        _capture: NodeId,
        ticket: ExportTicket,
    ) -> Result<Box<dyn StreamRecorder>, BackendError> {
        let mut state = self.state.lock().unwrap();
        if state.fails(Fault::Recorder) {
            return Err(BackendError::Recorder("no capture support".into()));
        }
        state.recorders_created.push(ticket);
        state.log.push(format!("recorder create #{}", ticket.0));
        Ok(Box::new(MockRecorder {
            ticket,
            state: RecorderState::Inactive,
            mime: state
                .recorder_mime
                .clone()
                .unwrap_or_else(|| "audio/webm;codecs=opus".to_string()),
            shared: Arc::clone(&self.state),
        }))
    }
}

impl MockBackend {
    fn create_node(
        &mut self,
        kind: &'static str,
        fault: Fault,
    ) -> Result<Box<dyn AudioSink>, BackendError> {
        let mut state = self.state.lock().unwrap();
        if state.fails(fault) {
            return Err(BackendError::NodeConstruction(kind.into()));
        }
        let id = state.node(kind);
        Ok(Box::new(MockNode {
            id,
            kind,
            state: Arc::clone(&self.state),
        }))
    }
}

// ===== Media =====

#[derive(Debug)]
pub struct MediaState {
    pub paused: bool,
    pub position: Duration,
    pub duration: Option<Duration>,
    pub rate: f64,
    pub muted: bool,
    pub released: bool,
    pub play_fails: bool,
    pub play_calls: usize,
}

impl Default for MediaState {
    fn default() -> Self {
        Self {
            paused: true,
            position: Duration::ZERO,
            duration: Some(Duration::from_secs(83)),
            rate: 1.0,
            muted: false,
            released: false,
            play_fails: false,
            play_calls: 0,
        }
    }
}

pub struct MockMedia {
    pub handle: MediaHandle,
    pub state: Shared<MediaState>,
}

#[async_trait]
impl MediaElement for MockMedia {
    fn handle(&self) -> MediaHandle {
        self.handle
    }

    async fn play(&mut self) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        state.play_calls += 1;
        if state.play_fails {
            return Err(BackendError::Playback("not allowed".into()));
        }
        state.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        self.state.lock().unwrap().paused = true;
    }

    fn is_paused(&self) -> bool {
        self.state.lock().unwrap().paused
    }

    fn position(&self) -> Duration {
        self.state.lock().unwrap().position
    }

    fn seek(&mut self, position: Duration) {
        self.state.lock().unwrap().position = position;
    }

    fn duration(&self) -> Option<Duration> {
        self.state.lock().unwrap().duration
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.state.lock().unwrap().rate = rate;
    }

    fn set_muted(&mut self, muted: bool) {
        self.state.lock().unwrap().muted = muted;
    }

    fn is_muted(&self) -> bool {
        self.state.lock().unwrap().muted
    }

    fn release(&mut self) {
        self.state.lock().unwrap().released = true;
    }
}

// ===== Scheduler =====

#[derive(Debug, Default)]
pub struct SchedulerState {
    pub next: u64,
    pub outstanding: BTreeSet<u64>,
    pub requested: usize,
    pub cancelled: usize,
}

pub struct MockScheduler {
    pub state: Shared<SchedulerState>,
}

impl FrameScheduler for MockScheduler {
    fn request_frame(&mut self) -> FrameRequest {
        let mut state = self.state.lock().unwrap();
        state.next += 1;
        let id = state.next;
        state.outstanding.insert(id);
        state.requested += 1;
        FrameRequest(id)
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        let mut state = self.state.lock().unwrap();
        state.outstanding.remove(&request.0);
        state.cancelled += 1;
    }
}

impl SchedulerState {
    /// Fire the oldest outstanding frame, as a display refresh would
    pub fn fire(&mut self) -> Option<FrameRequest> {
        let id = *self.outstanding.iter().next()?;
        self.outstanding.remove(&id);
        Some(FrameRequest(id))
    }
}

// ===== Harness =====

pub struct Harness {
    pub session: Session,
    pub backend: Shared<BackendState>,
    pub scheduler: Shared<SchedulerState>,
    next_media: u64,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        init_tracing();
        let backend = Arc::new(Mutex::new(BackendState::default()));
        let scheduler = Arc::new(Mutex::new(SchedulerState::default()));
        let session = Session::new(
            config,
            Box::new(MockBackend {
                state: Arc::clone(&backend),
            }),
            Box::new(MockScheduler {
                state: Arc::clone(&scheduler),
            }),
        );
        Self {
            session,
            backend,
            scheduler,
            next_media: 0,
        }
    }

    pub fn fail(&self, fault: Fault) {
        self.backend.lock().unwrap().faults.push(fault);
    }

    pub fn heal(&self) {
        self.backend.lock().unwrap().faults.clear();
    }

    /// Load a file without delivering its metadata
    pub fn load(&mut self, name: &str, mime: &str) -> (SourceId, Shared<MediaState>) {
        self.next_media += 1;
        let state = Arc::new(Mutex::new(MediaState::default()));
        let element = MockMedia {
            handle: MediaHandle(self.next_media),
            state: Arc::clone(&state),
        };
        let source = self
            .session
            .load_media(MediaFile::new(name, mime), Box::new(element))
            .unwrap();
        (source, state)
    }

    /// Load a file and deliver its metadata, attaching the graph
    pub async fn load_ready(&mut self, name: &str) -> (SourceId, Shared<MediaState>) {
        let (source, media) = self.load(name, "audio/mpeg");
        self.session.on_metadata_loaded(source).await.unwrap();
        (source, media)
    }

    pub fn live_nodes(&self) -> usize {
        self.backend.lock().unwrap().live_nodes.len()
    }

    pub fn outstanding_frames(&self) -> usize {
        self.scheduler.lock().unwrap().outstanding.len()
    }

    pub fn recording(&self) -> BTreeSet<ExportTicket> {
        self.backend.lock().unwrap().recording.clone()
    }

    pub fn semitones(&self) -> f64 {
        self.backend.lock().unwrap().semitones
    }
}
