//! In-process render graph shared with the audio callback
//!
//! Media players feed source nodes; source, pitch, gain, capture and
//! speaker nodes are wired by edges and rendered in topological order
//! once per output block. Notifications for the shell (time updates,
//! natural end, metadata) leave through a crossbeam channel so the audio
//! thread never blocks on the session.

use crate::error::{DesktopError, Result};
use crossbeam_channel::Sender;
use remix_audio::{DecodedAudio, DelayLinePitchShifter, VarispeedReader};
use remix_engine::{BackendError, ExportTicket, FrameRequest, MediaHandle, NodeId, SourceId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

/// Render graph shared between the shell and the output thread
pub(crate) type SharedGraph = Arc<Mutex<RenderGraph>>;

/// Lock the shared graph, mapping poisoning to [`DesktopError::Poisoned`]
pub(crate) fn lock(graph: &SharedGraph) -> Result<MutexGuard<'_, RenderGraph>> {
    graph.lock().map_err(|_| DesktopError::Poisoned)
}

/// Raw notifications emitted by the native binding
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BackendEvent {
    Metadata(MediaHandle),
    TimeUpdate(MediaHandle),
    Ended(MediaHandle),
    Frame(FrameRequest),
    RecorderData { ticket: ExportTicket, bytes: Vec<u8> },
    RecorderStopped { ticket: ExportTicket },
}

#[derive(Debug)]
enum NodeKind {
    Source(MediaHandle),
    Pitch(Box<DelayLinePitchShifter>),
    Gain(f32),
    Capture { recording: Option<Vec<f32>> },
    Speakers,
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    /// Mix of everything routed into this node for the current block
    input: Vec<f32>,
}

/// One decoded file playing through the graph
#[derive(Debug)]
struct Player {
    /// Audio as decoded, kept for conversion to a new output rate
    original: Arc<DecodedAudio>,
    /// Reads the original converted to the output rate
    reader: VarispeedReader,
    /// Session source id, once the shell has bound one
    source_id: Option<SourceId>,
    playing: bool,
    muted: bool,
    source: Option<NodeId>,
    frames_since_update: usize,
}

/// Native audio graph
#[derive(Debug)]
pub struct RenderGraph {
    sample_rate: u32,
    time_update_frames: usize,
    running: bool,
    next_id: u64,
    speakers: NodeId,
    nodes: HashMap<NodeId, Node>,
    edges: Vec<(NodeId, NodeId)>,
    /// Topological order of `nodes`, rebuilt on every topology change
    order: Vec<NodeId>,
    players: HashMap<MediaHandle, Player>,
    scratch: Vec<f32>,
    events: Sender<BackendEvent>,
}

impl RenderGraph {
    pub(crate) fn new(sample_rate: u32, time_update_frames: usize, events: Sender<BackendEvent>) -> Self {
        let speakers = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            speakers,
            Node {
                kind: NodeKind::Speakers,
                input: Vec::new(),
            },
        );

        Self {
            sample_rate,
            time_update_frames,
            running: false,
            next_id: 1,
            speakers,
            nodes,
            edges: Vec::new(),
            order: vec![speakers],
            players: HashMap::new(),
            scratch: Vec::new(),
            events,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Change the output rate (e.g. once a device is opened)
    ///
    /// Returns the players whose audio has to be converted to the new rate
    /// with [`RenderGraph::replace_audio`].
    pub(crate) fn set_sample_rate(
        &mut self,
        sample_rate: u32,
        time_update_frames: usize,
    ) -> Vec<(MediaHandle, Arc<DecodedAudio>)> {
        self.sample_rate = sample_rate;
        self.time_update_frames = time_update_frames;
        self.players
            .iter()
            .filter(|(_, player)| player.reader.sample_rate() != sample_rate)
            .map(|(&handle, player)| (handle, Arc::clone(&player.original)))
            .collect()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub(crate) fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub fn speakers(&self) -> NodeId {
        self.speakers
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub(crate) fn emit(&self, event: BackendEvent) {
        if self.events.send(event).is_err() {
            debug!("Event receiver dropped");
        }
    }

    fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    // ===== Media players =====

    /// Register a player for `original`, reading `playable`
    ///
    /// `playable` is `original` converted to the current output rate.
    pub(crate) fn add_player(
        &mut self,
        original: Arc<DecodedAudio>,
        playable: Arc<DecodedAudio>,
    ) -> MediaHandle {
        if playable.sample_rate != self.sample_rate {
            warn!(
                "Player audio at {} Hz on a {} Hz graph",
                playable.sample_rate, self.sample_rate
            );
        }
        let handle = MediaHandle(self.allocate().0);
        self.players.insert(
            handle,
            Player {
                original,
                reader: VarispeedReader::new(playable),
                source_id: None,
                playing: false,
                muted: false,
                source: None,
                frames_since_update: 0,
            },
        );
        handle
    }

    pub(crate) fn remove_player(&mut self, handle: MediaHandle) {
        if let Some(player) = self.players.remove(&handle) {
            if let Some(source) = player.source {
                self.remove_node(source);
            }
            debug!("Released media {:?}", handle);
        }
    }

    /// Swap a player's audio for a copy converted to the output rate
    ///
    /// Conversions for a rate that is no longer current are dropped.
    pub(crate) fn replace_audio(&mut self, handle: MediaHandle, audio: Arc<DecodedAudio>) {
        if audio.sample_rate != self.sample_rate {
            debug!("Dropping stale conversion for {:?}", handle);
            return;
        }
        if let Some(player) = self.players.get_mut(&handle) {
            player.reader.replace_audio(audio);
        }
    }

    /// Associate a player with its session source id
    pub(crate) fn bind_source(&mut self, handle: MediaHandle, source: SourceId) {
        match self.players.get_mut(&handle) {
            Some(player) => player.source_id = Some(source),
            None => debug!("Not binding released media {:?}", handle),
        }
    }

    /// Session source id of a live, bound player
    pub(crate) fn source_id(&self, handle: MediaHandle) -> Option<SourceId> {
        self.players.get(&handle).and_then(|p| p.source_id)
    }

    fn player(&self, handle: MediaHandle) -> std::result::Result<&Player, BackendError> {
        self.players
            .get(&handle)
            .ok_or_else(|| BackendError::UnknownHandle(format!("media {}", handle.0)))
    }

    fn player_mut(&mut self, handle: MediaHandle) -> std::result::Result<&mut Player, BackendError> {
        self.players
            .get_mut(&handle)
            .ok_or_else(|| BackendError::UnknownHandle(format!("media {}", handle.0)))
    }

    pub(crate) fn play(&mut self, handle: MediaHandle) -> std::result::Result<(), BackendError> {
        let player = self.player_mut(handle)?;
        if player.reader.is_finished() {
            player.reader.seek(Duration::ZERO);
        }
        player.playing = true;
        player.frames_since_update = 0;
        Ok(())
    }

    pub(crate) fn pause(&mut self, handle: MediaHandle) {
        if let Ok(player) = self.player_mut(handle) {
            player.playing = false;
        }
    }

    pub(crate) fn is_paused(&self, handle: MediaHandle) -> bool {
        !self.player(handle).is_ok_and(|p| p.playing)
    }

    pub(crate) fn position(&self, handle: MediaHandle) -> Duration {
        self.player(handle)
            .map_or(Duration::ZERO, |p| p.reader.position())
    }

    pub(crate) fn seek(&mut self, handle: MediaHandle, position: Duration) {
        if let Ok(player) = self.player_mut(handle) {
            player.reader.seek(position);
        }
    }

    pub(crate) fn duration(&self, handle: MediaHandle) -> Option<Duration> {
        self.player(handle).ok().map(|p| p.reader.duration())
    }

    pub(crate) fn set_rate(&mut self, handle: MediaHandle, rate: f64) {
        if let Ok(player) = self.player_mut(handle) {
            player.reader.set_rate(rate);
        }
    }

    pub(crate) fn set_muted(&mut self, handle: MediaHandle, muted: bool) {
        if let Ok(player) = self.player_mut(handle) {
            player.muted = muted;
        }
    }

    pub(crate) fn is_muted(&self, handle: MediaHandle) -> bool {
        self.player(handle).is_ok_and(|p| p.muted)
    }

    // ===== Nodes =====

    fn insert(&mut self, kind: NodeKind) -> NodeId {
        let id = self.allocate();
        self.nodes.insert(
            id,
            Node {
                kind,
                input: Vec::new(),
            },
        );
        self.rebuild_order();
        id
    }

    /// Route a media player into a new source node
    ///
    /// A player feeds at most one source node at a time.
    pub(crate) fn add_source(&mut self, handle: MediaHandle) -> std::result::Result<NodeId, BackendError> {
        if self.player(handle)?.source.is_some() {
            return Err(BackendError::NodeConstruction(format!(
                "media {} is already routed into the graph",
                handle.0
            )));
        }
        let id = self.insert(NodeKind::Source(handle));
        self.player_mut(handle)?.source = Some(id);
        Ok(id)
    }

    pub(crate) fn add_pitch(&mut self, window_secs: f64) -> NodeId {
        let shifter = DelayLinePitchShifter::new(window_secs, self.sample_rate);
        self.insert(NodeKind::Pitch(Box::new(shifter)))
    }

    pub(crate) fn add_gain(&mut self) -> NodeId {
        self.insert(NodeKind::Gain(1.0))
    }

    pub(crate) fn add_capture(&mut self) -> NodeId {
        self.insert(NodeKind::Capture { recording: None })
    }

    pub(crate) fn set_semitones(&mut self, id: NodeId, semitones: f64) {
        if let Some(Node {
            kind: NodeKind::Pitch(shifter),
            ..
        }) = self.nodes.get_mut(&id)
        {
            shifter.set_semitones(semitones);
        }
    }

    pub(crate) fn connect(&mut self, from: NodeId, to: NodeId) -> std::result::Result<(), BackendError> {
        if !self.nodes.contains_key(&from) || !self.nodes.contains_key(&to) {
            return Err(BackendError::Connection(format!(
                "no such node in {} -> {}",
                from.0, to.0
            )));
        }
        if self.edges.contains(&(from, to)) {
            return Ok(());
        }

        self.edges.push((from, to));
        if !self.rebuild_order() {
            self.edges.pop();
            self.rebuild_order();
            return Err(BackendError::Connection(format!(
                "{} -> {} would create a cycle",
                from.0, to.0
            )));
        }
        Ok(())
    }

    pub(crate) fn disconnect(&mut self, from: NodeId) {
        self.edges.retain(|&(source, _)| source != from);
        self.rebuild_order();
    }

    pub(crate) fn remove_node(&mut self, id: NodeId) {
        if id == self.speakers {
            return;
        }
        if let Some(node) = self.nodes.remove(&id) {
            if let NodeKind::Source(handle) = node.kind {
                if let Some(player) = self.players.get_mut(&handle) {
                    player.source = None;
                }
            }
            self.edges.retain(|&(from, to)| from != id && to != id);
            self.rebuild_order();
        }
    }

    pub(crate) fn is_capture(&self, id: NodeId) -> bool {
        matches!(
            self.nodes.get(&id),
            Some(Node {
                kind: NodeKind::Capture { .. },
                ..
            })
        )
    }

    /// Begin accumulating everything routed into `id`
    pub(crate) fn start_capture(&mut self, id: NodeId) -> std::result::Result<(), BackendError> {
        match self.nodes.get_mut(&id) {
            Some(Node {
                kind: NodeKind::Capture { recording },
                ..
            }) => {
                *recording = Some(Vec::new());
                Ok(())
            }
            _ => Err(BackendError::Recorder(format!("node {} is not a capture destination", id.0))),
        }
    }

    /// Stop accumulating and hand back what was captured
    pub(crate) fn take_capture(&mut self, id: NodeId) -> Option<Vec<f32>> {
        match self.nodes.get_mut(&id) {
            Some(Node {
                kind: NodeKind::Capture { recording },
                ..
            }) => recording.take(),
            _ => None,
        }
    }

    /// Kahn's algorithm; returns false when the edges contain a cycle
    fn rebuild_order(&mut self) -> bool {
        let mut indegree: HashMap<NodeId, usize> = self.nodes.keys().map(|&id| (id, 0)).collect();
        for (_, to) in &self.edges {
            if let Some(count) = indegree.get_mut(to) {
                *count += 1;
            }
        }

        let mut ready: Vec<NodeId> = indegree
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(&id, _)| id)
            .collect();
        ready.sort_by_key(|id| std::cmp::Reverse(id.0));

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = ready.pop() {
            order.push(id);
            for &(from, to) in &self.edges {
                if from != id {
                    continue;
                }
                if let Some(count) = indegree.get_mut(&to) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(to);
                    }
                }
            }
        }

        if order.len() == self.nodes.len() {
            self.order = order;
            true
        } else {
            false
        }
    }

    // ===== Rendering =====

    /// Render one block of interleaved stereo into `out`
    pub fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        let len = out.len() - out.len() % DecodedAudio::CHANNELS;
        let out = &mut out[..len];

        for node in self.nodes.values_mut() {
            node.input.clear();
            node.input.resize(len, 0.0);
        }

        let mut finished = Vec::new();
        let mut updates = Vec::new();

        for (&handle, player) in &mut self.players {
            if !player.playing {
                continue;
            }

            self.scratch.clear();
            self.scratch.resize(len, 0.0);
            let written = player.reader.read(&mut self.scratch);

            if !player.muted {
                mix(out, &self.scratch);
            }
            if self.running {
                if let Some(node) = player.source.and_then(|id| self.nodes.get_mut(&id)) {
                    mix(&mut node.input, &self.scratch);
                }
            }

            player.frames_since_update += written;
            if player.frames_since_update >= self.time_update_frames {
                player.frames_since_update = 0;
                updates.push(handle);
            }
            if player.reader.is_finished() {
                player.playing = false;
                finished.push(handle);
            }
        }

        if self.running {
            self.process_nodes(out);
        }

        for handle in updates {
            self.emit(BackendEvent::TimeUpdate(handle));
        }
        for handle in finished {
            debug!("Media {:?} reached the end", handle);
            self.emit(BackendEvent::TimeUpdate(handle));
            self.emit(BackendEvent::Ended(handle));
        }
    }

    fn process_nodes(&mut self, out: &mut [f32]) {
        for index in 0..self.order.len() {
            let id = self.order[index];
            let Some(node) = self.nodes.get_mut(&id) else {
                warn!("Node {} missing from render order", id.0);
                continue;
            };

            let mut buffer = std::mem::take(&mut node.input);
            match &mut node.kind {
                NodeKind::Source(_) => {}
                NodeKind::Pitch(shifter) => shifter.process(&mut buffer),
                NodeKind::Gain(gain) => buffer.iter_mut().for_each(|s| *s *= *gain),
                NodeKind::Capture { recording } => {
                    if let Some(recording) = recording {
                        recording.extend_from_slice(&buffer);
                    }
                }
                NodeKind::Speakers => mix(out, &buffer),
            }

            for &(from, to) in &self.edges {
                if from != id {
                    continue;
                }
                if let Some(next) = self.nodes.get_mut(&to) {
                    mix(&mut next.input, &buffer);
                }
            }

            if let Some(node) = self.nodes.get_mut(&id) {
                node.input = buffer;
            }
        }

        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }
}

#[inline]
fn mix(into: &mut [f32], from: &[f32]) {
    for (dst, src) in into.iter_mut().zip(from) {
        *dst += src;
    }
}
