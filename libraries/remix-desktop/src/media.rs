//! Native media element backed by a render-graph player
use crate::render::{lock, SharedGraph};
use async_trait::async_trait;
use remix_engine::{BackendError, MediaElement, MediaHandle};
use std::time::Duration;
use tracing::warn;

/// Decoded file registered with a [`crate::NativeBackend`]
///
/// Queries on a poisoned graph fall back to "paused at zero".
#[derive(Debug)]
pub struct NativeMedia {
    handle: MediaHandle,
    graph: SharedGraph,
    released: bool,
}

impl NativeMedia {
    pub(crate) fn new(handle: MediaHandle, graph: SharedGraph) -> Self {
        Self {
            handle,
            graph,
            released: false,
        }
    }

    fn with_graph<T>(&self, fallback: T, f: impl FnOnce(&mut crate::render::RenderGraph) -> T) -> T {
        match lock(&self.graph) {
            Ok(mut graph) => f(&mut graph),
            Err(e) => {
                warn!("Media {:?}: {}", self.handle, e);
                fallback
            }
        }
    }
}

#[async_trait]
impl MediaElement for NativeMedia {
    fn handle(&self) -> MediaHandle {
        self.handle
    }

    async fn play(&mut self) -> Result<(), BackendError> {
        if self.released {
            return Err(BackendError::Playback("media was released".to_string()));
        }
        lock(&self.graph)?.play(self.handle)
    }

    fn pause(&mut self) {
        let handle = self.handle;
        self.with_graph((), |graph| graph.pause(handle));
    }

    fn is_paused(&self) -> bool {
        let handle = self.handle;
        self.with_graph(true, |graph| graph.is_paused(handle))
    }

    fn position(&self) -> Duration {
        let handle = self.handle;
        self.with_graph(Duration::ZERO, |graph| graph.position(handle))
    }

    fn seek(&mut self, position: Duration) {
        let handle = self.handle;
        self.with_graph((), |graph| graph.seek(handle, position));
    }

    fn duration(&self) -> Option<Duration> {
        let handle = self.handle;
        self.with_graph(None, |graph| graph.duration(handle))
    }

    fn set_playback_rate(&mut self, rate: f64) {
        let handle = self.handle;
        self.with_graph((), |graph| graph.set_rate(handle, rate));
    }

    fn set_muted(&mut self, muted: bool) {
        let handle = self.handle;
        self.with_graph((), |graph| graph.set_muted(handle, muted));
    }

    fn is_muted(&self) -> bool {
        let handle = self.handle;
        self.with_graph(false, |graph| graph.is_muted(handle))
    }

    fn release(&mut self) {
        if std::mem::replace(&mut self.released, true) {
            return;
        }
        let handle = self.handle;
        self.with_graph((), |graph| graph.remove_player(handle));
    }
}

impl Drop for NativeMedia {
    fn drop(&mut self) {
        self.release();
    }
}
