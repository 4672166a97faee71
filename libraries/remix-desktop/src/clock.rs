//! Frame scheduler for native shells
use crate::render::BackendEvent;
use crossbeam_channel::Sender;
use remix_engine::{FrameRequest, FrameScheduler};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::warn;

#[derive(Debug, Default)]
struct ClockState {
    next: AtomicU64,
    pending: Mutex<Vec<FrameRequest>>,
}

/// Display-refresh scheduler driven by the shell's UI loop
///
/// Requests accumulate until [`FrameClock::tick`] fires them all as frame
/// events on the backend channel. Clones share the pending set.
#[derive(Debug, Clone)]
pub struct FrameClock {
    state: Arc<ClockState>,
    events: Sender<BackendEvent>,
}

impl FrameClock {
    pub(crate) fn new(events: Sender<BackendEvent>) -> Self {
        Self {
            state: Arc::new(ClockState::default()),
            events,
        }
    }

    /// Fire every pending request; returns how many fired
    pub fn tick(&self) -> usize {
        let due = match self.state.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(_) => {
                warn!("Frame clock lock poisoned");
                return 0;
            }
        };
        let count = due.len();
        for request in due {
            if self.events.send(BackendEvent::Frame(request)).is_err() {
                break;
            }
        }
        count
    }

    /// Requests waiting for the next tick
    pub fn pending(&self) -> usize {
        self.state.pending.lock().map_or(0, |p| p.len())
    }
}

impl FrameScheduler for FrameClock {
    fn request_frame(&mut self) -> FrameRequest {
        let request = FrameRequest(self.state.next.fetch_add(1, Ordering::Relaxed) + 1);
        match self.state.pending.lock() {
            Ok(mut pending) => pending.push(request),
            Err(_) => warn!("Frame clock lock poisoned"),
        }
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        if let Ok(mut pending) = self.state.pending.lock() {
            pending.retain(|r| *r != request);
        }
    }
}
