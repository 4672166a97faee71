//! Transport: play, pause, stop and the display refresh loop
//!
//! While playing, the transport keeps exactly one frame request outstanding.
//! Each accepted tick schedules the next; pause and stop cancel it. A tick
//! whose request is no longer the outstanding one is ignored.

use crate::error::{EngineError, Result};
use crate::media::MediaElement;
use crate::nodes::{FrameRequest, FrameScheduler};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Transport state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportState {
    /// Paused or stopped
    Idle,
    /// Media is playing and the display refresh loop runs
    Playing,
}

/// Play/pause/stop coordinator
#[derive(Debug)]
pub struct Transport {
    state: TransportState,
    frame: Option<FrameRequest>,
}

impl Transport {
    pub fn new() -> Self {
        Self {
            state: TransportState::Idle,
            frame: None,
        }
    }

    /// Current state
    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Check if playing
    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    /// Frame request currently outstanding, if any
    pub fn pending_frame(&self) -> Option<FrameRequest> {
        self.frame
    }

    /// Start media playback and the refresh loop
    ///
    /// The caller resumes the audio runtime first. If the media element
    /// refuses to play, the transport stays `Idle`.
    pub async fn play(
        &mut self,
        media: &mut dyn MediaElement,
        scheduler: &mut dyn FrameScheduler,
    ) -> Result<()> {
        media
            .play()
            .await
            .map_err(|e| EngineError::PlaybackStart(e.to_string()))?;

        self.state = TransportState::Playing;
        self.cancel_refresh(scheduler);
        self.frame = Some(scheduler.request_frame());
        debug!("Transport playing");
        Ok(())
    }

    /// Pause media and cancel the refresh loop
    pub fn pause(&mut self, media: &mut dyn MediaElement, scheduler: &mut dyn FrameScheduler) {
        media.pause();
        self.state = TransportState::Idle;
        self.cancel_refresh(scheduler);
        debug!("Transport paused");
    }

    /// Pause, optionally rewind to zero, and cancel the refresh loop
    pub fn stop(
        &mut self,
        media: &mut dyn MediaElement,
        scheduler: &mut dyn FrameScheduler,
        reset: bool,
    ) {
        media.pause();
        if reset {
            media.seek(Duration::ZERO);
        }
        self.state = TransportState::Idle;
        self.cancel_refresh(scheduler);
        debug!("Transport stopped (reset: {})", reset);
    }

    /// Handle one frame callback
    ///
    /// Returns `true` if the tick belongs to the running loop, in which case
    /// the next frame has been requested if the media is still playing.
    pub fn on_frame(
        &mut self,
        request: FrameRequest,
        media: &dyn MediaElement,
        scheduler: &mut dyn FrameScheduler,
    ) -> bool {
        if self.frame != Some(request) {
            return false;
        }
        self.frame = None;

        if self.is_playing() && !media.is_paused() {
            self.frame = Some(scheduler.request_frame());
        }
        true
    }

    /// Cancel the outstanding frame request, if any
    pub fn cancel_refresh(&mut self, scheduler: &mut dyn FrameScheduler) {
        if let Some(request) = self.frame.take() {
            scheduler.cancel_frame(request);
        }
    }

    /// Forget all state without touching media (media was released)
    pub fn reset(&mut self, scheduler: &mut dyn FrameScheduler) {
        self.cancel_refresh(scheduler);
        self.state = TransportState::Idle;
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}
