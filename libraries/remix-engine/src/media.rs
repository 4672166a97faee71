//! Loaded media
//!
//! A [`MediaFile`] describes what the user picked; a [`MediaElement`] is the
//! platform's decoded, playable handle for it.

use crate::error::{BackendError, EngineError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Platform handle of a decoded media element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaHandle(pub u64);

/// Session-local identifier of one loaded file
///
/// Increases with every load so callbacks for a replaced file can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub u64);

/// Media kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

/// File chosen by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFile {
    /// File name including extension (e.g. `song.mp3`)
    pub name: String,

    /// MIME type reported by the platform (e.g. `audio/mpeg`)
    pub mime_type: String,
}

impl MediaFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Media kind derived from the MIME type
    ///
    /// Anything that is not `audio/*` or `video/*` is rejected.
    pub fn kind(&self) -> Result<MediaKind> {
        let mime = self.mime_type.trim().to_ascii_lowercase();
        if mime.starts_with("video/") {
            Ok(MediaKind::Video)
        } else if mime.starts_with("audio/") {
            Ok(MediaKind::Audio)
        } else {
            Err(EngineError::UnsupportedMedia(self.mime_type.clone()))
        }
    }

    /// File name without its last extension, or `fallback` if nothing remains
    pub fn basename<'a>(&'a self, fallback: &'a str) -> &'a str {
        let stem = match self.name.rfind('.') {
            Some(dot) if dot + 1 < self.name.len() => &self.name[..dot],
            _ => self.name.as_str(),
        };
        if stem.is_empty() {
            fallback
        } else {
            stem
        }
    }
}

/// Playable media element
///
/// Mirrors the subset of an HTML media element the engine needs.
#[async_trait]
pub trait MediaElement: Send {
    /// Platform handle used to build a graph source node
    fn handle(&self) -> MediaHandle;

    /// Start or resume playback
    async fn play(&mut self) -> std::result::Result<(), BackendError>;

    /// Pause playback (position is kept)
    fn pause(&mut self);

    /// Check if paused
    fn is_paused(&self) -> bool;

    /// Current position
    fn position(&self) -> Duration;

    /// Move the playback position
    fn seek(&mut self, position: Duration);

    /// Total duration, once known
    fn duration(&self) -> Option<Duration>;

    /// Set the playback rate multiplier
    fn set_playback_rate(&mut self, rate: f64);

    /// Mute or unmute the element's own direct output
    fn set_muted(&mut self, muted: bool);

    /// Check if the element's own output is muted
    fn is_muted(&self) -> bool;

    /// Release the decoded data and any temporary URL
    fn release(&mut self);
}

/// The single media source owned by a session
pub(crate) struct LoadedMedia {
    pub id: SourceId,
    pub file: MediaFile,
    pub kind: MediaKind,
    pub element: Box<dyn MediaElement>,
    pub metadata_ready: bool,
}
