//! Session wired to the native binding
use crate::backend::NativeBackend;
use crate::clock::FrameClock;
use crate::config::DesktopConfig;
use crate::error::Result;
use crate::media::NativeMedia;
use crate::output::CpalOutput;
use remix_audio::DecodedAudio;
use remix_engine::{EngineConfig, MediaElement, MediaFile, Session, SessionEvent, SourceId};
use std::path::Path;
use tracing::{debug, warn};

/// Guess a MIME type from a file extension
///
/// Unknown extensions map to `application/octet-stream`, which the session
/// rejects as unsupported media.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("flac") => "audio/flac",
        Some("ogg" | "oga") => "audio/ogg",
        Some("m4a") => "audio/mp4",
        Some("aac") => "audio/aac",
        Some("mp4" | "m4v") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("mov") => "video/quicktime",
        _ => "application/octet-stream",
    }
}

/// A [`Session`] driven by a [`NativeBackend`] and [`FrameClock`]
///
/// The shell calls [`DesktopHost::pump`] from its UI loop; everything the
/// render thread reported since the last pump is delivered to the session.
#[derive(Debug)]
pub struct DesktopHost {
    session: Session,
    backend: NativeBackend,
    clock: FrameClock,
}

impl DesktopHost {
    pub fn new(engine: EngineConfig, desktop: DesktopConfig) -> Result<Self> {
        desktop.validate()?;
        engine.validate()?;

        let backend = NativeBackend::new(desktop);
        let clock = backend.frame_clock();
        let session = Session::new(engine, Box::new(backend.clone()), Box::new(clock.clone()));

        Ok(Self {
            session,
            backend,
            clock,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn backend(&self) -> &NativeBackend {
        &self.backend
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Decode and load a file from disk
    ///
    /// Unsupported types are rejected before any decoding happens.
    pub fn open(&mut self, path: &Path) -> Result<SourceId> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file = MediaFile::new(name, mime_for_path(path));
        file.kind()?;

        let media = self.backend.open_media(path)?;
        self.load(file, media)
    }

    /// Load already decoded audio under the given name and MIME type
    pub fn open_decoded(&mut self, file: MediaFile, audio: DecodedAudio) -> Result<SourceId> {
        file.kind()?;
        let media = self.backend.open_decoded(audio)?;
        self.load(file, media)
    }

    fn load(&mut self, file: MediaFile, media: NativeMedia) -> Result<SourceId> {
        let handle = media.handle();
        let source = self.session.load_media(file, Box::new(media))?;
        self.backend.bind_source(handle, source);
        Ok(source)
    }

    /// Fire due frames and deliver pending platform events to the session
    ///
    /// Returns the number of events delivered. A failing callback has
    /// already been reported as a session notice and does not stop delivery.
    pub async fn pump(&mut self) -> Result<usize> {
        self.clock.tick();
        let events = self.backend.poll_events();
        let count = events.len();
        for event in events {
            if let Err(e) = self.session.handle(event).await {
                warn!("Platform event failed: {}", e);
            }
        }
        if count > 0 {
            debug!("Delivered {} platform events", count);
        }
        Ok(count)
    }

    /// Render `frames` frames without a device, then pump
    pub async fn advance(&mut self, frames: usize) -> Result<usize> {
        self.backend.advance(frames)?;
        self.pump().await
    }

    /// Open the default output device and start rendering to it
    pub fn start_output(&self) -> Result<CpalOutput> {
        CpalOutput::new(&self.backend)
    }

    /// Session events produced since the last call
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.session.drain_events()
    }
}
