//! Native desktop binding for the Remix engine
//!
//! This crate implements the engine's platform traits in-process:
//!
//! - [`NativeBackend`]: render graph of source, pitch, gain, capture and
//!   speaker nodes (`AudioBackend`)
//! - [`NativeMedia`]: decoded file played by varispeed (`MediaElement`)
//! - [`WavStreamRecorder`]: captures a node and delivers WAV bytes
//!   (`StreamRecorder`)
//! - [`FrameClock`]: display refresh driven by the shell (`FrameScheduler`)
//! - [`CpalOutput`]: pulls the render graph from the default device
//!
//! Platform notifications travel over a crossbeam channel and reach the
//! session through [`NativeBackend::poll_events`], or all at once through
//! [`DesktopHost::pump`].
//!
//! # Example
//!
//! ```no_run
//! use remix_desktop::{DesktopConfig, DesktopHost};
//! use remix_engine::EngineConfig;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut host = DesktopHost::new(EngineConfig::default(), DesktopConfig::default())?;
//! let _output = host.start_output()?;
//!
//! host.open(Path::new("/music/take.flac"))?;
//! host.pump().await?; // metadata → processing graph
//!
//! host.session_mut().set_speed(1.25)?;
//! host.session_mut().play().await?;
//! loop {
//!     host.pump().await?;
//!     for event in host.drain_events() {
//!         println!("{event:?}");
//!     }
//! #   break;
//! }
//! # Ok(())
//! # }
//! ```

mod backend;
mod clock;
pub mod config;
mod error;
mod host;
mod media;
mod output;
mod recorder;
mod render;

pub use backend::NativeBackend;
pub use clock::FrameClock;
pub use config::DesktopConfig;
pub use error::{DesktopError, Result};
pub use host::{mime_for_path, DesktopHost};
pub use media::NativeMedia;
pub use output::CpalOutput;
pub use recorder::WavStreamRecorder;
