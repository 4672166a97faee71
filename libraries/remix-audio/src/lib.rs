//! Remix Audio
//!
//! Signal-level building blocks for the Remix desktop binding.
//!
//! This crate provides:
//! - Whole-file decoding via Symphonia to interleaved stereo f32
//! - Sample-rate conversion to the device rate via rubato
//! - A delay-line pitch shifter (pitch changes, duration does not)
//! - Varispeed reading (tempo and pitch change together)
//! - In-memory WAV encoding for exported captures
//!
//! # Example
//!
//! ```rust
//! use remix_audio::{DecodedAudio, DelayLinePitchShifter, VarispeedReader};
//! use std::sync::Arc;
//!
//! let decoded = DecodedAudio::new(vec![0.0; 2 * 4410], 44100);
//! let audio = Arc::new(remix_audio::resample(&decoded, 48000).unwrap());
//!
//! // Play at 1.5x and pull the pitch back down to the original
//! let mut reader = VarispeedReader::new(audio);
//! reader.set_rate(1.5);
//! let mut shifter = DelayLinePitchShifter::new(0.1, 48000);
//! shifter.set_semitones(-12.0 * 1.5f64.log2());
//!
//! let mut block = vec![0.0; 512];
//! reader.read(&mut block);
//! shifter.process(&mut block);
//! ```

pub mod decoder;
mod error;
pub mod pitch;
pub mod resample;
pub mod varispeed;
pub mod wav;

pub use decoder::{decode_file, DecodedAudio};
pub use error::{AudioError, Result};
pub use pitch::DelayLinePitchShifter;
pub use resample::resample;
pub use varispeed::VarispeedReader;
pub use wav::{encode_wav, WAV_MIME_TYPE};
