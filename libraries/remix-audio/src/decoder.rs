/// Whole-file decoding with Symphonia
use crate::error::{AudioError, Result};
use std::path::Path;
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Fallback when the container does not declare a sample rate
const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// -3dB, used to fold a center channel into left and right
const CENTER_MIX: f32 = 0.707;

/// Decoded audio, always interleaved stereo f32 in [-1.0, 1.0]
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Interleaved channel count (always stereo)
    pub const CHANNELS: usize = 2;

    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Number of stereo frames
    pub fn frames(&self) -> usize {
        self.samples.len() / Self::CHANNELS
    }

    /// Playing time at the native sample rate
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Stereo frame at `index`, silence past the end
    #[inline]
    pub fn frame(&self, index: usize) -> (f32, f32) {
        let base = index * Self::CHANNELS;
        match self.samples.get(base..base + Self::CHANNELS) {
            Some(frame) => (frame[0], frame[1]),
            None => (0.0, 0.0),
        }
    }
}

/// Decode a whole file to interleaved stereo
///
/// Supports: MP3, FLAC, OGG/Vorbis, WAV, AAC/M4A. For video containers the
/// default audio track is decoded.
pub fn decode_file(path: &Path) -> Result<DecodedAudio> {
    if !path.exists() {
        return Err(AudioError::FileNotFound(path.display().to_string()));
    }

    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AudioError::UnsupportedFormat(format!("Failed to probe file: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| AudioError::DecodeError("No audio tracks found".to_string()))?;

    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::Symphonia(format!("Failed to create decoder: {}", e)))?;

    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => {
                return Err(AudioError::Symphonia(format!("Error reading packet: {}", e)));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(AudioError::DecodeError(e.to_string())),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count();

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);

        downmix_to_stereo(buffer.samples(), channels, &mut samples);
    }

    debug!(
        "Decoded {} ({} frames at {} Hz)",
        path.display(),
        samples.len() / DecodedAudio::CHANNELS,
        sample_rate
    );

    Ok(DecodedAudio::new(samples, sample_rate))
}

/// Fold interleaved audio with any channel count into interleaved stereo
///
/// Mono is duplicated, stereo passes through, and for three or more channels
/// the third (center) channel is mixed into both sides at -3dB. Further
/// channels are dropped.
pub fn downmix_to_stereo(input: &[f32], channels: usize, output: &mut Vec<f32>) {
    if channels == 0 {
        return;
    }

    output.reserve(input.len() / channels * DecodedAudio::CHANNELS);
    for frame in input.chunks_exact(channels) {
        let (left, right) = match channels {
            1 => (frame[0], frame[0]),
            2 => (frame[0], frame[1]),
            _ => {
                let center = frame[2] * CENTER_MIX;
                (frame[0] + center, frame[1] + center)
            }
        };
        output.push(left.clamp(-1.0, 1.0));
        output.push(right.clamp(-1.0, 1.0));
    }
}
