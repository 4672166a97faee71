//! In-memory WAV encoding

use crate::decoder::DecodedAudio;
use crate::error::{AudioError, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;

/// MIME type of the bytes produced by [`encode_wav`]
pub const WAV_MIME_TYPE: &str = "audio/wav";

/// Encode interleaved stereo f32 as 16-bit PCM WAV bytes
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    if sample_rate == 0 {
        return Err(AudioError::InvalidBuffer("sample rate is zero".to_string()));
    }
    if samples.len() % DecodedAudio::CHANNELS != 0 {
        return Err(AudioError::InvalidBuffer(format!(
            "{} samples is not a whole number of stereo frames",
            samples.len()
        )));
    }

    let spec = WavSpec {
        channels: DecodedAudio::CHANNELS as u16,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample(to_i16(sample))?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

#[inline]
fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}
