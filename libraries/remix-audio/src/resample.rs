//! Sample-rate conversion of decoded audio
//!
//! Decoded files arrive at whatever rate they were recorded at; the render
//! graph runs at the device rate. [`resample`] converts a whole buffer with
//! rubato's sinc resampler so playback speed stays a pure ratio.

use crate::decoder::DecodedAudio;
use crate::error::{AudioError, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

/// Convert `audio` to `target_rate`
///
/// Returns a copy when the rates already match. The output length is the
/// input length scaled by the rate ratio; the filter delay is trimmed.
pub fn resample(audio: &DecodedAudio, target_rate: u32) -> Result<DecodedAudio> {
    if audio.sample_rate == 0 || target_rate == 0 {
        return Err(AudioError::InvalidBuffer(format!(
            "cannot resample {} Hz audio to {} Hz",
            audio.sample_rate, target_rate
        )));
    }
    if audio.sample_rate == target_rate || audio.frames() == 0 {
        return Ok(DecodedAudio::new(audio.samples.clone(), target_rate));
    }

    let channels = DecodedAudio::CHANNELS;
    let frames = audio.frames();
    let ratio = target_rate as f64 / audio.sample_rate as f64;

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    // 0.1 s of input per chunk
    let chunk_frames = (audio.sample_rate as usize / 10).max(1);

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk_frames, channels)
        .map_err(|e| AudioError::ResampleError(e.to_string()))?;

    let delay = resampler.output_delay();
    let expected = (frames as f64 * ratio).round() as usize;
    let mut planar = vec![Vec::with_capacity(expected + delay); channels];

    let mut offset = 0;
    while offset < frames {
        let needed = resampler.input_frames_next();
        let end = (offset + needed).min(frames);
        let chunk = deinterleave(&audio.samples, offset, end, channels);

        let resampled = if end - offset == needed {
            resampler.process(&chunk, None)
        } else {
            resampler.process_partial(Some(chunk.as_slice()), None)
        }
        .map_err(|e| AudioError::ResampleError(e.to_string()))?;

        append(&mut planar, resampled);
        offset = end;
    }

    // Flush the filter tail
    while planar[0].len() < expected + delay {
        let resampled = resampler
            .process_partial::<Vec<f32>>(None, None)
            .map_err(|e| AudioError::ResampleError(e.to_string()))?;
        if resampled[0].is_empty() {
            break;
        }
        append(&mut planar, resampled);
    }

    let end = (delay + expected).min(planar[0].len());
    let mut samples = Vec::with_capacity(end.saturating_sub(delay) * channels);
    for frame_idx in delay..end {
        for channel_data in &planar {
            samples.push(channel_data[frame_idx]);
        }
    }

    debug!(
        "Resampled {} frames at {} Hz to {} frames at {} Hz",
        frames,
        audio.sample_rate,
        samples.len() / channels,
        target_rate
    );

    Ok(DecodedAudio::new(samples, target_rate))
}

fn deinterleave(samples: &[f32], start: usize, end: usize, channels: usize) -> Vec<Vec<f32>> {
    let mut deinterleaved = vec![Vec::with_capacity(end - start); channels];
    for frame_idx in start..end {
        for (ch, channel_vec) in deinterleaved.iter_mut().enumerate() {
            channel_vec.push(samples[frame_idx * channels + ch]);
        }
    }
    deinterleaved
}

fn append(planar: &mut [Vec<f32>], resampled: Vec<Vec<f32>>) {
    for (channel_vec, data) in planar.iter_mut().zip(resampled) {
        channel_vec.extend(data);
    }
}
