//! Variable-rate reading of decoded audio
//!
//! Reads a [`DecodedAudio`] buffer at an arbitrary playback rate. The buffer
//! must already be at the output sample rate (see [`crate::resample`]).
//! Changing the rate changes both tempo and pitch, like a tape machine;
//! pitch correction is the job of [`crate::pitch::DelayLinePitchShifter`].

use crate::decoder::DecodedAudio;
use std::sync::Arc;
use std::time::Duration;

/// Slowest accepted rate
const MIN_RATE: f64 = 0.01;

/// Cursor over shared decoded audio
#[derive(Debug, Clone)]
pub struct VarispeedReader {
    audio: Arc<DecodedAudio>,
    /// Fractional frame position in the source
    position: f64,
    rate: f64,
}

impl VarispeedReader {
    pub fn new(audio: Arc<DecodedAudio>) -> Self {
        Self {
            audio,
            position: 0.0,
            rate: 1.0,
        }
    }

    /// Playback rate (1.0 = native speed)
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Set the playback rate; non-finite values are ignored
    pub fn set_rate(&mut self, rate: f64) {
        if rate.is_finite() {
            self.rate = rate.max(MIN_RATE);
        }
    }

    /// Sample rate of the audio being read
    pub fn sample_rate(&self) -> u32 {
        self.audio.sample_rate
    }

    /// Swap in a converted copy of the same media, keeping the media time
    pub fn replace_audio(&mut self, audio: Arc<DecodedAudio>) {
        let position = self.position();
        self.audio = audio;
        self.seek(position);
    }

    /// Media time of the read cursor
    pub fn position(&self) -> Duration {
        if self.audio.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.position / self.audio.sample_rate as f64)
    }

    pub fn duration(&self) -> Duration {
        self.audio.duration()
    }

    /// Move the cursor, clamped to the media length
    pub fn seek(&mut self, position: Duration) {
        let frame = position.as_secs_f64() * self.audio.sample_rate as f64;
        self.position = frame.clamp(0.0, self.audio.frames() as f64);
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.audio.frames() as f64
    }

    /// Fill interleaved stereo `out`; returns the number of frames written
    ///
    /// Frames past the end of the media are zeroed and not counted.
    pub fn read(&mut self, out: &mut [f32]) -> usize {
        let step = self.rate;
        let total = self.audio.frames();
        let mut written = 0;

        for frame in out.chunks_exact_mut(DecodedAudio::CHANNELS) {
            if self.position >= total as f64 {
                frame.fill(0.0);
                continue;
            }

            let index = self.position as usize;
            let frac = (self.position - index as f64) as f32;
            let (l0, r0) = self.audio.frame(index);
            let (l1, r1) = if index + 1 < total {
                self.audio.frame(index + 1)
            } else {
                (l0, r0)
            };

            frame[0] = l0 + frac * (l1 - l0);
            frame[1] = r0 + frac * (r1 - r0);

            self.position += step;
            written += 1;
        }

        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize, sample_rate: u32) -> Arc<DecodedAudio> {
        let samples = (0..frames)
            .flat_map(|i| {
                let v = i as f32 / frames as f32;
                [v, -v]
            })
            .collect();
        Arc::new(DecodedAudio::new(samples, sample_rate))
    }

    #[test]
    fn unity_rate_copies_frames() {
        let audio = ramp(8, 100);
        let mut reader = VarispeedReader::new(audio.clone());
        let mut out = vec![0.0; 16];
        assert_eq!(reader.read(&mut out), 8);
        assert_eq!(out, audio.samples);
        assert!(reader.is_finished());
    }

    #[test]
    fn double_rate_consumes_twice_as_fast() {
        let mut reader = VarispeedReader::new(ramp(100, 100));
        reader.set_rate(2.0);
        let mut out = vec![0.0; 2 * 50];
        assert_eq!(reader.read(&mut out), 50);
        assert!(reader.is_finished());
    }

    #[test]
    fn half_rate_interpolates() {
        let mut reader = VarispeedReader::new(ramp(4, 100));
        reader.set_rate(0.5);
        let mut out = vec![0.0; 4];
        reader.read(&mut out);
        assert!((out[2] - 0.125).abs() < 1e-6);
        assert!((out[3] + 0.125).abs() < 1e-6);
    }

    #[test]
    fn replacing_audio_keeps_media_time() {
        let mut reader = VarispeedReader::new(ramp(100, 100));
        reader.seek(Duration::from_millis(250));
        reader.replace_audio(ramp(200, 200));
        assert_eq!(reader.position(), Duration::from_millis(250));

        let mut out = vec![0.0; 2 * 200];
        assert_eq!(reader.read(&mut out), 150);
    }

    #[test]
    fn seek_is_clamped() {
        let mut reader = VarispeedReader::new(ramp(100, 100));
        reader.seek(Duration::from_millis(500));
        assert_eq!(reader.position(), Duration::from_millis(500));
        reader.seek(Duration::from_secs(10));
        assert!(reader.is_finished());
        assert_eq!(reader.position(), Duration::from_secs(1));
    }

    #[test]
    fn tail_is_silent() {
        let mut reader = VarispeedReader::new(ramp(2, 100));
        let mut out = vec![1.0; 8];
        assert_eq!(reader.read(&mut out), 2);
        assert_eq!(&out[4..], &[0.0; 4]);
    }
}
