/// Delay-line pitch shifter
///
/// Changes pitch without changing duration. Two read taps sweep through a
/// short delay line at the shifted rate, half a window apart; each tap fades
/// out as it wraps so the jump is inaudible. Latency is about half a window.
use std::f32::consts::PI;

/// Smallest and largest accepted analysis windows (seconds)
const MIN_WINDOW_SECS: f64 = 0.01;
const MAX_WINDOW_SECS: f64 = 0.5;

/// Largest shift in either direction (semitones)
pub const MAX_SEMITONES: f64 = 48.0;

/// One channel of delay line
#[derive(Debug, Clone)]
struct DelayLine {
    buffer: Vec<f32>,
    write: usize,
}

impl DelayLine {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len.max(4)],
            write: 0,
        }
    }

    #[inline]
    fn push(&mut self, sample: f32) {
        self.buffer[self.write] = sample;
        self.write = (self.write + 1) % self.buffer.len();
    }

    /// Sample written `delay` samples ago (fractional, linear interpolation)
    #[inline]
    fn read(&self, delay: f32) -> f32 {
        let len = self.buffer.len();
        let newest = (self.write + len - 1) % len;
        let position = newest as f32 - delay;
        let position = position.rem_euclid(len as f32);

        let index = position as usize % len;
        let frac = position.fract();
        let a = self.buffer[index];
        let b = self.buffer[(index + 1) % len];
        a + frac * (b - a)
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write = 0;
    }
}

/// Stereo pitch shifter operating on interleaved frames
#[derive(Debug, Clone)]
pub struct DelayLinePitchShifter {
    left: DelayLine,
    right: DelayLine,
    window_samples: f32,
    /// Sweep position in [0, 1)
    phase: f32,
    semitones: f64,
    /// Phase advance per frame, derived from `semitones`
    step: f32,
}

impl DelayLinePitchShifter {
    /// Create a shifter with the given window (seconds) at `sample_rate`
    pub fn new(window_secs: f64, sample_rate: u32) -> Self {
        let window = window_secs.clamp(MIN_WINDOW_SECS, MAX_WINDOW_SECS);
        let window_samples = (window * sample_rate as f64).max(4.0) as f32;
        let len = window_samples.ceil() as usize + 2;

        Self {
            left: DelayLine::new(len),
            right: DelayLine::new(len),
            window_samples,
            phase: 0.0,
            semitones: 0.0,
            step: 0.0,
        }
    }

    /// Set the shift in semitones (clamped to ±[`MAX_SEMITONES`])
    pub fn set_semitones(&mut self, semitones: f64) {
        let semitones = if semitones.is_finite() {
            semitones.clamp(-MAX_SEMITONES, MAX_SEMITONES)
        } else {
            0.0
        };
        self.semitones = semitones;

        let ratio = (semitones / 12.0).exp2() as f32;
        // Delay shrinks by (ratio - 1) samples per frame when shifting up
        self.step = (1.0 - ratio) / self.window_samples;
    }

    /// Current shift in semitones
    pub fn semitones(&self) -> f64 {
        self.semitones
    }

    /// Analysis window in samples
    pub fn window_samples(&self) -> f32 {
        self.window_samples
    }

    /// Process interleaved stereo in place
    pub fn process(&mut self, buffer: &mut [f32]) {
        for frame in buffer.chunks_exact_mut(2) {
            let (l, r) = self.process_frame(frame[0], frame[1]);
            frame[0] = l;
            frame[1] = r;
        }
    }

    /// Process one stereo frame
    #[inline]
    pub fn process_frame(&mut self, left: f32, right: f32) -> (f32, f32) {
        self.left.push(left);
        self.right.push(right);

        let phase_a = self.phase;
        let phase_b = (self.phase + 0.5).fract();

        let delay_a = phase_a * self.window_samples;
        let delay_b = phase_b * self.window_samples;

        // Half a period apart, sin² and cos² sum to one, so the output
        // never exceeds the input even when both taps line up
        let gain_a = (PI * phase_a).sin().powi(2);
        let gain_b = (PI * phase_b).sin().powi(2);

        let out_l = self.left.read(delay_a) * gain_a + self.left.read(delay_b) * gain_b;
        let out_r = self.right.read(delay_a) * gain_a + self.right.read(delay_b) * gain_b;

        self.phase = (self.phase + self.step).rem_euclid(1.0);

        (out_l, out_r)
    }

    /// Reset the delay lines to silence
    pub fn reset(&mut self) {
        self.left.clear();
        self.right.clear();
        self.phase = 0.0;
    }
}
