//! Time-scale math
//!
//! Converts between speed ratio, pitch ratio and the semitone offset consumed
//! by the pitch-shift node. The media element's playback rate already moves
//! pitch by `speed`; the pitch node corrects by `pitch / speed`.

/// Smallest ratio the model will take a logarithm of
pub const RATIO_EPSILON: f64 = 1e-4;

/// Semitones per octave
const SEMITONES_PER_OCTAVE: f64 = 12.0;

/// Clamp a ratio into the positive, finite domain
///
/// Non-positive and NaN values become [`RATIO_EPSILON`]; `+inf` becomes `f64::MAX`.
#[inline]
pub fn sanitize_ratio(ratio: f64) -> f64 {
    if ratio.is_nan() || ratio <= 0.0 {
        RATIO_EPSILON
    } else if ratio.is_infinite() {
        f64::MAX
    } else {
        ratio.max(RATIO_EPSILON)
    }
}

/// Convert a multiplicative pitch ratio to semitones
///
/// `12 * log2(max(ratio, ε))`
#[inline]
pub fn ratio_to_semitones(ratio: f64) -> f64 {
    let ratio = if ratio.is_nan() { RATIO_EPSILON } else { ratio };
    SEMITONES_PER_OCTAVE * ratio.clamp(RATIO_EPSILON, f64::MAX).log2()
}

/// Convert semitones back to a multiplicative ratio
#[inline]
pub fn semitones_to_ratio(semitones: f64) -> f64 {
    (semitones / SEMITONES_PER_OCTAVE).exp2()
}

/// Semitone offset the pitch node must apply for the given speed and pitch
///
/// `12 * log2(max(pitch / speed, ε))`. Both ratios are sanitized first, so
/// the result is always finite.
pub fn semitone_offset(speed_ratio: f64, pitch_ratio: f64) -> f64 {
    let speed = sanitize_ratio(speed_ratio);
    let pitch = sanitize_ratio(pitch_ratio);
    ratio_to_semitones(pitch / speed)
}
