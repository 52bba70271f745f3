//! Sine tone generation with click-free linear fades.
//!
//! ```rust
//! use sound_filter::audio::{fade_ms_for, ToneGenerator};
//!
//! assert_eq!(fade_ms_for(1_000), 50);
//! assert_eq!(fade_ms_for(120), 30);
//!
//! let tone = ToneGenerator::new(440.0).render(800, 8_000);
//! assert_eq!(tone.len(), 800);
//! assert_eq!(tone[0], 0.0);
//! ```

/// Longest fade applied at either end of a tone.
pub const MAX_FADE_MS: u64 = 50;

/// Fade length for a segment of `duration_ms`: `min(50 ms, duration / 4)`.
pub fn fade_ms_for(duration_ms: u64) -> u64 {
    MAX_FADE_MS.min(duration_ms / 4)
}

/// Mono sine generator.
#[derive(Debug, Clone, Copy)]
pub struct ToneGenerator {
    /// Frequency in Hz.
    pub frequency_hz: f64,
    /// Peak amplitude before fades (`1.0` = full scale).
    pub amplitude: f32,
}

impl ToneGenerator {
    /// Full-scale sine at `frequency_hz`.
    pub fn new(frequency_hz: f64) -> Self {
        Self {
            frequency_hz,
            amplitude: 1.0,
        }
    }

    /// Render `frames` mono samples at `sample_rate` with linear fades of
    /// [`fade_ms_for`] the segment duration at both ends.
    pub fn render(&self, frames: usize, sample_rate: u32) -> Vec<f32> {
        let step = 2.0 * std::f64::consts::PI * self.frequency_hz / sample_rate as f64;
        let mut samples: Vec<f32> = (0..frames)
            .map(|i| ((step * i as f64).sin() as f32) * self.amplitude)
            .collect();

        let duration_ms = (frames as u64 * 1_000) / sample_rate as u64;
        let fade_frames = fade_frames(fade_ms_for(duration_ms), sample_rate).min(frames);
        apply_fades(&mut samples, fade_frames);
        samples
    }
}

/// Frames covered by a fade of `fade_ms` at `sample_rate`.
pub fn fade_frames(fade_ms: u64, sample_rate: u32) -> usize {
    ((fade_ms as f64 / 1_000.0) * sample_rate as f64).round() as usize
}

/// Linear fade-in over the first `fade` samples and fade-out over the last.
///
/// The ramp runs from exactly `0.0` to exactly `1.0` (both end points
/// included), so the first and last sample of the buffer are silent.
pub fn apply_fades(samples: &mut [f32], fade: usize) {
    if fade == 0 || samples.is_empty() {
        return;
    }
    let n = samples.len();
    let fade = fade.min(n);
    for i in 0..fade {
        let gain = fade_gain(i, fade);
        samples[i] *= gain;
        samples[n - 1 - i] *= gain;
    }
}

/// Gain of the `i`-th fade-in sample for a ramp of `fade` samples.
pub fn fade_gain(i: usize, fade: usize) -> f32 {
    if fade <= 1 {
        return 0.0;
    }
    i as f32 / (fade - 1) as f32
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fade_is_quarter_of_short_segments() {
        assert_eq!(fade_ms_for(100), 25);
        assert_eq!(fade_ms_for(3), 0);
        assert_eq!(fade_ms_for(10_000), 50);
    }

    #[test]
    fn render_has_exact_length() {
        for frames in [0, 1, 17, 8_000, 44_101] {
            assert_eq!(ToneGenerator::new(440.0).render(frames, 44_100).len(), frames);
        }
    }

    #[test]
    fn fade_envelope_bounds_samples() {
        let rate = 8_000;
        let tone = ToneGenerator::new(1_000.0).render(8_000, rate);
        let fade = fade_frames(50, rate);
        for i in 0..fade {
            let env = fade_gain(i, fade) + 1e-6;
            assert!(tone[i].abs() <= env, "fade-in sample {i} exceeds envelope");
            assert!(tone[tone.len() - 1 - i].abs() <= env, "fade-out sample {i} exceeds envelope");
        }
        assert_eq!(tone[0], 0.0);
        assert_eq!(*tone.last().unwrap(), 0.0);
    }

    #[test]
    fn body_reaches_full_amplitude() {
        let tone = ToneGenerator::new(100.0).render(8_000, 8_000);
        let peak = tone.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
        assert!(peak > 0.99, "peak = {peak}");
    }

    #[test]
    fn apply_fades_on_tiny_buffer_does_not_panic() {
        let mut s = vec![1.0_f32; 3];
        apply_fades(&mut s, 10);
        assert_eq!(s[0], 0.0);
        assert_eq!(s[2], 0.0);
    }
}
