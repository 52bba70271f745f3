//! Loudness measurement and gain matching.
//!
//! [`LoudnessMatcher`] measures the RMS level of a buffer in dB relative to
//! full scale and applies a uniform linear gain so that a replacement segment
//! sits at the same perceived level as the audio it replaces.
//!
//! | Outcome | Meaning |
//! |---------|---------|
//! | [`GainOutcome::Applied`] | gain was computed and applied |
//! | [`GainOutcome::SkippedSilentReference`] | nothing to match against; buffer unchanged |
//! | [`GainOutcome::SkippedSilentSource`] | source is silent, no gain can lift it; unchanged |
//! | `Err(LoudnessError)` | gain was not finite; the caller decides whether to tolerate it |
//!
//! No limiter is applied: a large positive gain can push samples past full
//! scale.
//!
//! # Example
//!
//! ```rust
//! use sound_filter::audio::{AudioBuffer, Loudness, LoudnessMatcher};
//!
//! let matcher = LoudnessMatcher::default();
//! let quiet = AudioBuffer::mono(vec![0.05; 1_000], 8_000);
//! let loud = AudioBuffer::mono(vec![0.5; 1_000], 8_000);
//!
//! let target = matcher.measure(&loud);
//! let (matched, _) = matcher.match_gain(quiet, target).unwrap();
//! let Loudness::Dbfs(db) = matcher.measure(&matched) else { panic!() };
//! assert!((db - -6.02).abs() < 0.05);
//! ```

use thiserror::Error;

use super::buffer::AudioBuffer;

// ---------------------------------------------------------------------------
// Loudness
// ---------------------------------------------------------------------------

/// Measured level of a buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Loudness {
    /// Empty or all-zero buffer.
    Silent,
    /// RMS level in dBFS (`0.0` = full-scale square wave).
    Dbfs(f64),
}

impl Loudness {
    /// Returns `true` for [`Loudness::Silent`].
    pub fn is_silent(&self) -> bool {
        matches!(self, Loudness::Silent)
    }
}

// ---------------------------------------------------------------------------
// GainOutcome / LoudnessError
// ---------------------------------------------------------------------------

/// What [`LoudnessMatcher::match_gain`] did to the buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GainOutcome {
    /// A gain of `gain_db` decibels was applied.
    Applied { gain_db: f64 },
    /// The reference was silent; matching against silence is a no-op.
    SkippedSilentReference,
    /// The source was silent; it was returned unchanged.
    SkippedSilentSource,
}

/// Gain matching produced a value that cannot be applied.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LoudnessError {
    #[error("gain is not finite (source {source_db:.2} dBFS, reference {reference_db:.2} dBFS)")]
    NonFiniteGain { source_db: f64, reference_db: f64 },
}

// ---------------------------------------------------------------------------
// LoudnessMatcher
// ---------------------------------------------------------------------------

/// Measures and matches RMS loudness.
#[derive(Debug, Clone)]
pub struct LoudnessMatcher {
    /// RMS below this (linear) counts as silence.  Default: `0.0`, so only a
    /// truly all-zero buffer is silent.
    pub silence_floor: f64,
}

impl Default for LoudnessMatcher {
    fn default() -> Self {
        Self { silence_floor: 0.0 }
    }
}

impl LoudnessMatcher {
    /// RMS level of `buffer` across all interleaved samples.
    pub fn measure(&self, buffer: &AudioBuffer) -> Loudness {
        if buffer.samples.is_empty() {
            return Loudness::Silent;
        }

        let mean_sq = buffer
            .samples
            .iter()
            .map(|&s| (s as f64) * (s as f64))
            .sum::<f64>()
            / buffer.samples.len() as f64;
        let rms = mean_sq.sqrt();

        if rms <= self.silence_floor || rms == 0.0 {
            Loudness::Silent
        } else {
            Loudness::Dbfs(20.0 * rms.log10())
        }
    }

    /// Scale `source` uniformly so that its loudness matches `reference`.
    ///
    /// Returns the (possibly unchanged) buffer together with what was done.
    pub fn match_gain(
        &self,
        mut source: AudioBuffer,
        reference: Loudness,
    ) -> Result<(AudioBuffer, GainOutcome), LoudnessError> {
        let outcome = self.apply_matched_gain(&mut source, reference)?;
        Ok((source, outcome))
    }

    /// In-place variant of [`match_gain`](Self::match_gain).
    pub fn apply_matched_gain(
        &self,
        source: &mut AudioBuffer,
        reference: Loudness,
    ) -> Result<GainOutcome, LoudnessError> {
        let Loudness::Dbfs(reference_db) = reference else {
            return Ok(GainOutcome::SkippedSilentReference);
        };
        let Loudness::Dbfs(source_db) = self.measure(source) else {
            return Ok(GainOutcome::SkippedSilentSource);
        };

        let gain_db = reference_db - source_db;
        let gain = 10f64.powf(gain_db / 20.0);
        if !gain_db.is_finite() || !gain.is_finite() {
            return Err(LoudnessError::NonFiniteGain {
                source_db,
                reference_db,
            });
        }

        source.apply_gain(gain as f32);
        Ok(GainOutcome::Applied { gain_db })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(amplitude: f32, frames: usize) -> AudioBuffer {
        AudioBuffer::mono(vec![amplitude; frames], 16_000)
    }

    fn db(l: Loudness) -> f64 {
        match l {
            Loudness::Dbfs(v) => v,
            Loudness::Silent => panic!("expected a level, got silence"),
        }
    }

    #[test]
    fn full_scale_constant_is_zero_dbfs() {
        let m = LoudnessMatcher::default();
        assert!(db(m.measure(&constant(1.0, 100))).abs() < 1e-9);
    }

    #[test]
    fn half_scale_is_minus_six_db() {
        let m = LoudnessMatcher::default();
        assert!((db(m.measure(&constant(0.5, 100))) + 6.0206).abs() < 1e-3);
    }

    #[test]
    fn empty_and_zero_buffers_are_silent() {
        let m = LoudnessMatcher::default();
        assert_eq!(m.measure(&constant(0.0, 0)), Loudness::Silent);
        assert_eq!(m.measure(&constant(0.0, 500)), Loudness::Silent);
    }

    #[test]
    fn match_gain_hits_reference() {
        let m = LoudnessMatcher::default();
        let reference = m.measure(&constant(0.3, 400));
        let (out, outcome) = m.match_gain(constant(0.01, 400), reference).unwrap();
        assert!(matches!(outcome, GainOutcome::Applied { .. }));
        assert!((db(m.measure(&out)) - db(reference)).abs() < 1e-3);
    }

    #[test]
    fn silent_reference_is_a_no_op() {
        let m = LoudnessMatcher::default();
        let src = constant(0.2, 100);
        let (out, outcome) = m.match_gain(src.clone(), Loudness::Silent).unwrap();
        assert_eq!(outcome, GainOutcome::SkippedSilentReference);
        assert_eq!(out, src);
    }

    #[test]
    fn silent_source_is_left_alone() {
        let m = LoudnessMatcher::default();
        let (out, outcome) = m.match_gain(constant(0.0, 100), Loudness::Dbfs(-12.0)).unwrap();
        assert_eq!(outcome, GainOutcome::SkippedSilentSource);
        assert!(out.samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn infinite_reference_is_an_error() {
        let m = LoudnessMatcher::default();
        let err = m
            .match_gain(constant(0.2, 100), Loudness::Dbfs(f64::INFINITY))
            .unwrap_err();
        assert!(matches!(err, LoudnessError::NonFiniteGain { .. }));
    }

    #[test]
    fn silence_floor_treats_hiss_as_silent() {
        let m = LoudnessMatcher { silence_floor: 1e-3 };
        assert!(m.measure(&constant(1e-4, 100)).is_silent());
    }
}
