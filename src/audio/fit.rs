//! Fit a buffer to a target duration.
//!
//! ```text
//! within tolerance? ──yes──► unchanged
//!        │ no
//!        ▼
//! constant-pitch stretch (factor = current / target)
//!        │
//!        ▼
//! still outside tolerance? ──yes──► trim tail / pad with silence
//! ```

use thiserror::Error;

use super::buffer::AudioBuffer;
use super::stretch::{TimeStretch, Wsola};

/// Default acceptable deviation from the target duration.
pub const DEFAULT_TOLERANCE_MS: f64 = 10.0;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FitError {
    #[error("target duration must be positive, got {0} ms")]
    InvalidTarget(f64),

    #[error("cannot fit an empty buffer to {target_ms} ms")]
    EmptyInput { target_ms: f64 },
}

/// Brings a buffer to a requested duration without changing its pitch.
pub struct DurationFitter {
    pub tolerance_ms: f64,
    stretcher: Box<dyn TimeStretch>,
}

impl Default for DurationFitter {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE_MS, Box::new(Wsola::default()))
    }
}

impl std::fmt::Debug for DurationFitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurationFitter")
            .field("tolerance_ms", &self.tolerance_ms)
            .finish_non_exhaustive()
    }
}

impl DurationFitter {
    pub fn new(tolerance_ms: f64, stretcher: Box<dyn TimeStretch>) -> Self {
        Self {
            tolerance_ms: tolerance_ms.max(0.0),
            stretcher,
        }
    }

    /// WSOLA stretcher with a custom tolerance.
    pub fn with_tolerance(tolerance_ms: f64) -> Self {
        Self::new(tolerance_ms, Box::new(Wsola::default()))
    }

    /// Fit `buffer` to `target_ms` milliseconds, give or take the tolerance.
    ///
    /// The result is never empty.  When the stretch alone misses the target,
    /// the tail is trimmed or padded with digital silence so the buffer lands
    /// on exactly `round(target_ms × sample_rate / 1000)` frames.
    pub fn fit(&self, buffer: AudioBuffer, target_ms: f64) -> Result<AudioBuffer, FitError> {
        if !target_ms.is_finite() || target_ms <= 0.0 {
            return Err(FitError::InvalidTarget(target_ms));
        }
        if buffer.is_empty() {
            return Err(FitError::EmptyInput { target_ms });
        }

        let current_ms = buffer.duration_ms();
        if (current_ms - target_ms).abs() <= self.tolerance_ms {
            return Ok(buffer);
        }

        let factor = current_ms / target_ms;
        log::debug!("fit: {current_ms:.1} ms → {target_ms:.1} ms (factor {factor:.3})");
        let mut stretched = self.stretcher.stretch(&buffer, factor);

        if stretched.is_empty() || (stretched.duration_ms() - target_ms).abs() > self.tolerance_ms {
            let frames = buffer.frames_for_ms(target_ms).max(1);
            stretched.resize_frames(frames);
        }
        Ok(stretched)
    }

    /// Fit `buffer` to exactly `target_frames` frames.
    ///
    /// Stretches only when the mismatch exceeds the tolerance, then always
    /// reconciles the length exactly so the result can be spliced
    /// sample-accurately.
    pub fn fit_to_frames(&self, buffer: AudioBuffer, target_frames: usize) -> Result<AudioBuffer, FitError> {
        let target_ms = target_frames as f64 * 1_000.0 / buffer.sample_rate as f64;
        if target_frames == 0 {
            return Err(FitError::InvalidTarget(0.0));
        }
        if buffer.is_empty() {
            return Err(FitError::EmptyInput { target_ms });
        }
        if buffer.frames() == target_frames {
            return Ok(buffer);
        }

        let mut out = if (buffer.duration_ms() - target_ms).abs() <= self.tolerance_ms {
            buffer
        } else {
            let factor = buffer.frames() as f64 / target_frames as f64;
            self.stretcher.stretch(&buffer, factor)
        };
        out.resize_frames(target_frames);
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Records calls and returns a buffer of a fixed (wrong) length.
    struct CountingStretch {
        calls: Arc<AtomicUsize>,
        output_frames: Option<usize>,
    }

    impl TimeStretch for CountingStretch {
        fn stretch(&self, buffer: &AudioBuffer, factor: f64) -> AudioBuffer {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let frames = self
                .output_frames
                .unwrap_or_else(|| (buffer.frames() as f64 / factor).round() as usize);
            let mut out = buffer.clone();
            out.resize_frames(frames);
            out
        }
    }

    fn counting(output_frames: Option<usize>) -> (DurationFitter, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let fitter = DurationFitter::new(
            10.0,
            Box::new(CountingStretch {
                calls: Arc::clone(&calls),
                output_frames,
            }),
        );
        (fitter, calls)
    }

    fn tone(ms: usize) -> AudioBuffer {
        let frames = ms * 16;
        AudioBuffer::mono(
            (0..frames).map(|i| (i as f32 * 0.05).sin() * 0.3).collect(),
            16_000,
        )
    }

    #[test]
    fn within_tolerance_is_untouched() {
        let (fitter, calls) = counting(None);
        let buf = tone(1_005);
        let out = fitter.fit(buf.clone(), 1_000.0).unwrap();
        assert_eq!(out, buf);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stretches_when_outside_tolerance() {
        let (fitter, calls) = counting(None);
        let out = fitter.fit(tone(2_000), 1_000.0).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!((out.duration_ms() - 1_000.0).abs() <= 10.0);
    }

    #[test]
    fn reconciles_when_stretch_misses() {
        let (fitter, _) = counting(Some(123));
        let out = fitter.fit(tone(2_000), 1_000.0).unwrap();
        assert_eq!(out.frames(), 16_000);
        // Padding is digital silence.
        assert!(out.samples[123..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn zero_target_and_empty_input_are_errors() {
        let fitter = DurationFitter::default();
        assert_eq!(
            fitter.fit(tone(100), 0.0).unwrap_err(),
            FitError::InvalidTarget(0.0)
        );
        assert!(matches!(
            fitter.fit(AudioBuffer::mono(vec![], 16_000), 100.0),
            Err(FitError::EmptyInput { .. })
        ));
        assert!(fitter.fit_to_frames(tone(100), 0).is_err());
    }

    #[test]
    fn fit_to_frames_is_exact_with_wsola() {
        let fitter = DurationFitter::default();
        for target in [7_999, 16_000, 24_321] {
            let out = fitter.fit_to_frames(tone(1_000), target).unwrap();
            assert_eq!(out.frames(), target);
        }
    }

    #[test]
    fn tiny_target_is_never_empty() {
        let fitter = DurationFitter::default();
        let out = fitter.fit(tone(500), 0.01).unwrap();
        assert!(!out.is_empty());
    }
}
