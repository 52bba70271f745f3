//! Owned, interleaved PCM audio buffer.
//!
//! [`AudioBuffer`] is the unit every editing stage passes around.  Samples
//! are stored as interleaved `f32` in `[-1.0, 1.0]` regardless of the source
//! container; [`SampleFormat`] remembers the original quantisation so that
//! generated material can be snapped to the same grid and re-encoded at the
//! same bit depth.
//!
//! All time → offset conversions go through [`AudioBuffer::frame_at_secs`]
//! and [`AudioBuffer::frames_for_ms`], which round to the nearest frame.
//!
//! # Example
//!
//! ```rust
//! use sound_filter::audio::{AudioBuffer, SampleFormat};
//!
//! let buf = AudioBuffer::silence(8_000, 8_000, 2, SampleFormat::PCM16);
//! assert_eq!(buf.frames(), 8_000);
//! assert_eq!(buf.samples.len(), 16_000);
//! assert!((buf.duration_secs() - 1.0).abs() < 1e-9);
//! assert_eq!(buf.frame_at_secs(0.25), 2_000);
//! ```

// ---------------------------------------------------------------------------
// SampleFormat
// ---------------------------------------------------------------------------

/// Quantisation of the samples as they were (or will be) stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// Signed integer PCM with the given bit depth (8, 16, 24 or 32).
    Int { bits: u16 },
    /// 32-bit IEEE float.
    Float,
}

impl SampleFormat {
    /// 16-bit signed PCM, the most common container format.
    pub const PCM16: SampleFormat = SampleFormat::Int { bits: 16 };

    /// Largest positive integer value for integer formats.
    fn int_max(bits: u16) -> f32 {
        ((1_i64 << (bits.clamp(2, 32) - 1)) - 1) as f32
    }

    /// Snap a normalised sample onto this format's grid.
    ///
    /// Float samples pass through unchanged.  Integer samples are scaled to
    /// the full-scale integer range, rounded, clamped and scaled back.
    pub fn quantize(self, sample: f32) -> f32 {
        match self {
            SampleFormat::Float => sample,
            SampleFormat::Int { bits } => {
                let max = Self::int_max(bits);
                let q = (sample * max).round().clamp(-max - 1.0, max);
                q / max
            }
        }
    }

    /// Convert a normalised sample to an `i32` at this format's bit depth.
    ///
    /// Only meaningful for [`SampleFormat::Int`]; float formats return the
    /// 32-bit integer scaling.
    pub fn to_int(self, sample: f32) -> i32 {
        let bits = match self {
            SampleFormat::Int { bits } => bits,
            SampleFormat::Float => 32,
        };
        let max = Self::int_max(bits);
        (sample.clamp(-1.0, 1.0) * max).round() as i32
    }

    /// Convert an integer sample at this bit depth to a normalised `f32`.
    pub fn from_int(self, value: i32) -> f32 {
        let bits = match self {
            SampleFormat::Int { bits } => bits,
            SampleFormat::Float => 32,
        };
        value as f32 / Self::int_max(bits)
    }
}

impl Default for SampleFormat {
    fn default() -> Self {
        SampleFormat::PCM16
    }
}

// ---------------------------------------------------------------------------
// AudioBuffer
// ---------------------------------------------------------------------------

/// Interleaved multi-channel audio, exclusively owned by whichever stage is
/// currently working on it.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Interleaved samples, `frames() * channels` long.
    pub samples: Vec<f32>,
    /// Frames per second.
    pub sample_rate: u32,
    /// Number of interleaved channels (≥ 1).
    pub channels: u16,
    /// Quantisation of the source material.
    pub format: SampleFormat,
}

impl AudioBuffer {
    /// Wrap interleaved samples.
    ///
    /// # Panics
    ///
    /// Panics if `channels == 0` or `sample_rate == 0`.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16, format: SampleFormat) -> Self {
        assert!(channels > 0, "AudioBuffer channels must be > 0");
        assert!(sample_rate > 0, "AudioBuffer sample_rate must be > 0");
        Self {
            samples,
            sample_rate,
            channels,
            format,
        }
    }

    /// Single-channel buffer.
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(samples, sample_rate, 1, SampleFormat::Float)
    }

    /// Digital silence of `frames` frames.
    pub fn silence(frames: usize, sample_rate: u32, channels: u16, format: SampleFormat) -> Self {
        Self::new(
            vec![0.0; frames * channels as usize],
            sample_rate,
            channels,
            format,
        )
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Returns `true` when the buffer holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Duration in milliseconds (fractional).
    pub fn duration_ms(&self) -> f64 {
        self.duration_secs() * 1000.0
    }

    /// Frame offset for a time in seconds: `round(seconds * sample_rate)`.
    ///
    /// Negative times map to frame 0.
    pub fn frame_at_secs(&self, seconds: f64) -> usize {
        secs_to_frames(seconds, self.sample_rate)
    }

    /// Frame count for a duration in milliseconds.
    pub fn frames_for_ms(&self, ms: f64) -> usize {
        secs_to_frames(ms / 1000.0, self.sample_rate)
    }

    /// Copy of frames `[start, end)`; bounds are clamped to the buffer.
    pub fn slice_frames(&self, start: usize, end: usize) -> AudioBuffer {
        let frames = self.frames();
        let end = end.min(frames);
        let start = start.min(end);
        let ch = self.channels as usize;
        Self {
            samples: self.samples[start * ch..end * ch].to_vec(),
            sample_rate: self.sample_rate,
            channels: self.channels,
            format: self.format,
        }
    }

    /// Append `other`'s frames.  Both buffers must share the same layout.
    ///
    /// # Panics
    ///
    /// Panics on a sample-rate or channel-count mismatch.
    pub fn append(&mut self, other: &AudioBuffer) {
        assert_eq!(self.sample_rate, other.sample_rate, "sample rate mismatch");
        assert_eq!(self.channels, other.channels, "channel count mismatch");
        self.samples.extend_from_slice(&other.samples);
    }

    /// Trim the tail or append silence so the buffer is exactly `frames`
    /// frames long.
    pub fn resize_frames(&mut self, frames: usize) {
        self.samples.resize(frames * self.channels as usize, 0.0);
    }

    /// Multiply every sample by `gain` (linear).  No limiting is applied.
    pub fn apply_gain(&mut self, gain: f32) {
        for s in &mut self.samples {
            *s *= gain;
        }
    }

    /// Snap every sample onto the grid of [`Self::format`].
    pub fn quantize(&mut self) {
        let format = self.format;
        for s in &mut self.samples {
            *s = format.quantize(*s);
        }
    }

    /// Samples of a single channel, de-interleaved.
    pub fn channel(&self, index: usize) -> Vec<f32> {
        let ch = self.channels as usize;
        self.samples
            .iter()
            .skip(index)
            .step_by(ch)
            .copied()
            .collect()
    }

    /// Build a buffer from planar (one `Vec` per channel) data.
    ///
    /// Channels shorter than the longest are padded with silence.
    pub fn from_planar(planar: &[Vec<f32>], sample_rate: u32, format: SampleFormat) -> Self {
        let channels = planar.len().max(1);
        let frames = planar.iter().map(Vec::len).max().unwrap_or(0);
        let mut samples = Vec::with_capacity(frames * channels);
        for i in 0..frames {
            for ch in 0..channels {
                samples.push(planar.get(ch).and_then(|c| c.get(i)).copied().unwrap_or(0.0));
            }
        }
        Self::new(samples, sample_rate, channels as u16, format)
    }

    /// Split into planar channel vectors.
    pub fn to_planar(&self) -> Vec<Vec<f32>> {
        (0..self.channels as usize).map(|c| self.channel(c)).collect()
    }
}

/// `round(seconds * sample_rate)`, clamped at zero.
pub fn secs_to_frames(seconds: f64, sample_rate: u32) -> usize {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * sample_rate as f64).round() as usize
}

/// Splice `replacement` into `original` over frames `[start, end)`.
///
/// Returns `original[..start] ++ replacement ++ original[end..]`; `start`
/// and `end` are clamped to the original length.  Pure: neither input is
/// modified.
///
/// # Panics
///
/// Panics if `replacement` does not share the original's sample rate and
/// channel count.
pub fn splice(original: &AudioBuffer, start: usize, end: usize, replacement: &AudioBuffer) -> AudioBuffer {
    let frames = original.frames();
    let start = start.min(frames);
    let end = end.clamp(start, frames);

    let mut out = original.slice_frames(0, start);
    out.samples
        .reserve(replacement.samples.len() + (frames - end) * original.channels as usize);
    out.append(replacement);
    out.append(&original.slice_frames(end, frames));
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize, channels: u16) -> AudioBuffer {
        let samples = (0..frames * channels as usize)
            .map(|i| i as f32 / 1_000.0)
            .collect();
        AudioBuffer::new(samples, 1_000, channels, SampleFormat::Float)
    }

    #[test]
    fn frame_conversion_rounds_to_nearest() {
        let buf = AudioBuffer::silence(0, 44_100, 1, SampleFormat::PCM16);
        assert_eq!(buf.frame_at_secs(1.0), 44_100);
        // 0.00001 s * 44100 = 0.441 → 0
        assert_eq!(buf.frame_at_secs(0.000_01), 0);
        // 0.00002 s * 44100 = 0.882 → 1
        assert_eq!(buf.frame_at_secs(0.000_02), 1);
        assert_eq!(buf.frame_at_secs(-3.0), 0);
        assert_eq!(buf.frames_for_ms(10.0), 441);
    }

    #[test]
    fn slice_clamps_bounds() {
        let buf = ramp(10, 2);
        assert_eq!(buf.slice_frames(8, 100).frames(), 2);
        assert_eq!(buf.slice_frames(12, 20).frames(), 0);
        let mid = buf.slice_frames(2, 4);
        assert_eq!(mid.samples, buf.samples[4..8].to_vec());
    }

    #[test]
    fn splice_replaces_window() {
        let original = ramp(10, 1);
        let replacement = AudioBuffer::silence(3, 1_000, 1, SampleFormat::Float);
        let out = splice(&original, 2, 5, &replacement);
        assert_eq!(out.frames(), 10);
        assert_eq!(&out.samples[..2], &original.samples[..2]);
        assert!(out.samples[2..5].iter().all(|&s| s == 0.0));
        assert_eq!(&out.samples[5..], &original.samples[5..]);
    }

    #[test]
    fn splice_longer_replacement_grows_buffer() {
        let original = ramp(10, 1);
        let replacement = AudioBuffer::silence(6, 1_000, 1, SampleFormat::Float);
        let out = splice(&original, 8, 10, &replacement);
        assert_eq!(out.frames(), 14);
    }

    #[test]
    fn resize_pads_and_trims() {
        let mut buf = ramp(4, 2);
        buf.resize_frames(6);
        assert_eq!(buf.frames(), 6);
        assert!(buf.samples[8..].iter().all(|&s| s == 0.0));
        buf.resize_frames(1);
        assert_eq!(buf.samples.len(), 2);
    }

    #[test]
    fn planar_round_trip_preserves_interleaving() {
        let buf = ramp(5, 3);
        let planar = buf.to_planar();
        assert_eq!(planar.len(), 3);
        assert_eq!(planar[1][0], buf.samples[1]);
        let back = AudioBuffer::from_planar(&planar, 1_000, SampleFormat::Float);
        assert_eq!(back, buf);
    }

    #[test]
    fn quantize_pcm16_snaps_to_grid() {
        let q = SampleFormat::PCM16.quantize(0.123_456);
        let steps = q * 32_767.0;
        assert!((steps - steps.round()).abs() < 1e-3, "not on grid: {steps}");
        assert_eq!(SampleFormat::Float.quantize(0.123_456), 0.123_456);
    }

    #[test]
    fn int_conversion_is_symmetric() {
        let fmt = SampleFormat::Int { bits: 24 };
        let v = fmt.to_int(0.5);
        assert!((fmt.from_int(v) - 0.5).abs() < 1e-6);
    }

    #[test]
    #[should_panic(expected = "AudioBuffer channels must be > 0")]
    fn zero_channels_panics() {
        let _ = AudioBuffer::new(Vec::new(), 8_000, 0, SampleFormat::PCM16);
    }
}
