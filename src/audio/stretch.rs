//! Constant-pitch time stretching.
//!
//! [`Wsola`] implements waveform-similarity overlap-add: the output is built
//! from Hann-windowed frames laid down at a fixed synthesis hop, while the
//! analysis position advances by `hop × factor`.  Before each frame is
//! placed, the analysis position is nudged within a small search window to
//! the offset whose waveform best continues the previous frame, which keeps
//! periodic signals phase-coherent and therefore preserves pitch.
//!
//! ```text
//! input   |----frame k-1----|
//!                  |~~~~ natural continuation ~~~~|
//!              <-- search ±10 ms -->
//!                    |----frame k----|          (best match)
//!
//! output  |----frame k-1----|
//!                  |----frame k----|            (hop = frame / 2)
//! ```
//!
//! The similarity search runs on the mono downmix; the chosen offset is
//! applied to every channel so the stereo image stays intact.

use super::buffer::AudioBuffer;
use super::resample::downmix;

/// Changes the duration of a buffer without changing its pitch.
///
/// `factor > 1.0` shortens, `factor < 1.0` lengthens.  The output has
/// approximately `round(frames / factor)` frames and the input's sample
/// rate, channel count and format.
pub trait TimeStretch: Send + Sync {
    fn stretch(&self, buffer: &AudioBuffer, factor: f64) -> AudioBuffer;
}

// ---------------------------------------------------------------------------
// Wsola
// ---------------------------------------------------------------------------

/// Waveform-similarity overlap-add time stretcher.
#[derive(Debug, Clone)]
pub struct Wsola {
    /// Analysis/synthesis frame length in milliseconds.
    pub frame_ms: f64,
    /// Half-width of the similarity search in milliseconds.
    pub search_ms: f64,
}

impl Default for Wsola {
    fn default() -> Self {
        Self {
            frame_ms: 40.0,
            search_ms: 10.0,
        }
    }
}

impl TimeStretch for Wsola {
    fn stretch(&self, buffer: &AudioBuffer, factor: f64) -> AudioBuffer {
        if buffer.is_empty() || !factor.is_finite() || factor <= 0.0 {
            return buffer.clone();
        }

        let in_frames = buffer.frames();
        let out_frames = ((in_frames as f64 / factor).round() as usize).max(1);
        if out_frames == in_frames {
            return buffer.clone();
        }

        let rate = buffer.sample_rate as f64;
        // Even frame length so the 50 % hop is exact.
        let frame_len = (((self.frame_ms * rate / 1_000.0).round() as usize) & !1).max(2);
        if in_frames < frame_len {
            log::debug!(
                "stretch: {in_frames} frames shorter than one analysis frame, interpolating"
            );
            return interpolate_length(buffer, out_frames);
        }

        let hop = frame_len / 2;
        let search = (self.search_ms * rate / 1_000.0).round() as usize;
        let window = hann(frame_len);
        let guide = downmix(&buffer.samples, buffer.channels);
        let input = buffer.to_planar();

        let max_start = in_frames - frame_len;
        let span = out_frames + frame_len;
        let mut output = vec![vec![0.0_f32; span]; input.len()];
        let mut norm = vec![0.0_f32; span];

        let mut prev_start: Option<usize> = None;
        let mut k = 0usize;
        while k * hop < out_frames {
            let nominal = ((k * hop) as f64 * factor).round() as usize;
            let start = match prev_start {
                None => nominal.min(max_start),
                Some(prev) => best_offset(&guide, prev + hop, nominal, search, hop, max_start),
            };

            let dest = k * hop;
            for (ch, out) in output.iter_mut().enumerate() {
                let src = &input[ch][start..start + frame_len];
                for (i, (&s, &w)) in src.iter().zip(&window).enumerate() {
                    out[dest + i] += s * w;
                }
            }
            for (i, &w) in window.iter().enumerate() {
                norm[dest + i] += w;
            }

            prev_start = Some(start);
            k += 1;
        }

        for out in output.iter_mut() {
            for (s, &n) in out.iter_mut().zip(&norm) {
                if n > 1e-9 {
                    *s /= n;
                }
            }
            out.truncate(out_frames);
        }

        AudioBuffer::from_planar(&output, buffer.sample_rate, buffer.format)
    }
}

/// Hann window offset by half a sample so no coefficient is exactly zero;
/// consecutive windows at 50 % overlap still sum to one.
fn hann(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * (i as f64 + 0.5) / len as f64;
            (0.5 - 0.5 * phase.cos()) as f32
        })
        .collect()
}

/// Start position in `[nominal - search, nominal + search]` whose first
/// `overlap` samples correlate best with the natural continuation at
/// `natural`.
fn best_offset(
    guide: &[f32],
    natural: usize,
    nominal: usize,
    search: usize,
    overlap: usize,
    max_start: usize,
) -> usize {
    let lo = nominal.saturating_sub(search).min(max_start);
    let hi = (nominal + search).min(max_start);
    let natural = natural.min(guide.len().saturating_sub(overlap));
    let target = &guide[natural..natural + overlap];

    let mut best = lo;
    let mut best_score = f64::NEG_INFINITY;
    for cand in lo..=hi {
        let seg = &guide[cand..cand + overlap];
        let mut dot = 0.0_f64;
        let mut energy = 0.0_f64;
        for (&a, &b) in seg.iter().zip(target) {
            dot += a as f64 * b as f64;
            energy += a as f64 * a as f64;
        }
        let score = if energy > 0.0 { dot / energy.sqrt() } else { 0.0 };
        if score > best_score {
            best_score = score;
            best = cand;
        }
    }
    best
}

/// Resize by linear interpolation of every channel to `out_frames` frames.
fn interpolate_length(buffer: &AudioBuffer, out_frames: usize) -> AudioBuffer {
    let planar: Vec<Vec<f32>> = buffer
        .to_planar()
        .into_iter()
        .map(|ch| {
            let last = ch.len().saturating_sub(1);
            let step = if out_frames > 1 {
                last as f64 / (out_frames - 1) as f64
            } else {
                0.0
            };
            (0..out_frames)
                .map(|i| {
                    let pos = i as f64 * step;
                    let idx = (pos.floor() as usize).min(last);
                    let next = (idx + 1).min(last);
                    let frac = (pos - idx as f64) as f32;
                    ch[idx] + (ch[next] - ch[idx]) * frac
                })
                .collect()
        })
        .collect();
    AudioBuffer::from_planar(&planar, buffer.sample_rate, buffer.format)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
