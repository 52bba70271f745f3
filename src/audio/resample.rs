//! Sample-rate conversion and channel mapping.
//!
//! Replacement material (synthesised speech in particular) rarely arrives in
//! the layout of the recording it is spliced into.  This module provides the
//! conversion steps:
//!
//! 1. [`downmix`]: average any number of interleaved channels to mono.
//! 2. [`resample_linear`]: cheap linear-interpolation resampler, used for
//!    analysis paths and for clips too short for the sinc resampler.
//! 3. [`resample`]: band-limited sinc resampling of a whole
//!    [`AudioBuffer`] via `rubato` (`SincFixedIn` + `BlackmanHarris2`).
//! 4. [`remap_channels`] / [`conform`]: match channel count, rate and
//!    sample format of a reference buffer.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use thiserror::Error;

use super::buffer::AudioBuffer;

/// Frames handed to the sinc resampler per call.
const CHUNK_FRAMES: usize = 1_024;

/// Inputs shorter than this use linear interpolation; the sinc filter's
/// delay would dominate the output otherwise.
const MIN_SINC_FRAMES: usize = 512;

// ---------------------------------------------------------------------------
// ResampleError
// ---------------------------------------------------------------------------

/// Failure inside the `rubato` resampler.
#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("could not build resampler ({from} Hz → {to} Hz): {message}")]
    Construction { from: u32, to: u32, message: String },

    #[error("resampling failed: {0}")]
    Process(String),
}

// ---------------------------------------------------------------------------
// downmix
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all channels.
///
/// The output length is `samples.len() / channels`.
///
/// * If `channels == 1` the input slice is returned as an owned `Vec`.
/// * If `channels == 0` an empty vector is returned.
///
/// # Example
///
/// ```rust
/// use sound_filter::audio::downmix;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, -0.2]; // L R L R
/// let mono = downmix(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[0] - 0.0).abs() < 1e-6);
/// ```
pub fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// resample_linear
// ---------------------------------------------------------------------------

/// Resample mono `samples` from `source_rate` to `target_rate` Hz using
/// linear interpolation.
///
/// * Equal rates → the input is cloned unchanged.
/// * Empty input → empty output.
///
/// The output length is `ceil(samples.len() * target_rate / source_rate)`.
///
/// ```rust
/// use sound_filter::audio::resample_linear;
///
/// let hi = vec![0.5_f32; 480];
/// let lo = resample_linear(&hi, 48_000, 16_000);
/// assert_eq!(lo.len(), 160);
/// ```
pub fn resample_linear(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate || source_rate == 0 {
        return samples.to_vec();
    }

    if samples.is_empty() {
        return Vec::new();
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let output_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos as usize;
        let frac = src_pos - idx as f64;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac as f32) + samples[idx + 1] * frac as f32
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}

// ---------------------------------------------------------------------------
// resample (rubato)
// ---------------------------------------------------------------------------

/// Resample every channel of `buffer` to `target_rate`.
///
/// The result holds exactly `round(frames * target_rate / source_rate)`
/// frames: the sinc filter's output delay is removed and the tail flushed.
pub fn resample(buffer: &AudioBuffer, target_rate: u32) -> Result<AudioBuffer, ResampleError> {
    if buffer.sample_rate == target_rate {
        return Ok(buffer.clone());
    }

    let ratio = target_rate as f64 / buffer.sample_rate as f64;
    let frames = buffer.frames();
    let expected = (frames as f64 * ratio).round() as usize;

    if frames == 0 {
        return Ok(AudioBuffer::silence(0, target_rate, buffer.channels, buffer.format));
    }

    let planar = buffer.to_planar();

    if frames < MIN_SINC_FRAMES {
        let out: Vec<Vec<f32>> = planar
            .iter()
            .map(|ch| {
                let mut v = resample_linear(ch, buffer.sample_rate, target_rate);
                v.resize(expected, 0.0);
                v
            })
            .collect();
        return Ok(AudioBuffer::from_planar(&out, target_rate, buffer.format));
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.1, params, CHUNK_FRAMES, planar.len())
        .map_err(|e| ResampleError::Construction {
            from: buffer.sample_rate,
            to: target_rate,
            message: e.to_string(),
        })?;

    let delay = resampler.output_delay();
    let mut out: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); planar.len()];

    let mut pos = 0;
    while pos < frames {
        let need = resampler.input_frames_next();
        let end = (pos + need).min(frames);
        let chunk: Vec<&[f32]> = planar.iter().map(|c| &c[pos..end]).collect();

        let produced = if end - pos == need {
            resampler.process(&chunk, None)
        } else {
            resampler.process_partial(Some(chunk.as_slice()), None)
        }
        .map_err(|e| ResampleError::Process(e.to_string()))?;

        for (dst, src) in out.iter_mut().zip(produced) {
            dst.extend(src);
        }
        pos = end;
    }

    // Flush the filter until the delayed tail has been emitted.
    let mut flushes = 0;
    while out[0].len() < expected + delay && flushes < 8 {
        let produced = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| ResampleError::Process(e.to_string()))?;
        for (dst, src) in out.iter_mut().zip(produced) {
            dst.extend(src);
        }
        flushes += 1;
    }

    for ch in &mut out {
        let skip = delay.min(ch.len());
        ch.drain(..skip);
        ch.resize(expected, 0.0);
    }

    Ok(AudioBuffer::from_planar(&out, target_rate, buffer.format))
}

// ---------------------------------------------------------------------------
// remap_channels / conform
// ---------------------------------------------------------------------------

/// Change the channel count of `buffer`.
///
/// Mono sources are replicated to every output channel; anything else is
/// downmixed to mono first.
pub fn remap_channels(buffer: &AudioBuffer, channels: u16) -> AudioBuffer {
    if buffer.channels == channels {
        return buffer.clone();
    }

    let mono = downmix(&buffer.samples, buffer.channels);
    if channels == 1 {
        return AudioBuffer::new(mono, buffer.sample_rate, 1, buffer.format);
    }

    let n = channels as usize;
    let mut samples = Vec::with_capacity(mono.len() * n);
    for s in mono {
        samples.extend(std::iter::repeat(s).take(n));
    }
    AudioBuffer::new(samples, buffer.sample_rate, channels, buffer.format)
}

/// Bring `buffer` into the layout of `reference`: same sample rate, channel
/// count and sample format (samples are quantised to that format).
pub fn conform(buffer: &AudioBuffer, reference: &AudioBuffer) -> Result<AudioBuffer, ResampleError> {
    let resampled = resample(buffer, reference.sample_rate)?;
    let mut out = remap_channels(&resampled, reference.channels);
    out.format = reference.format;
    out.quantize();
    Ok(out)
}

/// Downmix and linearly resample `buffer` to mono at `target_rate`.
///
/// Used by analysis code (gender classification, transcription) that only
/// needs a mono signal at a fixed rate.
pub fn to_mono_at(buffer: &AudioBuffer, target_rate: u32) -> Vec<f32> {
    let mono = downmix(&buffer.samples, buffer.channels);
    resample_linear(&mono, buffer.sample_rate, target_rate)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SampleFormat;

    fn sine(frames: usize, rate: u32, freq: f32) -> Vec<f32> {
        (0..frames)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin() * 0.5)
            .collect()
    }

    // ---- downmix -----------------------------------------------------------

    #[test]
    fn downmix_already_mono() {
        let input = vec![0.1_f32, 0.2, 0.3];
        assert_eq!(downmix(&input, 1), input);
    }

    #[test]
    fn downmix_two_channel() {
        let out = downmix(&[1.0_f32, -1.0, 0.5, 0.5], 2);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.0).abs() < 1e-6);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn downmix_zero_channels() {
        assert!(downmix(&[1.0_f32, 2.0], 0).is_empty());
    }

    // ---- resample_linear ---------------------------------------------------

    #[test]
    fn linear_same_rate_is_noop() {
        let input: Vec<f32> = (0..160).map(|i| i as f32 / 160.0).collect();
        assert_eq!(resample_linear(&input, 16_000, 16_000), input);
    }

    #[test]
    fn linear_empty_input() {
        assert!(resample_linear(&[], 48_000, 16_000).is_empty());
    }

    #[test]
    fn linear_upsample_doubles_length() {
        let out = resample_linear(&vec![0.0_f32; 80], 8_000, 16_000);
        assert_eq!(out.len(), 160);
    }

    #[test]
    fn linear_constant_signal_preserves_amplitude() {
        let out = resample_linear(&vec![0.5_f32; 480], 48_000, 16_000);
        for &s in &out {
            assert!((s - 0.5).abs() < 1e-5, "amplitude drift: {s}");
        }
    }

    // ---- resample (sinc) ---------------------------------------------------

    #[test]
    fn sinc_output_length_is_exact() {
        let buf = AudioBuffer::mono(sine(24_000, 24_000, 220.0), 24_000);
        let out = resample(&buf, 44_100).unwrap();
        assert_eq!(out.sample_rate, 44_100);
        assert_eq!(out.frames(), 44_100);
    }

    #[test]
    fn sinc_preserves_stereo_layout() {
        let mono = sine(4_800, 48_000, 440.0);
        let mut samples = Vec::new();
        for s in &mono {
            samples.push(*s);
            samples.push(-*s);
        }
        let buf = AudioBuffer::new(samples, 48_000, 2, SampleFormat::Float);
        let out = resample(&buf, 16_000).unwrap();
        assert_eq!(out.channels, 2);
        assert_eq!(out.frames(), 1_600);
    }

    #[test]
    fn sinc_keeps_energy_of_tone() {
        let buf = AudioBuffer::mono(sine(16_000, 16_000, 300.0), 16_000);
        let out = resample(&buf, 22_050).unwrap();
        // Ignore edges; the body of a 0.5-amplitude sine has RMS ≈ 0.354.
        let body = &out.samples[2_000..out.samples.len() - 2_000];
        let rms = (body.iter().map(|s| s * s).sum::<f32>() / body.len() as f32).sqrt();
        assert!((rms - 0.354).abs() < 0.03, "rms = {rms}");
    }

    #[test]
    fn short_clip_uses_linear_path() {
        let buf = AudioBuffer::mono(vec![0.25; 100], 8_000);
        let out = resample(&buf, 16_000).unwrap();
        assert_eq!(out.frames(), 200);
    }

    // ---- remap / conform ---------------------------------------------------

    #[test]
    fn mono_is_replicated_to_stereo() {
        let buf = AudioBuffer::mono(vec![0.1, 0.2], 8_000);
        let out = remap_channels(&buf, 2);
        assert_eq!(out.samples, vec![0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn conform_matches_reference_layout() {
        let reference = AudioBuffer::silence(10, 44_100, 2, SampleFormat::PCM16);
        let speech = AudioBuffer::mono(sine(2_400, 24_000, 200.0), 24_000);
        let out = conform(&speech, &reference).unwrap();
        assert_eq!(out.sample_rate, 44_100);
        assert_eq!(out.channels, 2);
        assert_eq!(out.format, SampleFormat::PCM16);
        assert_eq!(out.frames(), 4_410);
    }
}
