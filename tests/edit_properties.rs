//! Length and content guarantees of fitting and segment editing.

use async_trait::async_trait;
use sound_filter::audio::{AudioBuffer, DurationFitter, SampleFormat};
use sound_filter::edit::{EditRequest, ReplacementSource, SegmentEditor};
use sound_filter::tts::{EngineKind, SpeechRequest, Synthesis, SynthesisFailure};

const RATE: u32 = 16_000;

fn voice_like(frames: usize, rate: u32, channels: u16) -> AudioBuffer {
    let samples = (0..frames)
        .flat_map(|i| {
            let t = i as f32 / rate as f32;
            let s = 0.3 * (2.0 * std::f32::consts::PI * 180.0 * t).sin()
                + 0.1 * (2.0 * std::f32::consts::PI * 900.0 * t).sin();
            std::iter::repeat(s).take(channels as usize)
        })
        .collect();
    AudioBuffer::new(samples, rate, channels, SampleFormat::Float)
}

/// Synthesizes a clip of fixed length at its own rate.
struct ClipSource {
    frames: usize,
    rate: u32,
}

#[async_trait]
impl ReplacementSource for ClipSource {
    async fn speech(
        &self,
        _request: &SpeechRequest,
        _reference: &AudioBuffer,
    ) -> Result<Synthesis, SynthesisFailure> {
        Ok(Synthesis {
            audio: voice_like(self.frames, self.rate, 1),
            engine: EngineKind::Secondary,
            voice: None,
        })
    }
}

#[test]
fn fit_900_ms_to_1000_ms() {
    let fitted = DurationFitter::default()
        .fit(voice_like(14_400, RATE, 1), 1_000.0)
        .unwrap();
    let ms = fitted.duration_ms();
    assert!((990.0..=1_010.0).contains(&ms), "{ms} ms");
}

#[test]
fn fit_lands_within_tolerance_for_any_target() {
    let fitter = DurationFitter::default();
    for input_ms in [5.0, 30.0, 250.0, 995.0, 1_000.0, 2_400.0] {
        for target_ms in [1.0, 20.0, 333.0, 1_000.0, 3_000.0] {
            let frames = (input_ms * RATE as f64 / 1_000.0) as usize;
            let fitted = fitter.fit(voice_like(frames, RATE, 2), target_ms).unwrap();
            assert!(!fitted.is_empty());
            assert_eq!(fitted.channels, 2);
            assert!(
                (fitted.duration_ms() - target_ms).abs() <= fitter.tolerance_ms,
                "{input_ms} ms → {target_ms} ms gave {} ms",
                fitted.duration_ms()
            );
        }
    }
}

#[test]
fn fit_within_tolerance_is_untouched() {
    let input = voice_like(16_080, RATE, 1); // 1005 ms
    let fitted = DurationFitter::default().fit(input.clone(), 1_000.0).unwrap();
    assert_eq!(fitted, input);
}

#[tokio::test]
async fn fixed_window_edits_never_change_length() {
    let original = voice_like(3 * RATE as usize, RATE, 2);
    let editor = SegmentEditor::default();
    let source = ClipSource {
        frames: 30_000,
        rate: 24_000,
    };

    for (start, end) in [(0.0, 0.5), (1.0, 2.0), (2.2, 3.0), (0.01, 2.99)] {
        for request in [
            EditRequest::mute(start, end),
            EditRequest::tone(start, end, 1_000.0),
            EditRequest::speech(start, Some(end), "replacement"),
        ] {
            let out = editor.apply(&original, &request, &source).await.unwrap();
            assert_eq!(out.frames(), original.frames(), "{request:?}");
            assert_eq!(out.channels, original.channels);
            assert_eq!(out.sample_rate, original.sample_rate);
        }
    }
}

#[tokio::test]
async fn mute_window_is_silent_and_rest_bit_identical() {
    let original = voice_like(3 * RATE as usize, RATE, 1);
    let out = SegmentEditor::default()
        .apply(&original, &EditRequest::mute(1.0, 2.0), &ClipSource { frames: 1, rate: RATE })
        .await
        .unwrap();

    let (s, e) = (RATE as usize, 2 * RATE as usize);
    assert!(out.samples[s..e].iter().all(|&x| x == 0.0));
    assert_eq!(out.samples[..s], original.samples[..s]);
    assert_eq!(out.samples[e..], original.samples[e..]);
}

#[tokio::test]
async fn open_ended_speech_grows_by_overhang() {
    let original = voice_like(RATE as usize, RATE, 1); // 1.0 s
    let editor = SegmentEditor::default();

    // 0.75 s of speech from 0.5 s: overhang 0.25 s.
    let source = ClipSource {
        frames: 12_000,
        rate: RATE,
    };
    let out = editor
        .apply(&original, &EditRequest::speech(0.5, None, "x"), &source)
        .await
        .unwrap();
    assert_eq!(out.frames(), RATE as usize + 4_000);

    // 0.25 s of speech from 0.5 s: no overhang, tail kept.
    let source = ClipSource {
        frames: 4_000,
        rate: RATE,
    };
    let out = editor
        .apply(&original, &EditRequest::speech(0.5, None, "x"), &source)
        .await
        .unwrap();
    assert_eq!(out.frames(), original.frames());
    assert_eq!(out.samples[12_000..], original.samples[12_000..]);
}
