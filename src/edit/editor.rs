//! Sample-accurate segment replacement.
//!
//! [`SegmentEditor::apply`] validates the request, builds a replacement of
//! the right layout and splices it in:
//!
//! ```text
//! original[..start] ++ replacement ++ original[end..]
//! ```
//!
//! | Kind | Replacement | Length change |
//! |------|-------------|---------------|
//! | Mute | digital silence | none |
//! | Tone | faded sine, gain-matched | none |
//! | Speech, `end_time` given | TTS fitted to the window, gain-matched | none |
//! | Speech, no `end_time` | TTS as synthesized, gain-matched | `max(0, synth − (D − start))` |
//!
//! In the last case the window is `[start, start + synth)`; audio after the
//! window is kept.

use async_trait::async_trait;
use thiserror::Error;

use super::request::{EditKind, EditRequest};
use crate::audio::{
    conform, remap_channels, secs_to_frames, splice, AudioBuffer, DurationFitter, FitError,
    LoudnessMatcher, ResampleError, SampleFormat, ToneGenerator,
};
use crate::tts::{
    SpeechRequest, Synthesis, SynthesisError, SynthesisFailure, VoiceSelectionPolicy,
    FALLBACK_LANGUAGE,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum EditError {
    #[error("invalid time range [{start}, {end}) for a {duration:.3} s recording")]
    InvalidTimeRange { start: f64, end: f64, duration: f64 },

    #[error("{kind} edits need an end time")]
    MissingEndTime { kind: &'static str },

    #[error("tone frequency {frequency_hz} Hz is not playable at {sample_rate} Hz")]
    InvalidToneFrequency { frequency_hz: f64, sample_rate: u32 },

    #[error("unsupported modification kind '{0}' (expected mute, tone or speech)")]
    UnsupportedModificationKind(String),

    #[error("speech edits need replacement text")]
    MissingText,

    #[error("could not fit speech to [{start}, {end}): {source}")]
    Fit {
        start: f64,
        end: f64,
        #[source]
        source: FitError,
    },

    #[error("could not convert synthesized speech: {0}")]
    Resample(#[from] ResampleError),

    #[error("speech replacement at {start} s: {source}")]
    Synthesis {
        start: f64,
        #[source]
        source: SynthesisFailure,
    },
}

// ---------------------------------------------------------------------------
// ReplacementSource
// ---------------------------------------------------------------------------

/// Produces speech for [`EditKind::SpeechReplace`].
#[async_trait]
pub trait ReplacementSource: Send + Sync {
    /// `reference` is the whole original recording.
    async fn speech(
        &self,
        request: &SpeechRequest,
        reference: &AudioBuffer,
    ) -> Result<Synthesis, SynthesisFailure>;
}

#[async_trait]
impl ReplacementSource for VoiceSelectionPolicy {
    async fn speech(
        &self,
        request: &SpeechRequest,
        reference: &AudioBuffer,
    ) -> Result<Synthesis, SynthesisFailure> {
        self.synthesize(request, reference).await
    }
}

const _: fn() = || {
    fn _assert_object_safe(_: &dyn ReplacementSource) {}
};

// ---------------------------------------------------------------------------
// SegmentEditor
// ---------------------------------------------------------------------------

/// Validated window in frames.
#[derive(Debug, Clone, Copy)]
struct Window {
    start: usize,
    /// `None` for speech without an end time.
    end: Option<usize>,
}

#[derive(Debug)]
pub struct SegmentEditor {
    fitter: DurationFitter,
    loudness: LoudnessMatcher,
    default_language: String,
}

impl Default for SegmentEditor {
    fn default() -> Self {
        Self::new(DurationFitter::default(), LoudnessMatcher::default())
    }
}

impl SegmentEditor {
    pub fn new(fitter: DurationFitter, loudness: LoudnessMatcher) -> Self {
        Self {
            fitter,
            loudness,
            default_language: FALLBACK_LANGUAGE.to_string(),
        }
    }

    /// Language for speech requests that name none.
    pub fn with_default_language(mut self, language: impl Into<String>) -> Self {
        self.default_language = language.into();
        self
    }

    /// Apply `request` to `original`, returning the edited recording.
    ///
    /// The request is validated before any audio is processed.  `source` is
    /// consulted only for speech replacement.
    pub async fn apply(
        &self,
        original: &AudioBuffer,
        request: &EditRequest,
        source: &dyn ReplacementSource,
    ) -> Result<AudioBuffer, EditError> {
        let window = self.validate(original, request)?;

        match &request.kind {
            EditKind::Mute => {
                let end = window.end.unwrap_or(window.start);
                let silence = AudioBuffer::silence(
                    end - window.start,
                    original.sample_rate,
                    original.channels,
                    original.format,
                );
                log::info!("mute frames [{}, {end})", window.start);
                Ok(splice(original, window.start, end, &silence))
            }
            EditKind::Tone { frequency_hz } => {
                let end = window.end.unwrap_or(window.start);
                let tone = self.tone(original, window.start, end, *frequency_hz);
                log::info!("tone {frequency_hz} Hz over frames [{}, {end})", window.start);
                Ok(splice(original, window.start, end, &tone))
            }
            EditKind::SpeechReplace {
                text,
                gender,
                language,
                engine,
            } => {
                let speech = SpeechRequest {
                    text: text.clone(),
                    language: language.clone().unwrap_or_else(|| self.default_language.clone()),
                    gender: *gender,
                    engine: *engine,
                };
                self.speech(original, request, window, &speech, source).await
            }
        }
    }

    fn validate(&self, original: &AudioBuffer, request: &EditRequest) -> Result<Window, EditError> {
        let duration = original.duration_secs();
        let start = request.start_time;
        let invalid = |end: f64| EditError::InvalidTimeRange {
            start,
            end,
            duration,
        };

        if !start.is_finite() || start < 0.0 {
            return Err(invalid(request.end_time.unwrap_or(f64::NAN)));
        }

        if let EditKind::Tone { frequency_hz } = request.kind {
            let nyquist = original.sample_rate as f64 / 2.0;
            if !frequency_hz.is_finite() || frequency_hz <= 0.0 || frequency_hz >= nyquist {
                return Err(EditError::InvalidToneFrequency {
                    frequency_hz,
                    sample_rate: original.sample_rate,
                });
            }
        }

        let frames = original.frames();
        let start_frame = secs_to_frames(start, original.sample_rate);

        let Some(end) = request.end_time else {
            return match request.kind {
                EditKind::SpeechReplace { .. } if start_frame <= frames => Ok(Window {
                    start: start_frame,
                    end: None,
                }),
                EditKind::SpeechReplace { .. } => Err(invalid(f64::NAN)),
                _ => Err(EditError::MissingEndTime {
                    kind: request.kind.kind().label(),
                }),
            };
        };

        if !end.is_finite() || start >= end {
            return Err(invalid(end));
        }
        let end_frame = secs_to_frames(end.min(duration), original.sample_rate).min(frames);
        if start_frame >= end_frame {
            return Err(invalid(end));
        }

        Ok(Window {
            start: start_frame,
            end: Some(end_frame),
        })
    }

    fn tone(&self, original: &AudioBuffer, start: usize, end: usize, frequency_hz: f64) -> AudioBuffer {
        let frames = end - start;
        let mono = ToneGenerator::new(frequency_hz).render(frames, original.sample_rate);

        let mut tone = AudioBuffer::new(mono, original.sample_rate, 1, original.format);
        tone.quantize();
        let mut tone = remap_channels(&tone, original.channels);
        tone.resize_frames(frames);

        self.match_loudness(&mut tone, &original.slice_frames(start, end));
        tone
    }

    async fn speech(
        &self,
        original: &AudioBuffer,
        request: &EditRequest,
        window: Window,
        speech: &SpeechRequest,
        source: &dyn ReplacementSource,
    ) -> Result<AudioBuffer, EditError> {
        let start_secs = request.start_time;
        let synthesis = source
            .speech(speech, original)
            .await
            .map_err(|source| EditError::Synthesis {
                start: start_secs,
                source,
            })?;
        log::info!(
            "speech from {:?} engine{}",
            synthesis.engine,
            synthesis
                .voice
                .as_deref()
                .map(|v| format!(" (voice {v})"))
                .unwrap_or_default()
        );

        let conformed = conform(&synthesis.audio, original)?;
        if conformed.is_empty() {
            return Err(EditError::Synthesis {
                start: start_secs,
                source: SynthesisFailure {
                    primary_error: None,
                    secondary_error: SynthesisError::EmptyAudio,
                    voice: synthesis.voice,
                },
            });
        }

        let frames = original.frames();
        let (mut replacement, end) = match window.end {
            Some(end) => {
                let fitted = self
                    .fitter
                    .fit_to_frames(conformed, end - window.start)
                    .map_err(|source| EditError::Fit {
                        start: start_secs,
                        end: request.end_time.unwrap_or(f64::NAN),
                        source,
                    })?;
                (fitted, end)
            }
            None => {
                let end = (window.start + conformed.frames()).min(frames);
                if window.start + conformed.frames() > frames {
                    log::info!(
                        "speech runs {} frames past the end; recording grows",
                        window.start + conformed.frames() - frames
                    );
                }
                (conformed, end)
            }
        };

        self.match_loudness(&mut replacement, &original.slice_frames(window.start, end));
        Ok(splice(original, window.start, end, &replacement))
    }

    /// Best effort: a failed match leaves the replacement at its own level.
    fn match_loudness(&self, replacement: &mut AudioBuffer, segment: &AudioBuffer) {
        let reference = self.loudness.measure(segment);
        match self.loudness.apply_matched_gain(replacement, reference) {
            Ok(outcome) => log::debug!("gain match: {outcome:?}"),
            Err(e) => log::warn!("gain match skipped: {e}"),
        }
        if let SampleFormat::Int { .. } = replacement.format {
            replacement.quantize();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{fade_ms_for, Loudness};
    use crate::tts::{EngineKind, EnginePreference, Gender};
    use std::sync::Mutex;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Returns a fixed clip and records each request.
    struct FixedSpeech {
        audio: AudioBuffer,
        seen: Mutex<Vec<SpeechRequest>>,
    }

    impl FixedSpeech {
        fn new(audio: AudioBuffer) -> Self {
            Self {
                audio,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ReplacementSource for FixedSpeech {
        async fn speech(
            &self,
            request: &SpeechRequest,
            _reference: &AudioBuffer,
        ) -> Result<Synthesis, SynthesisFailure> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(Synthesis {
                audio: self.audio.clone(),
                engine: EngineKind::Secondary,
                voice: Some("test-voice".into()),
            })
        }
    }

    struct NoSpeech;

    #[async_trait]
    impl ReplacementSource for NoSpeech {
        async fn speech(
            &self,
            _request: &SpeechRequest,
            _reference: &AudioBuffer,
        ) -> Result<Synthesis, SynthesisFailure> {
            Err(SynthesisFailure {
                primary_error: Some(SynthesisError::NotReady("Loading".into())),
                secondary_error: SynthesisError::Timeout,
                voice: Some("en-US-GuyNeural".into()),
            })
        }
    }

    const RATE: u32 = 8_000;

    /// 3 s of a non-zero ramp so untouched regions are easy to compare.
    fn recording(channels: u16) -> AudioBuffer {
        let frames = 3 * RATE as usize;
        let samples = (0..frames * channels as usize)
            .map(|i| 0.1 + 0.4 * ((i % 400) as f32 / 400.0))
            .collect();
        AudioBuffer::new(samples, RATE, channels, SampleFormat::Float)
    }

    fn editor() -> SegmentEditor {
        SegmentEditor::default()
    }

    // -----------------------------------------------------------------------
    // Mute
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn mute_one_second_of_three() {
        let original = recording(1);
        let out = editor()
            .apply(&original, &EditRequest::mute(1.0, 2.0), &NoSpeech)
            .await
            .unwrap();

        assert_eq!(out.frames(), original.frames());
        let (s, e) = (RATE as usize, 2 * RATE as usize);
        assert!(out.samples[s..e].iter().all(|&x| x == 0.0));
        assert_eq!(out.samples[..s], original.samples[..s]);
        assert_eq!(out.samples[e..], original.samples[e..]);
    }

    #[tokio::test]
    async fn mute_end_is_clamped_to_duration() {
        let original = recording(2);
        let out = editor()
            .apply(&original, &EditRequest::mute(2.5, 10.0), &NoSpeech)
            .await
            .unwrap();
        assert_eq!(out.frames(), original.frames());
        let s = (2.5 * RATE as f64) as usize * 2;
        assert!(out.samples[s..].iter().all(|&x| x == 0.0));
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn invalid_ranges_are_rejected() {
        let original = recording(1);
        for (start, end) in [(2.0, 1.0), (1.0, 1.0), (-0.5, 1.0), (3.0, 4.0), (f64::NAN, 1.0)] {
            let err = editor()
                .apply(&original, &EditRequest::mute(start, end), &NoSpeech)
                .await
                .unwrap_err();
            assert!(
                matches!(err, EditError::InvalidTimeRange { .. }),
                "[{start}, {end}) gave {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn mute_without_end_is_rejected() {
        let request = EditRequest {
            start_time: 0.5,
            end_time: None,
            kind: EditKind::Mute,
        };
        let err = editor().apply(&recording(1), &request, &NoSpeech).await.unwrap_err();
        assert!(matches!(err, EditError::MissingEndTime { kind: "mute" }));
    }

    #[tokio::test]
    async fn bad_tone_frequencies_are_rejected() {
        for f in [0.0, -10.0, 4_000.0, f64::INFINITY] {
            let err = editor()
                .apply(&recording(1), &EditRequest::tone(0.0, 1.0, f), &NoSpeech)
                .await
                .unwrap_err();
            assert!(matches!(err, EditError::InvalidToneFrequency { .. }), "{f}");
        }
    }

    // -----------------------------------------------------------------------
    // Tone
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn tone_keeps_length_and_fades() {
        let original = recording(2);
        let out = editor()
            .apply(&original, &EditRequest::tone(1.0, 2.0, 440.0), &NoSpeech)
            .await
            .unwrap();
        assert_eq!(out.frames(), original.frames());

        let s = RATE as usize;
        let segment = out.slice_frames(s, 2 * s);
        let left = segment.channel(0);
        assert_eq!(left, segment.channel(1));

        // Envelope grows over the fade-in and shrinks over the fade-out.
        let fade = (fade_ms_for(1_000) as usize * RATE as usize) / 1_000;
        let peak = left.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
        for i in 0..fade {
            let envelope = peak * i as f32 / (fade - 1) as f32 * 1.001 + 1e-4;
            assert!(left[i].abs() <= envelope, "fade-in sample {i}");
            assert!(left[left.len() - 1 - i].abs() <= envelope, "fade-out sample {i}");
        }
        assert_eq!(left[0], 0.0);
        assert_eq!(*left.last().unwrap(), 0.0);
    }

    #[tokio::test]
    async fn tone_matches_segment_loudness() {
        let original = recording(1);
        let out = editor()
            .apply(&original, &EditRequest::tone(0.5, 2.5, 1_000.0), &NoSpeech)
            .await
            .unwrap();
        let m = LoudnessMatcher::default();
        let (s, e) = (RATE as usize / 2, 5 * RATE as usize / 2);
        let (Loudness::Dbfs(a), Loudness::Dbfs(b)) = (
            m.measure(&original.slice_frames(s, e)),
            m.measure(&out.slice_frames(s, e)),
        ) else {
            panic!("segments should not be silent");
        };
        assert!((a - b).abs() < 0.1, "{a} vs {b}");
    }

    #[tokio::test]
    async fn tone_over_silence_is_left_at_generator_level() {
        let original = AudioBuffer::silence(RATE as usize, RATE, 1, SampleFormat::PCM16);
        let out = editor()
            .apply(&original, &EditRequest::tone(0.0, 1.0, 500.0), &NoSpeech)
            .await
            .unwrap();
        assert!(out.samples.iter().any(|&s| s.abs() > 0.9));
    }

    // -----------------------------------------------------------------------
    // Speech
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn speech_with_end_keeps_length() {
        let original = recording(2);
        let speech = FixedSpeech::new(AudioBuffer::mono(vec![0.2; 7_000], 16_000));
        let out = editor()
            .apply(&original, &EditRequest::speech(1.0, Some(2.0), "hello"), &speech)
            .await
            .unwrap();
        assert_eq!(out.frames(), original.frames());
        assert_eq!(out.channels, 2);
        assert_eq!(out.sample_rate, RATE);
        let s = RATE as usize * 2;
        assert_eq!(out.samples[..s], original.samples[..s]);
    }

    #[tokio::test]
    async fn speech_without_end_keeps_tail_and_grows_at_end() {
        let original = recording(1);
        // 1.5 s of speech starting at 2.0 s: 0.5 s past the end.
        let speech = FixedSpeech::new(AudioBuffer::mono(vec![0.2; 12_000], RATE));
        let out = editor()
            .apply(&original, &EditRequest::speech(2.0, None, "hello"), &speech)
            .await
            .unwrap();
        assert_eq!(out.frames(), original.frames() + RATE as usize / 2);

        // Mid-clip: the tail after the window survives and length is kept.
        let short = FixedSpeech::new(AudioBuffer::mono(vec![0.2; 4_000], RATE));
        let out = editor()
            .apply(&original, &EditRequest::speech(1.0, None, "hi"), &short)
            .await
            .unwrap();
        assert_eq!(out.frames(), original.frames());
        let tail = RATE as usize + 4_000;
        assert_eq!(out.samples[tail..], original.samples[tail..]);
    }

    #[tokio::test]
    async fn speech_request_carries_defaults() {
        let speech = FixedSpeech::new(AudioBuffer::mono(vec![0.2; 800], RATE));
        let editor = editor().with_default_language("de");
        let mut request = EditRequest::speech(0.0, Some(0.1), "hallo");
        if let EditKind::SpeechReplace { gender, .. } = &mut request.kind {
            *gender = Some(Gender::Female);
        }
        editor.apply(&recording(1), &request, &speech).await.unwrap();

        let seen = speech.seen.lock().unwrap();
        assert_eq!(seen[0].language, "de");
        assert_eq!(seen[0].gender, Some(Gender::Female));
        assert_eq!(seen[0].engine, EnginePreference::Auto);
    }

    #[tokio::test]
    async fn synthesis_failure_is_surfaced_with_context() {
        let err = editor()
            .apply(&recording(1), &EditRequest::speech(1.0, Some(2.0), "x"), &NoSpeech)
            .await
            .unwrap_err();
        let EditError::Synthesis { start, source } = err else {
            panic!("expected synthesis failure");
        };
        assert_eq!(start, 1.0);
        assert!(source.primary_error.is_some());
    }

    #[tokio::test]
    async fn speech_may_start_at_the_very_end() {
        let original = recording(1);
        let speech = FixedSpeech::new(AudioBuffer::mono(vec![0.2; 800], RATE));
        let out = editor()
            .apply(&original, &EditRequest::speech(3.0, None, "end"), &speech)
            .await
            .unwrap();
        assert_eq!(out.frames(), original.frames() + 800);
    }
}
