//! Core transcriber trait and implementations.
//!
//! # Overview
//!
//! [`Transcriber`] is the interface the service uses.  It is object-safe and
//! `Send + Sync` so it can be held behind an `Arc<dyn Transcriber>` and
//! driven from `spawn_blocking`.
//!
//! [`WhisperTranscriber`] (feature `whisper`) wraps a
//! `whisper_rs::WhisperContext` and produces word-level timelines.
//!
//! [`NoModelTranscriber`] stands in when no model is configured; every call
//! fails with [`SttError::ModelNotFound`].

use thiserror::Error;

use crate::audio::AudioBuffer;
use crate::stt::transcribe::TranscriptionResult;

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

/// All errors that can arise from the STT subsystem.
#[derive(Debug, Clone, Error)]
pub enum SttError {
    /// The GGML model file was not found at the given path.
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// `whisper_rs` failed to initialise a `WhisperContext` or `WhisperState`.
    #[error("Whisper context initialisation failed: {0}")]
    ContextInit(String),

    /// An error occurred during the inference pass.
    #[error("Transcription error: {0}")]
    Transcription(String),

    /// The recording holds less than 0.1 s of audio.
    #[error("Audio too short: minimum 0.1 s, got {0} samples at 16 kHz")]
    AudioTooShort(usize),
}

// ---------------------------------------------------------------------------
// Transcriber trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe speech-to-text interface.
///
/// Implementations accept a buffer at any rate and channel count and return
/// word-level tokens with times in seconds from the start of the recording.
/// Calls block; run them on a blocking thread.
pub trait Transcriber: Send + Sync {
    fn transcribe(&self, audio: &AudioBuffer) -> Result<TranscriptionResult, SttError>;
}

// Compile-time assertion: Box<dyn Transcriber> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Transcriber>) {}
};

/// Rate every recogniser here works at.
pub const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// 0.1 s × 16 000 Hz.
#[cfg_attr(not(feature = "whisper"), allow(dead_code))]
pub(crate) const MIN_AUDIO_SAMPLES: usize = 1_600;

// ---------------------------------------------------------------------------
// NoModelTranscriber
// ---------------------------------------------------------------------------

/// Placeholder used when no Whisper model is available.
#[derive(Debug, Clone)]
pub struct NoModelTranscriber {
    hint: String,
}

impl NoModelTranscriber {
    pub fn new(hint: impl Into<String>) -> Self {
        Self { hint: hint.into() }
    }
}

impl Transcriber for NoModelTranscriber {
    fn transcribe(&self, _audio: &AudioBuffer) -> Result<TranscriptionResult, SttError> {
        Err(SttError::ModelNotFound(self.hint.clone()))
    }
}

// ---------------------------------------------------------------------------
// WhisperTranscriber
// ---------------------------------------------------------------------------

#[cfg(feature = "whisper")]
pub use whisper::WhisperTranscriber;

#[cfg(feature = "whisper")]
mod whisper {
    use std::path::Path;

    use whisper_rs::{FullParams, WhisperContext, WhisperContextParameters};

    use super::{SttError, Transcriber, MIN_AUDIO_SAMPLES, WHISPER_SAMPLE_RATE};
    use crate::audio::{to_mono_at, AudioBuffer};
    use crate::locate::{Timeline, Token, DEFAULT_CONFIDENCE};
    use crate::stt::transcribe::{SamplingStrategy, TranscribeParams, TranscriptionResult};

    /// Whisper-backed transcriber producing one token per word.
    ///
    /// A new `WhisperState` is created for every call so the transcriber can
    /// be shared across threads without locking.
    pub struct WhisperTranscriber {
        ctx: WhisperContext,
        params: TranscribeParams,
    }

    impl std::fmt::Debug for WhisperTranscriber {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("WhisperTranscriber")
                .field("params", &self.params)
                .finish_non_exhaustive()
        }
    }

    // SAFETY: WhisperContext is Send+Sync as declared by whisper-rs; the
    // model weights are read-only after loading.
    unsafe impl Send for WhisperTranscriber {}
    unsafe impl Sync for WhisperTranscriber {}

    impl WhisperTranscriber {
        /// Load a GGML model from `model_path`.
        pub fn load(model_path: impl AsRef<Path>, params: TranscribeParams) -> Result<Self, SttError> {
            let path = model_path.as_ref();
            if !path.exists() {
                return Err(SttError::ModelNotFound(path.display().to_string()));
            }
            let path_str = path.to_str().ok_or_else(|| {
                SttError::ModelNotFound(format!(
                    "model path contains non-UTF-8 characters: {}",
                    path.display()
                ))
            })?;

            let mut ctx_params = WhisperContextParameters::default();
            ctx_params.use_gpu(params.use_gpu);
            let ctx = WhisperContext::new_with_params(path_str, ctx_params)
                .map_err(|e| SttError::ContextInit(e.to_string()))?;

            log::info!("Whisper model loaded from {}", path.display());
            Ok(Self { ctx, params })
        }
    }

    impl Transcriber for WhisperTranscriber {
        fn transcribe(&self, audio: &AudioBuffer) -> Result<TranscriptionResult, SttError> {
            let samples = to_mono_at(audio, WHISPER_SAMPLE_RATE);
            if samples.len() < MIN_AUDIO_SAMPLES {
                return Err(SttError::AudioTooShort(samples.len()));
            }

            use whisper_rs::SamplingStrategy as WS;
            let ws = match self.params.strategy {
                SamplingStrategy::Greedy { best_of } => WS::Greedy { best_of },
                SamplingStrategy::BeamSearch { beam_size, patience } => {
                    WS::BeamSearch { beam_size, patience }
                }
            };

            let mut fp = FullParams::new(ws);
            fp.set_language(self.params.whisper_language());
            fp.set_n_threads(self.params.n_threads);
            // One segment per word, each with its own timestamps.
            fp.set_token_timestamps(true);
            fp.set_split_on_word(true);
            fp.set_max_len(1);
            if self.params.suppress_progress {
                fp.set_print_progress(false);
                fp.set_print_realtime(false);
                fp.set_print_special(false);
            }

            let mut state = self
                .ctx
                .create_state()
                .map_err(|e| SttError::ContextInit(e.to_string()))?;

            let wall_start = std::time::Instant::now();
            state
                .full(fp, &samples)
                .map_err(|e| SttError::Transcription(e.to_string()))?;

            let n_segments = state
                .full_n_segments()
                .map_err(|e| SttError::Transcription(e.to_string()))?;

            let mut tokens: Vec<Token> = Vec::with_capacity(n_segments.max(0) as usize);
            let mut prev_end = 0.0_f64;
            for i in 0..n_segments {
                let text = state
                    .full_get_segment_text(i)
                    .map_err(|e| SttError::Transcription(format!("segment {i}: {e}")))?;
                if text.trim().is_empty() {
                    continue;
                }

                // Centiseconds; clamp so recogniser jitter cannot reorder words.
                let t0 = state.full_get_segment_t0(i).unwrap_or(0).max(0) as f64 / 100.0;
                let t1 = state.full_get_segment_t1(i).unwrap_or(0).max(0) as f64 / 100.0;
                let start = t0.max(prev_end);
                let end = t1.max(start);
                prev_end = end;

                tokens.push(Token {
                    text,
                    start_time: start,
                    end_time: end,
                    confidence: segment_confidence(&state, i),
                });
            }

            let detected_language = state
                .full_lang_id_from_state()
                .ok()
                .and_then(whisper_rs::get_lang_str)
                .map(str::to_string)
                .or_else(|| self.params.whisper_language().map(str::to_string));

            let timeline =
                Timeline::new(tokens).map_err(|e| SttError::Transcription(e.to_string()))?;

            log::debug!("transcribed {} words", timeline.len());
            Ok(TranscriptionResult {
                timeline,
                detected_language,
                processing_time: wall_start.elapsed().as_secs_f64(),
            })
        }
    }

    /// Mean probability of the segment's text tokens.
    fn segment_confidence(state: &whisper_rs::WhisperState, segment: i32) -> f32 {
        let n = state.full_n_tokens(segment).unwrap_or(0);
        let mut sum = 0.0_f32;
        let mut count = 0u32;
        for j in 0..n {
            let Ok(text) = state.full_get_token_text(segment, j) else {
                continue;
            };
            if text.starts_with("[_") || text.starts_with("<|") {
                continue;
            }
            if let Ok(p) = state.full_get_token_prob(segment, j) {
                sum += p;
                count += 1;
            }
        }
        if count == 0 {
            DEFAULT_CONFIDENCE
        } else {
            (sum / count as f32).clamp(0.0, 1.0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockTranscriber  (test-only)
// ---------------------------------------------------------------------------

/// A test double that returns a pre-configured result without loading any
/// model file.
#[cfg(test)]
pub struct MockTranscriber {
    response: Result<TranscriptionResult, SttError>,
}

#[cfg(test)]
impl MockTranscriber {
    pub fn ok(result: TranscriptionResult) -> Self {
        Self { response: Ok(result) }
    }

    pub fn err(error: SttError) -> Self {
        Self {
            response: Err(error),
        }
    }
}

#[cfg(test)]
impl Transcriber for MockTranscriber {
    fn transcribe(&self, audio: &AudioBuffer) -> Result<TranscriptionResult, SttError> {
        let samples = crate::audio::to_mono_at(audio, WHISPER_SAMPLE_RATE).len();
        if samples < MIN_AUDIO_SAMPLES {
            return Err(SttError::AudioTooShort(samples));
        }
        self.response.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
