//! [`SoundFilter`]: the caller-facing operations.
//!
//! ```text
//! bytes ─▶ spawn_blocking(decode) ─▶ AudioBuffer
//!                                       │
//!        transcribe ─▶ spawn_blocking(Transcriber::transcribe) ─▶ TranscriptionResult
//!        locate     ─▶ transcribe, then PhraseLocator::locate  ─▶ DetectionReport
//!        edit       ─▶ SegmentEditor::apply (speech awaits TTS)
//!                        └─▶ spawn_blocking(encode) ─▶ EncodedAudio
//! ```
//!
//! Every request owns its buffers end to end; nothing here is shared and
//! mutable apart from the read-only TTS readiness flag.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

use crate::audio::{AudioBuffer, Codec, CodecError, DurationFitter, EncodedAudio, LoudnessMatcher, OutputFormat};
use crate::config::AppConfig;
use crate::edit::{EditError, EditRequest, SegmentEditor};
use crate::locate::{PhraseLocator, PhraseOccurrence, Timeline};
use crate::stt::{SttError, Transcriber, TranscriptionResult};
use crate::tts::{TtsReadiness, VoiceSelectionPolicy};

// ---------------------------------------------------------------------------
// ServiceError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Stt(#[from] SttError),

    #[error(transparent)]
    Edit(#[from] EditError),

    /// A blocking worker panicked or was cancelled.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<tokio::task::JoinError> for ServiceError {
    fn from(e: tokio::task::JoinError) -> Self {
        ServiceError::Internal(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Result of a phrase search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionReport {
    pub phrase: String,
    pub found: bool,
    pub occurrences: Vec<PhraseOccurrence>,
    pub detected_language: Option<String>,
    /// Seconds spent transcribing and searching.
    pub processing_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TtsStatus {
    pub state: TtsReadiness,
    pub tts_model_loaded: bool,
}

// ---------------------------------------------------------------------------
// SoundFilter
// ---------------------------------------------------------------------------

pub struct SoundFilter {
    transcriber: Arc<dyn Transcriber>,
    policy: Arc<VoiceSelectionPolicy>,
    locator: PhraseLocator,
    editor: SegmentEditor,
    codec: Arc<Codec>,
}

impl SoundFilter {
    /// Wire the service from `config`.
    ///
    /// The policy's readiness flag should already be driven by
    /// [`spawn_primary_loader`](crate::tts::spawn_primary_loader).
    pub fn new(
        config: &AppConfig,
        transcriber: Arc<dyn Transcriber>,
        policy: Arc<VoiceSelectionPolicy>,
    ) -> Self {
        let editor = SegmentEditor::new(
            DurationFitter::with_tolerance(config.edit.tolerance_ms),
            LoudnessMatcher::default(),
        )
        .with_default_language(config.tts.default_language.clone());

        Self {
            transcriber,
            policy,
            locator: PhraseLocator::new(config.locator.strategy),
            editor,
            codec: Arc::new(Codec::new(config.codec.ffmpeg_path.clone())),
        }
    }

    /// Replace the phrase locator (e.g. to force a strategy per request).
    pub fn with_locator(mut self, locator: PhraseLocator) -> Self {
        self.locator = locator;
        self
    }

    pub fn locator(&self) -> &PhraseLocator {
        &self.locator
    }

    async fn decode(&self, bytes: Vec<u8>) -> Result<AudioBuffer, ServiceError> {
        let codec = Arc::clone(&self.codec);
        let audio = tokio::task::spawn_blocking(move || codec.decode(&bytes)).await??;
        log::debug!(
            "decoded {:.2} s, {} Hz, {} ch",
            audio.duration_secs(),
            audio.sample_rate,
            audio.channels
        );
        Ok(audio)
    }

    /// Word-level transcript of a recording.
    pub async fn transcribe(&self, bytes: Vec<u8>) -> Result<TranscriptionResult, ServiceError> {
        let audio = self.decode(bytes).await?;
        let transcriber = Arc::clone(&self.transcriber);
        let result = tokio::task::spawn_blocking(move || transcriber.transcribe(&audio)).await??;
        log::info!(
            "transcribed {} words in {:.2} s",
            result.timeline.len(),
            result.processing_time
        );
        Ok(result)
    }

    /// Transcribe a recording and search it for `phrase`.
    pub async fn locate_phrase(&self, bytes: Vec<u8>, phrase: &str) -> Result<DetectionReport, ServiceError> {
        let started = Instant::now();
        let transcription = self.transcribe(bytes).await?;
        let mut report = self.locate_in_timeline(&transcription.timeline, phrase);
        report.detected_language = transcription.detected_language;
        report.processing_time = started.elapsed().as_secs_f64();
        Ok(report)
    }

    /// Search an existing timeline for `phrase`.
    pub fn locate_in_timeline(&self, timeline: &Timeline, phrase: &str) -> DetectionReport {
        let started = Instant::now();
        let occurrences = self.locator.locate(timeline, phrase);
        let found = self.locator.is_found(timeline, phrase, &occurrences);
        log::info!(
            "'{phrase}': {} occurrence(s) ({})",
            occurrences.len(),
            self.locator.strategy().label()
        );
        DetectionReport {
            phrase: phrase.to_string(),
            found,
            occurrences,
            detected_language: None,
            processing_time: started.elapsed().as_secs_f64(),
        }
    }

    /// Apply `request` to a recording and encode the result as `format`.
    pub async fn edit(
        &self,
        bytes: Vec<u8>,
        request: &EditRequest,
        format: OutputFormat,
    ) -> Result<EncodedAudio, ServiceError> {
        let original = self.decode(bytes).await?;
        let edited = self
            .editor
            .apply(&original, request, self.policy.as_ref())
            .await?;
        drop(original);

        let codec = Arc::clone(&self.codec);
        let encoded = tokio::task::spawn_blocking(move || codec.encode(&edited, format)).await??;
        Ok(encoded)
    }

    /// Re-encode a recording as `format`.
    pub async fn convert(&self, bytes: Vec<u8>, format: OutputFormat) -> Result<EncodedAudio, ServiceError> {
        let codec = Arc::clone(&self.codec);
        let encoded = tokio::task::spawn_blocking(move || codec.convert(&bytes, format)).await??;
        Ok(encoded)
    }

    /// Current primary engine readiness.  Never waits.
    pub fn tts_status(&self) -> TtsStatus {
        let state = self.policy.readiness().get();
        TtsStatus {
            state,
            tts_model_loaded: state.is_ready(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
