//! Speech-to-text: recordings in, word-level timelines out.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                Transcriber (trait)                   │
//! │                                                      │
//! │   ┌─────────────┐    ┌───────────────────┐           │
//! │   │  ModelPaths │    │ WhisperTranscriber│           │
//! │   │ - resolve   │───▶│ - ctx             │           │
//! │   │ - exists?   │    │ - params          │           │
//! │   └─────────────┘    └─────────┬─────────┘           │
//! │                                │                     │
//! │                                ▼                     │
//! │                    ┌──────────────────────┐          │
//! │                    │ transcribe()         │          │
//! │                    │ AudioBuffer → words  │          │
//! │                    └──────────────────────┘          │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! The Whisper backend is compiled only with the `whisper` cargo feature;
//! without it the binary falls back to [`NoModelTranscriber`] and phrase
//! location works from word lists supplied as JSON.

pub mod engine;
pub mod model;
pub mod transcribe;

pub use engine::{NoModelTranscriber, SttError, Transcriber, WHISPER_SAMPLE_RATE};
#[cfg(feature = "whisper")]
pub use engine::WhisperTranscriber;
pub use model::{find_model_by_id, ModelInfo, ModelPaths, ModelSize, WHISPER_MODELS};
pub use transcribe::{SamplingStrategy, TranscribeParams, TranscriptionResult};

#[cfg(test)]
pub use engine::MockTranscriber;
