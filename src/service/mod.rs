//! Service facade used by the CLI.
//!
//! [`SoundFilter`] owns one instance of each component and exposes the
//! caller-facing operations: transcribe, locate, edit, convert and TTS
//! status.  Decoding, encoding and transcription run on
//! `tokio::task::spawn_blocking`.

pub mod runner;

pub use runner::{DetectionReport, ServiceError, SoundFilter, TtsStatus};
