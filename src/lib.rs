//! Find spoken phrases in recordings and mute, tone-replace or
//! voice-replace them.
//!
//! | Module | Role |
//! |--------|------|
//! | [`locate`] | word timelines and phrase search |
//! | [`audio`] | buffers, DSP, codecs |
//! | [`edit`] | sample-accurate segment replacement |
//! | [`tts`] | speech engines and voice selection |
//! | [`stt`] | transcription |
//! | [`service`] | caller-facing operations |
//! | [`config`] | `settings.toml` |

pub mod audio;
pub mod config;
pub mod edit;
pub mod locate;
pub mod service;
pub mod stt;
pub mod tts;
