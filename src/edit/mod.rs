//! Segment editing: mute, tone or speech over a time window.
//!
//! Build an [`EditRequest`], then hand it to [`SegmentEditor::apply`] with a
//! [`ReplacementSource`] (normally the
//! [`VoiceSelectionPolicy`](crate::tts::VoiceSelectionPolicy)).
//!
//! ```rust
//! use sound_filter::audio::AudioBuffer;
//! use sound_filter::edit::{EditRequest, SegmentEditor};
//! use sound_filter::tts::{OpenAiSpeechEngine, VoiceSelectionPolicy};
//! use sound_filter::config::SecondaryTtsConfig;
//! use std::sync::Arc;
//!
//! # tokio_test();
//! # fn tokio_test() {
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! let policy = VoiceSelectionPolicy::new(Arc::new(OpenAiSpeechEngine::from_config(
//!     &SecondaryTtsConfig::default(),
//! )));
//!
//! let original = AudioBuffer::mono(vec![0.3; 16_000], 8_000);
//! let edited = rt
//!     .block_on(SegmentEditor::default().apply(&original, &EditRequest::mute(0.5, 1.0), &policy))
//!     .unwrap();
//! assert_eq!(edited.frames(), original.frames());
//! # }
//! ```

pub mod editor;
pub mod request;

pub use editor::{EditError, ReplacementSource, SegmentEditor};
pub use request::{EditForm, EditKind, EditRequest, FormDefaults, ModificationKind};
