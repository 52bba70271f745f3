//! Text-to-speech for speech replacement.
//!
//! - [`engine`]: the two engine roles and their HTTP adapters.
//! - [`readiness`]: startup loading of the primary engine.
//! - [`voices`]: language × gender voice table for the secondary engine.
//! - [`gender`]: speaker gender estimate used when a request names none.
//! - [`policy`]: [`VoiceSelectionPolicy`] ties the above together.

pub mod engine;
pub mod gender;
pub mod policy;
pub mod readiness;
pub mod voices;

pub use engine::{
    CloningHttpEngine, OpenAiSpeechEngine, PrimarySynthesizer, SecondarySynthesizer,
    SynthesisError, SynthesisFailure,
};
pub use gender::{GenderClassifier, PitchGenderClassifier};
pub use policy::{EngineKind, EnginePreference, SpeechRequest, Synthesis, VoiceSelectionPolicy};
pub use readiness::{spawn_primary_loader, ReadinessFlag, TtsReadiness};
pub use voices::{primary_subtag, Gender, VoiceProfile, VoiceTable, FALLBACK_LANGUAGE};
