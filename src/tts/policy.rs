//! Engine and voice selection for speech replacement.
//!
//! ```text
//!   SpeechRequest ──▶ readiness Ready && engine != Secondary ?
//!                         │ yes                      │ no
//!                         ▼                          │
//!                 primary (clone reference) ──err──▶ │
//!                         │ ok                       ▼
//!                         │            gender = explicit | classify(reference)
//!                         │            voice  = VoiceTable::select(lang, gender)
//!                         │                          │
//!                         │                  secondary(text, voice)
//!                         ▼                          │ err
//!                     Synthesis                SynthesisFailure
//! ```
//!
//! The readiness flag is only read here; a request arriving while the
//! primary engine is still loading goes straight to the secondary engine.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::engine::{PrimarySynthesizer, SecondarySynthesizer, SynthesisError, SynthesisFailure};
use super::gender::{GenderClassifier, PitchGenderClassifier};
use super::readiness::ReadinessFlag;
use super::voices::{primary_subtag, Gender, VoiceTable};
use crate::audio::AudioBuffer;

// ---------------------------------------------------------------------------
// Request / result types
// ---------------------------------------------------------------------------

/// Which engines a speech request may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnginePreference {
    /// Primary when ready, otherwise secondary.
    #[default]
    Auto,
    /// Skip the primary engine.
    Secondary,
}

impl EnginePreference {
    /// Map the legacy `use_edge_tts` request flag.
    pub fn from_force_secondary(force: bool) -> Self {
        if force {
            EnginePreference::Secondary
        } else {
            EnginePreference::Auto
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EnginePreference::Auto => "auto",
            EnginePreference::Secondary => "secondary",
        }
    }
}

impl fmt::Display for EnginePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EnginePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" | "primary" => Ok(EnginePreference::Auto),
            "secondary" | "edge" => Ok(EnginePreference::Secondary),
            other => Err(format!("unknown engine preference '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    pub language: String,
    /// `None` lets the classifier decide from the reference recording.
    pub gender: Option<Gender>,
    pub engine: EnginePreference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Primary,
    Secondary,
}

/// Audio produced for a [`SpeechRequest`] plus where it came from.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub audio: AudioBuffer,
    pub engine: EngineKind,
    /// Secondary voice name; `None` for cloned speech.
    pub voice: Option<String>,
}

// ---------------------------------------------------------------------------
// VoiceSelectionPolicy
// ---------------------------------------------------------------------------

pub struct VoiceSelectionPolicy {
    primary: Option<Arc<dyn PrimarySynthesizer>>,
    secondary: Arc<dyn SecondarySynthesizer>,
    readiness: ReadinessFlag,
    classifier: Arc<dyn GenderClassifier>,
    voices: VoiceTable,
}

impl VoiceSelectionPolicy {
    /// Policy with only a secondary engine.
    pub fn new(secondary: Arc<dyn SecondarySynthesizer>) -> Self {
        Self {
            primary: None,
            secondary,
            readiness: ReadinessFlag::new(),
            classifier: Arc::new(PitchGenderClassifier::default()),
            voices: VoiceTable::builtin(),
        }
    }

    /// Attach the primary engine together with the flag its loader drives.
    pub fn with_primary(mut self, primary: Arc<dyn PrimarySynthesizer>, readiness: ReadinessFlag) -> Self {
        self.primary = Some(primary);
        self.readiness = readiness;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn GenderClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_voices(mut self, voices: VoiceTable) -> Self {
        self.voices = voices;
        self
    }

    pub fn readiness(&self) -> &ReadinessFlag {
        &self.readiness
    }

    pub async fn synthesize(
        &self,
        request: &SpeechRequest,
        reference: &AudioBuffer,
    ) -> Result<Synthesis, SynthesisFailure> {
        let primary_error = match self.try_primary(request, reference).await {
            Ok(audio) => {
                return Ok(Synthesis {
                    audio,
                    engine: EngineKind::Primary,
                    voice: None,
                })
            }
            Err(e) => e,
        };

        let gender = match request.gender {
            Some(g) => g,
            None => self.classify(reference).await,
        };

        let Some(voice) = self.voices.select(&request.language, gender).cloned() else {
            return Err(SynthesisFailure {
                primary_error,
                secondary_error: SynthesisError::NoVoice(request.language.clone()),
                voice: None,
            });
        };

        // A fallback voice speaks its own language, not the requested one.
        let language = if primary_subtag(&request.language) == voice.language {
            request.language.as_str()
        } else {
            voice.language.as_str()
        };
        log::info!(
            "synthesizing with {} voice {} ({gender}, {language})",
            self.secondary.name(),
            voice.name
        );
        match self
            .secondary
            .synthesize(&request.text, language, &voice)
            .await
        {
            Ok(audio) => Ok(Synthesis {
                audio,
                engine: EngineKind::Secondary,
                voice: Some(voice.name),
            }),
            Err(secondary_error) => {
                log::warn!("secondary TTS failed with voice {}: {secondary_error}", voice.name);
                Err(SynthesisFailure {
                    primary_error,
                    secondary_error,
                    voice: Some(voice.name),
                })
            }
        }
    }

    /// `Err(None)` when the primary engine was not attempted at all.
    async fn try_primary(
        &self,
        request: &SpeechRequest,
        reference: &AudioBuffer,
    ) -> Result<AudioBuffer, Option<SynthesisError>> {
        if request.engine == EnginePreference::Secondary {
            return Err(None);
        }
        let Some(primary) = &self.primary else {
            return Err(None);
        };

        let state = self.readiness.get();
        if !state.is_ready() {
            log::debug!("primary TTS is {}, routing to secondary", state.label());
            return Err(Some(SynthesisError::NotReady(state.label().to_string())));
        }

        match primary
            .synthesize(&request.text, &request.language, Some(reference))
            .await
        {
            Ok(audio) => {
                log::info!("synthesized with primary engine '{}'", primary.name());
                Ok(audio)
            }
            Err(e) => {
                log::warn!("primary TTS '{}' failed: {e}; falling back", primary.name());
                Err(Some(e))
            }
        }
    }

    async fn classify(&self, reference: &AudioBuffer) -> Gender {
        let classifier = Arc::clone(&self.classifier);
        let audio = reference.clone();
        match tokio::task::spawn_blocking(move || classifier.classify(&audio)).await {
            Ok(gender) => gender,
            Err(e) => {
                log::warn!("gender classification panicked: {e}; assuming male");
                Gender::Male
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
