//! Edit requests: what to put where.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use super::editor::EditError;
use crate::tts::{EnginePreference, Gender};

/// The three request kinds, as named on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModificationKind {
    Mute,
    Tone,
    Speech,
}

impl ModificationKind {
    pub fn label(&self) -> &'static str {
        match self {
            ModificationKind::Mute => "mute",
            ModificationKind::Tone => "tone",
            ModificationKind::Speech => "speech",
        }
    }
}

impl fmt::Display for ModificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ModificationKind {
    type Err = EditError;

    /// ```
    /// use sound_filter::edit::ModificationKind;
    ///
    /// assert_eq!("TTS".parse::<ModificationKind>().unwrap(), ModificationKind::Speech);
    /// assert!("reverse".parse::<ModificationKind>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mute" => Ok(ModificationKind::Mute),
            "tone" => Ok(ModificationKind::Tone),
            "speech" | "tts" => Ok(ModificationKind::Speech),
            _ => Err(EditError::UnsupportedModificationKind(s.to_string())),
        }
    }
}

/// Replacement content for the edit window.
#[derive(Debug, Clone, PartialEq)]
pub enum EditKind {
    /// Digital silence.
    Mute,
    /// Faded sine tone.
    Tone { frequency_hz: f64 },
    /// Synthesized speech.
    SpeechReplace {
        text: String,
        /// `None` asks the classifier.
        gender: Option<Gender>,
        /// `None` uses the editor's default language.
        language: Option<String>,
        engine: EnginePreference,
    },
}

impl EditKind {
    pub fn kind(&self) -> ModificationKind {
        match self {
            EditKind::Mute => ModificationKind::Mute,
            EditKind::Tone { .. } => ModificationKind::Tone,
            EditKind::SpeechReplace { .. } => ModificationKind::Speech,
        }
    }
}

/// One edit over `[start_time, end_time)` seconds.
///
/// `end_time` is required for mute and tone.  For speech it may be omitted,
/// in which case the window is as long as the synthesized speech.
#[derive(Debug, Clone, PartialEq)]
pub struct EditRequest {
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub kind: EditKind,
}

impl EditRequest {
    pub fn mute(start_time: f64, end_time: f64) -> Self {
        Self {
            start_time,
            end_time: Some(end_time),
            kind: EditKind::Mute,
        }
    }

    pub fn tone(start_time: f64, end_time: f64, frequency_hz: f64) -> Self {
        Self {
            start_time,
            end_time: Some(end_time),
            kind: EditKind::Tone { frequency_hz },
        }
    }

    /// Speech replacement with classifier-chosen gender, default language
    /// and automatic engine choice.
    pub fn speech(start_time: f64, end_time: Option<f64>, text: impl Into<String>) -> Self {
        Self {
            start_time,
            end_time,
            kind: EditKind::SpeechReplace {
                text: text.into(),
                gender: None,
                language: None,
                engine: EnginePreference::Auto,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// EditForm
// ---------------------------------------------------------------------------

/// Flat, string-keyed form of an edit as it arrives in a JSON request file.
///
/// ```json
/// {"modification_type": "tts", "start_time": 1.2, "text": "hello",
///  "use_edge_tts": true}
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EditForm {
    pub modification_type: String,
    pub start_time: f64,
    #[serde(default)]
    pub end_time: Option<f64>,
    #[serde(default)]
    pub tone_frequency: Option<f64>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub language: Option<String>,
    /// Skip the voice-cloning engine.  Absent means "use the configured
    /// default".
    #[serde(default)]
    pub use_edge_tts: Option<bool>,
}

/// Values a form may leave out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormDefaults {
    pub tone_frequency_hz: f64,
    pub engine: EnginePreference,
}

impl EditForm {
    /// Resolve the form into an [`EditRequest`].
    ///
    /// Range checks happen later, in the editor; only the kind and the
    /// speech text are checked here.
    pub fn into_request(self, defaults: FormDefaults) -> Result<EditRequest, EditError> {
        let kind = match self.modification_type.parse::<ModificationKind>()? {
            ModificationKind::Mute => EditKind::Mute,
            ModificationKind::Tone => EditKind::Tone {
                frequency_hz: self.tone_frequency.unwrap_or(defaults.tone_frequency_hz),
            },
            ModificationKind::Speech => {
                let text = self
                    .text
                    .filter(|t| !t.trim().is_empty())
                    .ok_or(EditError::MissingText)?;
                EditKind::SpeechReplace {
                    text,
                    gender: self.gender,
                    language: self.language.filter(|l| !l.trim().is_empty()),
                    engine: self
                        .use_edge_tts
                        .map(EnginePreference::from_force_secondary)
                        .unwrap_or(defaults.engine),
                }
            }
        };
        Ok(EditRequest {
            start_time: self.start_time,
            end_time: self.end_time,
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULTS: FormDefaults = FormDefaults {
        tone_frequency_hz: 1_000.0,
        engine: EnginePreference::Auto,
    };

    fn form(json: &str) -> EditForm {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn form_with_unknown_kind_is_rejected() {
        let err = form(r#"{"modification_type": "reverse", "start_time": 0.0, "end_time": 1.0}"#)
            .into_request(DEFAULTS)
            .unwrap_err();
        assert!(matches!(err, EditError::UnsupportedModificationKind(ref k) if k == "reverse"));
    }

    #[test]
    fn tone_form_uses_default_frequency() {
        let req = form(r#"{"modification_type": "tone", "start_time": 0.5, "end_time": 1.0}"#)
            .into_request(DEFAULTS)
            .unwrap();
        assert_eq!(req, EditRequest::tone(0.5, 1.0, 1_000.0));

        let req = form(
            r#"{"modification_type": "tone", "start_time": 0.5, "end_time": 1.0, "tone_frequency": 440}"#,
        )
        .into_request(DEFAULTS)
        .unwrap();
        assert_eq!(req.kind, EditKind::Tone { frequency_hz: 440.0 });
    }

    #[test]
    fn edge_flag_forces_the_secondary_engine() {
        let json = r#"{"modification_type": "tts", "start_time": 1.0, "text": "hi",
                       "gender": "female", "use_edge_tts": true}"#;
        let req = form(json).into_request(DEFAULTS).unwrap();
        assert_eq!(req.end_time, None);
        assert_eq!(
            req.kind,
            EditKind::SpeechReplace {
                text: "hi".into(),
                gender: Some(Gender::Female),
                language: None,
                engine: EnginePreference::Secondary,
            }
        );

        let json = r#"{"modification_type": "speech", "start_time": 1.0, "text": "hi",
                       "use_edge_tts": false}"#;
        let secondary_default = FormDefaults {
            engine: EnginePreference::Secondary,
            ..DEFAULTS
        };
        let req = form(json).into_request(secondary_default).unwrap();
        assert!(matches!(req.kind, EditKind::SpeechReplace { engine: EnginePreference::Auto, .. }));
    }

    #[test]
    fn speech_form_without_text_is_rejected() {
        let err = form(r#"{"modification_type": "tts", "start_time": 0.0, "text": "  "}"#)
            .into_request(DEFAULTS)
            .unwrap_err();
        assert!(matches!(err, EditError::MissingText));
    }

    #[test]
    fn kind_strings_parse() {
        assert_eq!("mute".parse::<ModificationKind>().unwrap(), ModificationKind::Mute);
        assert_eq!(" Tone ".parse::<ModificationKind>().unwrap(), ModificationKind::Tone);
        assert_eq!("speech".parse::<ModificationKind>().unwrap(), ModificationKind::Speech);
        assert_eq!("tts".parse::<ModificationKind>().unwrap(), ModificationKind::Speech);
    }

    #[test]
    fn unknown_kind_is_unsupported() {
        let err = "bleep".parse::<ModificationKind>().unwrap_err();
        assert!(matches!(err, EditError::UnsupportedModificationKind(ref k) if k == "bleep"));
    }

    #[test]
    fn constructors_set_kind() {
        assert_eq!(EditRequest::mute(1.0, 2.0).kind.kind(), ModificationKind::Mute);
        assert_eq!(EditRequest::tone(0.0, 1.0, 440.0).kind.kind(), ModificationKind::Tone);
        let speech = EditRequest::speech(0.5, None, "hi");
        assert_eq!(speech.end_time, None);
        assert_eq!(speech.kind.kind(), ModificationKind::Speech);
    }
}
