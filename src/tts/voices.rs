//! Voice catalogue for the secondary engine.
//!
//! Voices are keyed by primary language subtag and gender.  Lookup rules:
//!
//! | Request | Result |
//! |---------|--------|
//! | supported language, supported gender | that voice |
//! | supported language, no voice of that gender | any voice of the language |
//! | unsupported language | same rules applied to English |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Language used when the requested one has no voices.
pub const FALLBACK_LANGUAGE: &str = "en";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn label(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            other => Err(format!("gender must be 'male' or 'female', got '{other}'")),
        }
    }
}

/// One selectable voice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceProfile {
    /// Engine-specific voice identifier.
    pub name: String,
    /// Primary language subtag, lowercase.
    pub language: String,
    pub gender: Gender,
}

impl VoiceProfile {
    pub fn new(name: impl Into<String>, language: impl Into<String>, gender: Gender) -> Self {
        Self {
            name: name.into(),
            language: primary_subtag(&language.into()),
            gender,
        }
    }
}

/// `"en-US"` → `"en"`, `"pt_BR"` → `"pt"`.
pub fn primary_subtag(language: &str) -> String {
    language
        .split(['-', '_'])
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase()
}

// (language, male, female)
const BUILTIN: &[(&str, &str, &str)] = &[
    ("en", "en-US-GuyNeural", "en-US-JennyNeural"),
    ("de", "de-DE-ConradNeural", "de-DE-KatjaNeural"),
    ("fr", "fr-FR-HenriNeural", "fr-FR-DeniseNeural"),
    ("es", "es-ES-AlvaroNeural", "es-ES-ElviraNeural"),
    ("it", "it-IT-DiegoNeural", "it-IT-ElsaNeural"),
    ("pt", "pt-BR-AntonioNeural", "pt-BR-FranciscaNeural"),
    ("nl", "nl-NL-MaartenNeural", "nl-NL-ColetteNeural"),
    ("pl", "pl-PL-MarekNeural", "pl-PL-ZofiaNeural"),
    ("ru", "ru-RU-DmitryNeural", "ru-RU-SvetlanaNeural"),
    ("ja", "ja-JP-KeitaNeural", "ja-JP-NanamiNeural"),
    ("zh", "zh-CN-YunxiNeural", "zh-CN-XiaoxiaoNeural"),
];

/// Voices available to the secondary engine.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceTable {
    voices: Vec<VoiceProfile>,
}

impl Default for VoiceTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl VoiceTable {
    pub fn new(voices: Vec<VoiceProfile>) -> Self {
        Self { voices }
    }

    /// Neural voice names understood by OpenAI-compatible Edge TTS servers.
    pub fn builtin() -> Self {
        let voices = BUILTIN
            .iter()
            .flat_map(|&(lang, male, female)| {
                [
                    VoiceProfile::new(male, lang, Gender::Male),
                    VoiceProfile::new(female, lang, Gender::Female),
                ]
            })
            .collect();
        Self { voices }
    }

    pub fn voices(&self) -> &[VoiceProfile] {
        &self.voices
    }

    pub fn supports_language(&self, language: &str) -> bool {
        let lang = primary_subtag(language);
        self.voices.iter().any(|v| v.language == lang)
    }

    /// Pick a voice for `language` and `gender`.
    ///
    /// Returns `None` only when neither the language nor English has any
    /// voice.
    pub fn select(&self, language: &str, gender: Gender) -> Option<&VoiceProfile> {
        let requested = primary_subtag(language);
        let lang = if self.supports_language(&requested) {
            requested
        } else {
            log::debug!("no voices for '{language}', using {FALLBACK_LANGUAGE}");
            FALLBACK_LANGUAGE.to_string()
        };

        let mut candidates = self.voices.iter().filter(|v| v.language == lang);
        let exact = self
            .voices
            .iter()
            .find(|v| v.language == lang && v.gender == gender);
        exact.or_else(|| candidates.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_subtag_normalises() {
        assert_eq!(primary_subtag("en-US"), "en");
        assert_eq!(primary_subtag("PT_br"), "pt");
        assert_eq!(primary_subtag("fr"), "fr");
    }

    #[test]
    fn selects_by_language_and_gender() {
        let t = VoiceTable::builtin();
        assert_eq!(t.select("de-DE", Gender::Female).unwrap().name, "de-DE-KatjaNeural");
        assert_eq!(t.select("en", Gender::Male).unwrap().name, "en-US-GuyNeural");
    }

    #[test]
    fn unsupported_language_falls_back_to_english() {
        let t = VoiceTable::builtin();
        let v = t.select("xx-YY", Gender::Female).unwrap();
        assert_eq!(v.language, "en");
        assert_eq!(v.gender, Gender::Female);
    }

    #[test]
    fn missing_gender_uses_any_voice_of_language() {
        let t = VoiceTable::new(vec![
            VoiceProfile::new("only-female", "sv", Gender::Female),
            VoiceProfile::new("en-m", "en", Gender::Male),
        ]);
        assert_eq!(t.select("sv", Gender::Male).unwrap().name, "only-female");
    }

    #[test]
    fn empty_table_selects_nothing() {
        assert!(VoiceTable::new(vec![]).select("en", Gender::Male).is_none());
    }

    #[test]
    fn gender_parses_case_insensitively() {
        assert_eq!("Female".parse::<Gender>().unwrap(), Gender::Female);
        assert!("other".parse::<Gender>().is_err());
    }

    #[test]
    fn builtin_has_both_genders_per_language() {
        let t = VoiceTable::builtin();
        for &(lang, _, _) in BUILTIN {
            for g in [Gender::Male, Gender::Female] {
                assert_eq!(t.select(lang, g).unwrap().gender, g, "{lang}");
            }
        }
    }
}
