//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every section is `#[serde(default)]`: a `settings.toml` only needs the
//! keys it wants to override.
//!
//! ```toml
//! [stt]
//! model = "small"
//! language = "en-US"
//!
//! [locator]
//! strategy = "token_sequence"
//!
//! [tts.secondary]
//! base_url = "https://api.openai.com"
//! api_key = "sk-..."
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::audio::{OutputFormat, DEFAULT_TOLERANCE_MS};
use crate::locate::MatchStrategy;
use crate::tts::EnginePreference;

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Settings for the Whisper transcriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Registry id (`"base"`, `"small"`, ...) or a path to a GGML file.
    pub model: String,
    /// Language tag (`"en-US"`), or `"auto"` for Whisper's detection.
    pub language: String,
    pub use_gpu: bool,
    /// Inference threads; `None` picks a value from the CPU count.
    pub threads: Option<i32>,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: "base".into(),
            language: "en-US".into(),
            use_gpu: false,
            threads: None,
        }
    }
}

// ---------------------------------------------------------------------------
// LocatorConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    pub strategy: MatchStrategy,
}

// ---------------------------------------------------------------------------
// EditConfig
// ---------------------------------------------------------------------------

/// Settings for segment editing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditConfig {
    /// Acceptable deviation when fitting speech to a window.
    pub tolerance_ms: f64,
    /// Tone frequency used when a tone edit names none.
    pub default_tone_hz: f64,
    /// Container written when the caller names none.
    pub output_format: OutputFormat,
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            tolerance_ms: DEFAULT_TOLERANCE_MS,
            default_tone_hz: 1_000.0,
            output_format: OutputFormat::Wav,
        }
    }
}

// ---------------------------------------------------------------------------
// TtsConfig
// ---------------------------------------------------------------------------

/// Voice-cloning engine reached over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimaryTtsConfig {
    /// Load the engine at startup.  When `false` it stays `Unloaded` and
    /// every request goes to the secondary engine.
    pub enabled: bool,
    pub base_url: String,
    /// Per-request timeout for synthesis calls.
    pub timeout_secs: u64,
    /// How long the startup loader waits for the engine to become healthy.
    pub load_timeout_secs: u64,
}

impl Default for PrimaryTtsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:8020".into(),
            timeout_secs: 120,
            load_timeout_secs: 300,
        }
    }
}

/// Parametric voice engine speaking the OpenAI `/v1/audio/speech` format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecondaryTtsConfig {
    pub base_url: String,
    /// `None` for local servers that need no authentication.
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for SecondaryTtsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".into(),
            api_key: None,
            model: "tts-1".into(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Language used when a speech edit names none.
    pub default_language: String,
    pub default_engine: EnginePreference,
    pub primary: PrimaryTtsConfig,
    pub secondary: SecondaryTtsConfig,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            default_language: "en".into(),
            default_engine: EnginePreference::Auto,
            primary: PrimaryTtsConfig::default(),
            secondary: SecondaryTtsConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// CodecConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Explicit FFmpeg binary.  `None` looks next to the executable, then on
    /// `PATH`.
    pub ffmpeg_path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use sound_filter::config::AppConfig;
///
/// // Returns Default when the file is missing.
/// let config = AppConfig::load().unwrap();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub stt: SttConfig,
    pub locator: LocatorConfig,
    pub edit: EditConfig,
    pub tts: TtsConfig,
    pub codec: CodecConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path; a missing file yields the defaults.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original, loaded);
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.stt.model, "base");
        assert_eq!(cfg.locator.strategy, MatchStrategy::TokenSequence);
        assert_eq!(cfg.edit.tolerance_ms, 10.0);
        assert_eq!(cfg.edit.output_format, OutputFormat::Wav);
        assert_eq!(cfg.tts.default_engine, EnginePreference::Auto);
        assert!(cfg.tts.primary.enabled);
        assert!(cfg.tts.secondary.api_key.is_none());
        assert!(cfg.codec.ffmpeg_path.is_none());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(
            &path,
            "[locator]\nstrategy = \"character_overlap\"\n\n[tts.secondary]\napi_key = \"sk-test\"\n",
        )
        .unwrap();

        let cfg = AppConfig::load_from(&path).expect("load");
        assert_eq!(cfg.locator.strategy, MatchStrategy::CharacterOverlap);
        assert_eq!(cfg.tts.secondary.api_key.as_deref(), Some("sk-test"));
        assert_eq!(cfg.tts.secondary.model, "tts-1");
        assert_eq!(cfg.stt, SttConfig::default());
    }

    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.stt.language = "de".into();
        cfg.stt.threads = Some(2);
        cfg.edit.output_format = OutputFormat::Mp3;
        cfg.tts.default_engine = EnginePreference::Secondary;
        cfg.tts.primary.enabled = false;
        cfg.codec.ffmpeg_path = Some(PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[edit]\ntolerance_ms = \"ten\"\n").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("bad.toml"));
    }
}
