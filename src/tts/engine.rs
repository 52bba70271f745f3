//! Speech synthesis engines.
//!
//! Two roles exist:
//!
//! - [`PrimarySynthesizer`] clones the voice of a reference recording.  It
//!   must be loaded before use; see [`crate::tts::spawn_primary_loader`].
//! - [`SecondarySynthesizer`] speaks with a named, parametric voice and is
//!   always available.
//!
//! Both HTTP adapters take their connection details from
//! [`crate::config::TtsConfig`]; nothing is hardcoded.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;

use super::voices::VoiceProfile;
use crate::audio::{decode_wav, encode_wav, to_mono_at, AudioBuffer, SampleFormat};
use crate::config::{PrimaryTtsConfig, SecondaryTtsConfig};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure of a single engine.
#[derive(Debug, Clone, Error)]
pub enum SynthesisError {
    /// The engine is not loaded (or could not be loaded).
    #[error("engine not ready: {0}")]
    NotReady(String),

    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("TTS request timed out")]
    Timeout,

    /// The server answered with a non-success status.
    #[error("TTS server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not decodable audio.
    #[error("could not decode synthesized audio: {0}")]
    Decode(String),

    #[error("engine returned no audio")]
    EmptyAudio,

    #[error("no voice available for language '{0}'")]
    NoVoice(String),
}

impl From<reqwest::Error> for SynthesisError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SynthesisError::Timeout
        } else {
            SynthesisError::Request(e.to_string())
        }
    }
}

/// Every engine was tried and none produced audio.  Terminal; not retried.
#[derive(Debug, Clone)]
pub struct SynthesisFailure {
    /// Why the primary engine was skipped or failed; `None` when it was not
    /// attempted.
    pub primary_error: Option<SynthesisError>,
    pub secondary_error: SynthesisError,
    /// Secondary voice that was attempted, if one was selected.
    pub voice: Option<String>,
}

impl fmt::Display for SynthesisFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "speech synthesis failed: ")?;
        if let Some(primary) = &self.primary_error {
            write!(f, "primary engine: {primary}; ")?;
        }
        write!(f, "secondary engine: {}", self.secondary_error)?;
        if let Some(voice) = &self.voice {
            write!(f, " (voice {voice})")?;
        }
        Ok(())
    }
}

impl std::error::Error for SynthesisFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.secondary_error)
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Voice-cloning engine.
#[async_trait]
pub trait PrimarySynthesizer: Send + Sync {
    /// Prepare the engine.  Called once, from the background loader.
    async fn load(&self) -> Result<(), SynthesisError>;

    /// Speak `text` in the voice of `reference` (or the engine's default
    /// voice when `None`).
    async fn synthesize(
        &self,
        text: &str,
        language: &str,
        reference: Option<&AudioBuffer>,
    ) -> Result<AudioBuffer, SynthesisError>;

    fn name(&self) -> &str {
        "primary"
    }
}

/// Parametric-voice engine.
#[async_trait]
pub trait SecondarySynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        language: &str,
        voice: &VoiceProfile,
    ) -> Result<AudioBuffer, SynthesisError>;

    fn name(&self) -> &str {
        "secondary"
    }
}

fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Read a WAV response body, turning HTTP errors into [`SynthesisError`].
async fn wav_response(response: reqwest::Response) -> Result<AudioBuffer, SynthesisError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SynthesisError::Status {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        });
    }

    let bytes = response.bytes().await?;
    let audio = decode_wav(&bytes).map_err(|e| SynthesisError::Decode(e.to_string()))?;
    if audio.is_empty() {
        return Err(SynthesisError::EmptyAudio);
    }
    Ok(audio)
}

// ---------------------------------------------------------------------------
// CloningHttpEngine
// ---------------------------------------------------------------------------

/// Rate reference recordings are sent at.
const REFERENCE_RATE: u32 = 22_050;

/// Voice-cloning server speaking JSON over HTTP.
///
/// - `GET  {base_url}/health` answers 2xx once the model is in memory.
/// - `POST {base_url}/tts` with `{text, language, speaker_wav}` (reference
///   audio as base64 WAV) answers with WAV bytes.
pub struct CloningHttpEngine {
    client: reqwest::Client,
    base_url: String,
    load_timeout: Duration,
    poll_interval: Duration,
}

impl CloningHttpEngine {
    pub fn from_config(config: &PrimaryTtsConfig) -> Self {
        Self {
            client: http_client(config.timeout_secs),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            load_timeout: Duration::from_secs(config.load_timeout_secs),
            poll_interval: Duration::from_secs(2),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Reference recording as base64 16-bit mono WAV.
    fn encode_reference(reference: &AudioBuffer) -> Result<String, SynthesisError> {
        let mono = AudioBuffer::new(
            to_mono_at(reference, REFERENCE_RATE),
            REFERENCE_RATE,
            1,
            SampleFormat::PCM16,
        );
        let wav = encode_wav(&mono).map_err(|e| SynthesisError::Request(e.to_string()))?;
        Ok(STANDARD.encode(wav))
    }
}

#[async_trait]
impl PrimarySynthesizer for CloningHttpEngine {
    /// Poll the health endpoint until it succeeds or the load timeout passes.
    async fn load(&self) -> Result<(), SynthesisError> {
        let url = format!("{}/health", self.base_url);
        let deadline = tokio::time::Instant::now() + self.load_timeout;

        loop {
            let last = match self.client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => format!("health check returned {}", resp.status()),
                Err(e) => e.to_string(),
            };
            if tokio::time::Instant::now() + self.poll_interval > deadline {
                return Err(SynthesisError::NotReady(last));
            }
            log::debug!("primary TTS not ready yet: {last}");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn synthesize(
        &self,
        text: &str,
        language: &str,
        reference: Option<&AudioBuffer>,
    ) -> Result<AudioBuffer, SynthesisError> {
        let speaker_wav = reference.map(Self::encode_reference).transpose()?;
        let body = serde_json::json!({
            "text":        text,
            "language":    language,
            "speaker_wav": speaker_wav,
        });

        let url = format!("{}/tts", self.base_url);
        let response = self.client.post(&url).json(&body).send().await?;
        wav_response(response).await
    }

    fn name(&self) -> &str {
        "voice-cloning"
    }
}

// ---------------------------------------------------------------------------
// OpenAiSpeechEngine
// ---------------------------------------------------------------------------

/// Any server implementing OpenAI's `/v1/audio/speech` endpoint.
///
/// The `Authorization: Bearer …` header is attached only when an API key is
/// configured, so local servers work without one.
pub struct OpenAiSpeechEngine {
    client: reqwest::Client,
    config: SecondaryTtsConfig,
}

impl OpenAiSpeechEngine {
    pub fn from_config(config: &SecondaryTtsConfig) -> Self {
        Self {
            client: http_client(config.timeout_secs),
            config: config.clone(),
        }
    }
}

#[async_trait]
impl SecondarySynthesizer for OpenAiSpeechEngine {
    async fn synthesize(
        &self,
        text: &str,
        _language: &str,
        voice: &VoiceProfile,
    ) -> Result<AudioBuffer, SynthesisError> {
        let url = format!(
            "{}/v1/audio/speech",
            self.config.base_url.trim_end_matches('/')
        );
        let body = serde_json::json!({
            "model":           self.config.model,
            "input":           text,
            "voice":           voice.name,
            "response_format": "wav",
        });

        let mut req = self.client.post(&url).json(&body);
        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        wav_response(response).await
    }

    fn name(&self) -> &str {
        "openai-speech"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
