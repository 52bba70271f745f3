//! Time-stamped token sequence produced by a transcriber.
//!
//! A [`Timeline`] is validated on construction: every token has
//! `start_time ≤ end_time`, start times never decrease, and tokens do not
//! overlap beyond [`OVERLAP_TOLERANCE_SECS`] of recognizer jitter.
//!
//! # JSON
//!
//! Tokens use the recognizer's wire names:
//!
//! ```json
//! { "transcript": " the cat", "words": [
//!     { "word": " the", "start_time": 0.0, "end_time": 0.2 },
//!     { "word": " cat", "start_time": 0.2, "end_time": 0.5, "confidence": 0.8 }
//! ] }
//! ```
//!
//! `confidence` is optional and defaults to `0.9`; `transcript` is optional
//! and rebuilt from the words when absent.  A bare array of words is also
//! accepted.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Confidence assumed for tokens whose recognizer reports none.
pub const DEFAULT_CONFIDENCE: f32 = 0.9;

/// Allowed overlap between consecutive tokens (1 ms).
pub const OVERLAP_TOLERANCE_SECS: f64 = 0.001;

fn default_confidence() -> f32 {
    DEFAULT_CONFIDENCE
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// One recognised word with its time span in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    #[serde(rename = "word")]
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

impl Token {
    /// Token with the default confidence.
    pub fn new(text: impl Into<String>, start_time: f64, end_time: f64) -> Self {
        Self {
            text: text.into(),
            start_time,
            end_time,
            confidence: DEFAULT_CONFIDENCE,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Lowercased, whitespace-trimmed text used for exact matching.
    pub fn normalized(&self) -> String {
        self.text.trim().to_lowercase()
    }
}

// ---------------------------------------------------------------------------
// TimelineError
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TimelineError {
    #[error("token {index} has a non-finite time span")]
    NonFinite { index: usize },

    #[error("token {index} ends ({end:.3}s) before it starts ({start:.3}s)")]
    Inverted { index: usize, start: f64, end: f64 },

    #[error("token {index} starts at {start:.3}s, before the previous token ({previous_start:.3}s)")]
    OutOfOrder {
        index: usize,
        start: f64,
        previous_start: f64,
    },

    #[error("token {index} starts at {start:.3}s, inside the previous token ending at {previous_end:.3}s")]
    Overlap {
        index: usize,
        start: f64,
        previous_end: f64,
    },
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

/// Ordered, non-overlapping tokens plus the flat transcript they came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TimelineInput")]
pub struct Timeline {
    transcript: String,
    #[serde(rename = "words")]
    tokens: Vec<Token>,
}

impl Timeline {
    /// Validate `tokens` and derive the transcript from them.
    pub fn new(tokens: Vec<Token>) -> Result<Self, TimelineError> {
        let transcript = join_tokens(&tokens);
        Self::with_transcript(tokens, transcript)
    }

    /// Validate `tokens` and keep an externally supplied transcript.
    pub fn with_transcript(
        tokens: Vec<Token>,
        transcript: impl Into<String>,
    ) -> Result<Self, TimelineError> {
        validate(&tokens)?;
        Ok(Self {
            transcript: transcript.into(),
            tokens,
        })
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// End time of the last token, or `0.0` for an empty timeline.
    pub fn end_time(&self) -> f64 {
        self.tokens.last().map(|t| t.end_time).unwrap_or(0.0)
    }
}

/// Concatenate token texts, inserting a single space only where neither
/// side already carries whitespace at the boundary.
fn join_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        let needs_space = !out.is_empty()
            && !out.ends_with(char::is_whitespace)
            && !token.text.starts_with(char::is_whitespace);
        if needs_space {
            out.push(' ');
        }
        out.push_str(&token.text);
    }
    out
}

fn validate(tokens: &[Token]) -> Result<(), TimelineError> {
    let mut previous: Option<&Token> = None;
    for (index, token) in tokens.iter().enumerate() {
        if !token.start_time.is_finite() || !token.end_time.is_finite() {
            return Err(TimelineError::NonFinite { index });
        }
        if token.start_time > token.end_time {
            return Err(TimelineError::Inverted {
                index,
                start: token.start_time,
                end: token.end_time,
            });
        }
        if let Some(prev) = previous {
            if token.start_time < prev.start_time {
                return Err(TimelineError::OutOfOrder {
                    index,
                    start: token.start_time,
                    previous_start: prev.start_time,
                });
            }
            if token.start_time + OVERLAP_TOLERANCE_SECS < prev.end_time {
                return Err(TimelineError::Overlap {
                    index,
                    start: token.start_time,
                    previous_end: prev.end_time,
                });
            }
        }
        previous = Some(token);
    }
    Ok(())
}

/// Accepted JSON shapes for a timeline.
#[derive(Deserialize)]
#[serde(untagged)]
enum TimelineInput {
    Words(Vec<Token>),
    Full {
        #[serde(default)]
        transcript: Option<String>,
        words: Vec<Token>,
    },
}

impl TryFrom<TimelineInput> for Timeline {
    type Error = TimelineError;

    fn try_from(input: TimelineInput) -> Result<Self, Self::Error> {
        match input {
            TimelineInput::Words(words) => Timeline::new(words),
            TimelineInput::Full {
                transcript: Some(transcript),
                words,
            } => Timeline::with_transcript(words, transcript),
            TimelineInput::Full {
                transcript: None,
                words,
            } => Timeline::new(words),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
