//! Transcription parameter types and result types.
//!
//! [`TranscribeParams`] carries the settings for one Whisper inference run.
//! [`TranscriptionResult`] is what every [`crate::stt::Transcriber`] returns.

use serde::Serialize;

use crate::locate::Timeline;

// ---------------------------------------------------------------------------
// SamplingStrategy
// ---------------------------------------------------------------------------

/// Mirrors `whisper_rs::SamplingStrategy` but is owned and `Clone`.
#[derive(Debug, Clone, PartialEq)]
pub enum SamplingStrategy {
    Greedy {
        best_of: i32,
    },
    BeamSearch {
        beam_size: i32,
        patience: f32,
    },
}

impl Default for SamplingStrategy {
    fn default() -> Self {
        Self::Greedy { best_of: 1 }
    }
}

// ---------------------------------------------------------------------------
// TranscribeParams
// ---------------------------------------------------------------------------

/// All parameters for a single Whisper transcription run.
///
/// ```
/// use sound_filter::stt::TranscribeParams;
///
/// let params = TranscribeParams {
///     language: "de".into(),
///     ..TranscribeParams::default()
/// };
/// assert_eq!(params.whisper_language(), Some("de"));
/// ```
#[derive(Debug, Clone)]
pub struct TranscribeParams {
    /// Language tag (`"en"`, `"en-US"`), or `"auto"` to let Whisper detect it.
    pub language: String,
    pub strategy: SamplingStrategy,
    /// CPU threads handed to Whisper.  Defaults to [`optimal_threads()`].
    pub n_threads: i32,
    pub use_gpu: bool,
    /// Suppress Whisper's progress output to stderr.
    pub suppress_progress: bool,
}

impl Default for TranscribeParams {
    fn default() -> Self {
        Self {
            language: "auto".into(),
            strategy: SamplingStrategy::default(),
            n_threads: optimal_threads(),
            use_gpu: false,
            suppress_progress: true,
        }
    }
}

impl TranscribeParams {
    /// Primary language subtag for Whisper (`"en-US"` → `"en"`), or `None`
    /// for automatic detection.
    pub fn whisper_language(&self) -> Option<&str> {
        let primary = self.language.split(['-', '_']).next().unwrap_or("").trim();
        if primary.is_empty() || primary.eq_ignore_ascii_case("auto") {
            None
        } else {
            Some(primary)
        }
    }
}

/// Number of CPU threads to use for inference, capped at 8.
pub(crate) fn optimal_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8) as i32)
        .unwrap_or(4)
}

// ---------------------------------------------------------------------------
// TranscriptionResult
// ---------------------------------------------------------------------------

/// Word-level transcription of one recording.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptionResult {
    #[serde(flatten)]
    pub timeline: Timeline,
    /// Language the recogniser used or detected, when known.
    pub detected_language: Option<String>,
    /// Wall-clock time the inference took, in seconds.
    pub processing_time: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locate::Token;

    #[test]
    fn region_subtag_is_dropped() {
        let p = TranscribeParams {
            language: "en-US".into(),
            ..TranscribeParams::default()
        };
        assert_eq!(p.whisper_language(), Some("en"));
    }

    #[test]
    fn auto_and_empty_mean_detect() {
        for language in ["auto", "AUTO", ""] {
            let p = TranscribeParams {
                language: language.into(),
                ..TranscribeParams::default()
            };
            assert_eq!(p.whisper_language(), None, "{language:?}");
        }
    }

    #[test]
    fn optimal_threads_is_positive_and_at_most_8() {
        let t = optimal_threads();
        assert!((1..=8).contains(&t));
    }

    #[test]
    fn result_serializes_flat() {
        let result = TranscriptionResult {
            timeline: Timeline::new(vec![Token::new("hi", 0.0, 0.4)]).unwrap(),
            detected_language: Some("en".into()),
            processing_time: 0.012,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["transcript"], "hi");
        assert_eq!(json["words"][0]["word"], "hi");
        assert_eq!(json["detected_language"], "en");
        assert_eq!(json["processing_time"], 0.012);
    }
}
