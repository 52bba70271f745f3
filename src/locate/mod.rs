//! Phrase location inside a time-stamped transcript.
//!
//! # Strategies
//!
//! | Strategy | Matches on | Overlapping hits | Confidence |
//! |----------|------------|------------------|------------|
//! | [`MatchStrategy::TokenSequence`] (default) | exact lowercase token words | no, scan skips past a match | mean of the window |
//! | [`MatchStrategy::CharacterOverlap`] | substring of the flat transcript | yes, cursor advances one char | none |
//!
//! The two strategies answer different questions and are kept separate:
//! `TokenSequence` never matches inside a word, `CharacterOverlap` maps any
//! textual hit back onto whichever tokens its characters touch.
//!
//! # Example
//!
//! ```rust
//! use sound_filter::locate::{PhraseLocator, Timeline, Token};
//!
//! let timeline = Timeline::new(vec![
//!     Token::new("the", 0.0, 0.2),
//!     Token::new("cat", 0.2, 0.5),
//!     Token::new("sat", 0.5, 0.8),
//! ])
//! .unwrap();
//!
//! let hits = PhraseLocator::default().locate(&timeline, "The Cat");
//! assert_eq!(hits.len(), 1);
//! assert_eq!((hits[0].start_time, hits[0].end_time), (0.0, 0.5));
//! ```

pub mod character;
pub mod sequence;
pub mod timeline;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use timeline::{Timeline, TimelineError, Token, DEFAULT_CONFIDENCE};

/// A located phrase, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseOccurrence {
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

// ---------------------------------------------------------------------------
// MatchStrategy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Substring search on the transcript mapped back to token spans.
    CharacterOverlap,
    /// Exact, non-overlapping word-sequence match.
    #[default]
    TokenSequence,
}

impl MatchStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            MatchStrategy::CharacterOverlap => "character_overlap",
            MatchStrategy::TokenSequence => "token_sequence",
        }
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MatchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "character_overlap" | "character" | "overlap" => Ok(MatchStrategy::CharacterOverlap),
            "token_sequence" | "sequence" | "tokens" => Ok(MatchStrategy::TokenSequence),
            other => Err(format!("unknown match strategy: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// PhraseLocator
// ---------------------------------------------------------------------------

/// Finds every occurrence of a phrase in a [`Timeline`].
///
/// Pure and deterministic; no I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhraseLocator {
    strategy: MatchStrategy,
}

impl PhraseLocator {
    pub fn new(strategy: MatchStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    /// Occurrences of `phrase` in ascending `start_time` order.
    ///
    /// Case-insensitive.  An empty phrase or timeline gives an empty result.
    pub fn locate(&self, timeline: &Timeline, phrase: &str) -> Vec<PhraseOccurrence> {
        match self.strategy {
            MatchStrategy::CharacterOverlap => character::locate(timeline, phrase),
            MatchStrategy::TokenSequence => sequence::locate(timeline, phrase),
        }
    }

    /// Whether the phrase counts as found.
    ///
    /// Under [`MatchStrategy::CharacterOverlap`] a textual hit in the
    /// transcript counts even when it aligned with no token.
    pub fn is_found(&self, timeline: &Timeline, phrase: &str, occurrences: &[PhraseOccurrence]) -> bool {
        if !occurrences.is_empty() {
            return true;
        }
        match self.strategy {
            MatchStrategy::CharacterOverlap => character::occurs_textually(timeline, phrase),
            MatchStrategy::TokenSequence => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
