//! Character-offset overlap matching.
//!
//! Works on the flat transcript string rather than the token sequence, so it
//! copes with pipelines that only have an approximate transcript.  The price
//! is fuzziness: a textual hit whose characters are not covered by any
//! indexed token produces no occurrence at all.
//!
//! All offsets count `char`s of the lowercased text.

use super::timeline::{Timeline, Token};
use super::PhraseOccurrence;

/// One place in the transcript where a token's text was found.
#[derive(Debug, Clone, Copy)]
struct IndexEntry<'a> {
    start: usize,
    end: usize,
    token: &'a Token,
}

pub(crate) fn locate(timeline: &Timeline, phrase: &str) -> Vec<PhraseOccurrence> {
    if phrase.trim().is_empty() || timeline.is_empty() {
        return Vec::new();
    }

    let transcript: Vec<char> = timeline.transcript().to_lowercase().chars().collect();
    let needle: Vec<char> = phrase.to_lowercase().chars().collect();
    let index = build_index(&transcript, timeline.tokens());

    find_all(&transcript, &needle)
        .filter_map(|p_start| {
            let p_end = p_start + needle.len();
            let overlapping = index
                .iter()
                .filter(|e| e.end > p_start && e.start < p_end);

            let mut span: Option<(f64, f64)> = None;
            for entry in overlapping {
                let (lo, hi) = span.unwrap_or((entry.token.start_time, entry.token.end_time));
                span = Some((lo.min(entry.token.start_time), hi.max(entry.token.end_time)));
            }
            if span.is_none() {
                log::debug!("phrase hit at char {p_start} overlaps no token");
            }
            span.map(|(start_time, end_time)| PhraseOccurrence {
                start_time,
                end_time,
                confidence: None,
            })
        })
        .collect()
}

/// `true` when the lowercased phrase occurs anywhere in the transcript.
pub(crate) fn occurs_textually(timeline: &Timeline, phrase: &str) -> bool {
    !phrase.trim().is_empty()
        && timeline
            .transcript()
            .to_lowercase()
            .contains(&phrase.to_lowercase())
}

/// Every position of every token's text in the transcript, sorted by start.
fn build_index<'a>(transcript: &[char], tokens: &'a [Token]) -> Vec<IndexEntry<'a>> {
    let mut index = Vec::new();
    for token in tokens {
        let text: Vec<char> = token.text.to_lowercase().chars().collect();
        if text.is_empty() {
            continue;
        }
        for start in find_all(transcript, &text) {
            index.push(IndexEntry {
                start,
                end: start + text.len(),
                token,
            });
        }
    }
    // Stable: entries at the same offset keep token order.
    index.sort_by_key(|e| e.start);
    index
}

/// Start offsets of every (possibly overlapping) occurrence of `needle`.
fn find_all<'a>(haystack: &'a [char], needle: &'a [char]) -> impl Iterator<Item = usize> + 'a {
    let last = if needle.is_empty() || needle.len() > haystack.len() {
        None
    } else {
        Some(haystack.len() - needle.len())
    };
    last.into_iter()
        .flat_map(|last| 0..=last)
        .filter(move |&i| haystack[i..i + needle.len()] == *needle)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
