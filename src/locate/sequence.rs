//! Exact token-sequence matching.

use super::timeline::Timeline;
use super::PhraseOccurrence;

pub(crate) fn locate(timeline: &Timeline, phrase: &str) -> Vec<PhraseOccurrence> {
    let words: Vec<String> = phrase.split_whitespace().map(str::to_lowercase).collect();
    let tokens = timeline.tokens();
    if words.is_empty() || tokens.len() < words.len() {
        return Vec::new();
    }

    let normalized: Vec<String> = tokens.iter().map(|t| t.normalized()).collect();
    let width = words.len();
    let mut occurrences = Vec::new();
    let mut i = 0;

    while i + width <= tokens.len() {
        if normalized[i..i + width] == words[..] {
            let window = &tokens[i..i + width];
            let confidence = window.iter().map(|t| t.confidence).sum::<f32>() / width as f32;
            occurrences.push(PhraseOccurrence {
                start_time: window[0].start_time,
                end_time: window[width - 1].end_time,
                confidence: Some(confidence),
            });
            i += width;
        } else {
            i += 1;
        }
    }
    occurrences
}
