//! Bag-of-words matching for lesson deduplication.
//!
//! Two concerns are the same lesson when they share at least two
//! significant words, or when one contains the other. This merges some
//! unrelated concerns that share vocabulary and misses paraphrases; both
//! are accepted limitations of the heuristic.

use std::collections::BTreeSet;

/// Shared significant words needed for a match.
pub const MIN_SHARED_WORDS: usize = 2;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "have", "in", "is",
    "it", "its", "of", "on", "or", "that", "the", "this", "to", "was", "were", "with",
];

/// Lowercased words with punctuation stripped and stop-words removed.
pub fn significant_words(text: &str) -> BTreeSet<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric() && c != '_')
                .to_lowercase()
        })
        .filter(|w| !w.is_empty() && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

pub fn shared_word_count(a: &str, b: &str) -> usize {
    significant_words(a)
        .intersection(&significant_words(b))
        .count()
}

/// Near-duplicate test used when recording a concern.
pub fn is_similar(existing: &str, candidate: &str) -> bool {
    let existing_lower = existing.trim().to_lowercase();
    let candidate_lower = candidate.trim().to_lowercase();
    if existing_lower.is_empty() || candidate_lower.is_empty() {
        return false;
    }
    existing_lower.contains(&candidate_lower)
        || candidate_lower.contains(&existing_lower)
        || shared_word_count(existing, candidate) >= MIN_SHARED_WORDS
}

/// Pick a corrective action for `concern` from voter suggestions.
///
/// The suggestion with the most shared words wins when it shares at least
/// two; otherwise the first suggestion is used. With no suggestions the
/// correction restates the concern.
pub fn best_correction(concern: &str, suggestions: &[String]) -> String {
    let best = suggestions
        .iter()
        .map(|s| (shared_word_count(concern, s), s))
        .filter(|(overlap, _)| *overlap >= MIN_SHARED_WORDS)
        // max_by_key keeps the last maximum; reverse so ties go to the first.
        .rev()
        .max_by_key(|(overlap, _)| *overlap)
        .map(|(_, s)| s.clone());

    best.or_else(|| suggestions.first().cloned())
        .unwrap_or_else(|| format!("Address: {concern}"))
}
