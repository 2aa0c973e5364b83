//! Small text utilities shared by the stage adapters.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

pub(crate) use learnkit_shared::text::sentences;

/// Words that never become concepts.
static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "about", "above", "after", "again", "against", "all", "also", "among", "and", "any",
        "are", "around", "because", "been", "before", "being", "below", "between", "both",
        "but", "can", "could", "did", "does", "doing", "down", "during", "each", "even",
        "every", "few", "for", "from", "further", "had", "has", "have", "having", "her",
        "here", "hers", "herself", "him", "himself", "his", "how", "into", "its", "itself",
        "just", "like", "made", "make", "makes", "many", "may", "more", "most", "much",
        "must", "not", "now", "off", "once", "one", "only", "other", "our", "ours", "out",
        "over", "own", "same", "she", "should", "some", "such", "than", "that", "the",
        "their", "theirs", "them", "then", "there", "these", "they", "think", "this",
        "those", "through", "too", "under", "until", "use", "used", "uses", "using", "very",
        "was", "way", "were", "what", "when", "where", "which", "while", "who", "whom",
        "why", "will", "with", "within", "without", "would", "you", "your", "yours",
    ]
    .into_iter()
    .collect()
});

/// Minimum token length considered for concepts.
const MIN_TOKEN_LEN: usize = 3;

/// Number of whitespace-separated words.
pub(crate) fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Lowercased content tokens, stop words removed.
pub(crate) fn content_tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .map(str::to_lowercase)
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .filter(|t| !STOP_WORDS.contains(t.as_str()))
        .collect()
}

/// Tokens ranked by frequency, ties broken by first appearance.
///
/// Returns `(token, count)` pairs, at most `limit` of them.
pub(crate) fn rank_by_frequency(tokens: &[String], limit: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, token) in tokens.iter().enumerate() {
        counts
            .entry(token.as_str())
            .and_modify(|(count, _)| *count += 1)
            .or_insert((1, position));
    }

    let mut ranked: Vec<(&str, usize, usize)> = counts
        .into_iter()
        .map(|(token, (count, first))| (token, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    ranked
        .into_iter()
        .take(limit)
        .map(|(token, count, _)| (token.to_string(), count))
        .collect()
}

/// Uppercase the first character.
pub(crate) fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
