//! Sentence splitting used by the capability backends and stage adapters.

/// Split on terminal punctuation (`.`, `!`, `?`), keeping it, and drop
/// fragments with no letters or digits. Inner whitespace collapses to
/// single spaces.
pub fn sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();

    let push = |fragment: &str, out: &mut Vec<String>| {
        let trimmed = fragment.trim();
        if trimmed.chars().any(char::is_alphanumeric) {
            out.push(trimmed.split_whitespace().collect::<Vec<_>>().join(" "));
        }
    };

    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            push(&current, &mut out);
            current.clear();
        }
    }
    push(&current, &mut out);
    out
}
