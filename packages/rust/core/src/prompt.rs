//! Context strings handed to capability handles.
//!
//! Each stage sends its input text plus a line-oriented context block
//! describing the task and the learner. Backends read it as a system
//! prompt; the offline backend picks out the `Analogy:` line.

use learnkit_shared::{ComplexityBucket, LearningStyle, UserPreferences};

/// Analogies offered per context.
const MAX_ANALOGIES: usize = 2;

/// Tone directive for an audience bucket.
pub fn tone(bucket: ComplexityBucket) -> &'static str {
    match bucket {
        ComplexityBucket::Elementary => {
            "Use short sentences and everyday words. Explain every new term."
        }
        ComplexityBucket::Middle => {
            "Use clear sentences and define technical terms the first time they appear."
        }
        ComplexityBucket::High => {
            "Use precise vocabulary and connect ideas with cause and effect."
        }
        ComplexityBucket::College => {
            "Use academic register and keep domain terminology intact."
        }
    }
}

/// Analogies a stage may weave in for this learner.
pub fn analogies(preferences: &UserPreferences) -> Vec<String> {
    preferences
        .interest
        .analogies()
        .iter()
        .take(MAX_ANALOGIES)
        .map(|a| (*a).to_string())
        .collect()
}

fn audience_lines(preferences: &UserPreferences) -> Vec<String> {
    let bucket = preferences.bucket();
    let mut lines = vec![
        format!(
            "Audience: {} ({} level)",
            preferences.grade_level.display_name(),
            bucket
        ),
        format!("Tone: {}", tone(bucket)),
    ];
    if !preferences.learning_styles.is_empty() {
        let styles: Vec<&str> = preferences
            .learning_styles
            .iter()
            .map(LearningStyle::as_str)
            .collect();
        lines.push(format!("Learning styles: {}", styles.join(", ")));
    }
    lines.push(format!("Interest: {}", preferences.interest.display_name()));
    lines.extend(
        analogies(preferences)
            .into_iter()
            .map(|a| format!("Analogy: {a}")),
    );
    lines
}

fn render(task: &str, extra: Vec<String>, preferences: &UserPreferences) -> String {
    let mut lines = vec![format!("Task: {task}")];
    lines.extend(audience_lines(preferences));
    lines.extend(extra);
    lines.join("\n")
}

pub fn summarize(preferences: &UserPreferences) -> String {
    render(
        "Summarize the text as a short list of key points, one per line starting with \"- \".",
        Vec::new(),
        preferences,
    )
}

pub fn rewrite(preferences: &UserPreferences) -> String {
    render(
        "Rewrite the text for this learner. Keep every fact and relate ideas to their interest.",
        Vec::new(),
        preferences,
    )
}

pub fn extract_structure(preferences: &UserPreferences) -> String {
    render(
        "Name the main topic of the text in one line, starting with \"Main topic:\".",
        Vec::new(),
        preferences,
    )
}

pub fn segment(preferences: &UserPreferences) -> String {
    render(
        "Write brief narrator notes for reading the text aloud, using the analogies where they help.",
        Vec::new(),
        preferences,
    )
}

pub fn author_questions(preferences: &UserPreferences, count: usize) -> String {
    render(
        &format!(
            "Write {count} multiple-choice questions about the text. Format each as \
             \"Q: <question>\", options \"A) ...\" through \"D) ...\", then \"Answer: <letter>\". \
             Frame questions around the learner's interest where it fits."
        ),
        Vec::new(),
        preferences,
    )
}
