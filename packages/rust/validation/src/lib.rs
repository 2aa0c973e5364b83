//! Pre-flight validation of source text and learner preferences.
//!
//! Everything here is pure and synchronous: no capability is touched, so a
//! rejected input costs nothing. The pipeline runs [`validate`] as its first
//! step and refuses to start any stage when the report is not valid.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use learnkit_shared::{LearningStyle, Result, UserPreferences, ValidationConfig};

/// Reading speed used for `estimated_reading_time`, in words per minute.
const READING_WPM: usize = 200;

/// Markup/script patterns that are rejected outright.
static FORBIDDEN_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)<\s*script\b", "script tag"),
        (r"(?i)javascript\s*:", "javascript: URL"),
        (r#"(?i)\bon[a-z]+\s*=\s*["']"#, "inline event handler"),
        (r"(?i)<\s*iframe\b", "iframe tag"),
        (r"(?i)<\s*(object|embed)\b", "embedded object"),
        (r"(?i)data\s*:\s*text/html", "data: HTML URL"),
    ]
    .into_iter()
    .map(|(pattern, label)| (Regex::new(pattern).expect("valid regex"), label))
    .collect()
});

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// Advisory reading-complexity classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Moderate => "moderate",
            Self::Complex => "complex",
        }
    }
}

/// Outcome of validating one block of source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub word_count: usize,
    pub character_count: usize,
    /// Estimated reading time in whole minutes.
    pub estimated_reading_time: usize,
    pub complexity: Complexity,
}

// ---------------------------------------------------------------------------
// SourceContent
// ---------------------------------------------------------------------------

/// Source text that passed validation. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct SourceContent {
    text: String,
    content_hash: String,
    report: ValidationReport,
}

impl SourceContent {
    /// Validate `raw` and wrap it, or hand back the failing report.
    pub fn validate(
        raw: &str,
        config: &ValidationConfig,
    ) -> std::result::Result<Self, ValidationReport> {
        let text = normalize(raw);
        let report = validate_normalized(&text, config);
        if !report.is_valid {
            return Err(report);
        }

        let content_hash = {
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            format!("{:x}", hasher.finalize())
        };

        Ok(Self {
            text,
            content_hash,
            report,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn word_count(&self) -> usize {
        self.report.word_count
    }

    pub fn character_count(&self) -> usize {
        self.report.character_count
    }

    /// Hex SHA-256 of the normalized text.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn report(&self) -> &ValidationReport {
        &self.report
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Validate raw source text against the configured bounds.
pub fn validate(raw: &str, config: &ValidationConfig) -> ValidationReport {
    validate_normalized(&normalize(raw), config)
}

/// Parse raw preference strings into [`UserPreferences`].
pub fn validate_preferences(
    grade_level: &str,
    interest: &str,
    styles: &[String],
) -> Result<UserPreferences> {
    let grade = grade_level.parse()?;
    let interest = interest.parse()?;
    let styles = styles
        .iter()
        .map(|s| s.parse::<LearningStyle>())
        .collect::<Result<Vec<_>>>()?;
    Ok(UserPreferences::new(grade, interest).with_styles(styles))
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Unify line endings and trim surrounding whitespace.
fn normalize(raw: &str) -> String {
    raw.replace("\r\n", "\n").trim().to_string()
}

fn validate_normalized(text: &str, config: &ValidationConfig) -> ValidationReport {
    let character_count = text.chars().count();
    let word_count = text.split_whitespace().count();
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if character_count < config.min_chars {
        errors.push(format!(
            "content is too short: {character_count} characters (minimum {})",
            config.min_chars
        ));
    } else if character_count > config.max_chars {
        errors.push(format!(
            "content is too long: {character_count} characters (maximum {})",
            config.max_chars
        ));
    }

    if word_count < config.min_words {
        errors.push(format!(
            "content has too few words: {word_count} (minimum {})",
            config.min_words
        ));
    } else if word_count > config.max_words {
        errors.push(format!(
            "content has too many words: {word_count} (maximum {})",
            config.max_words
        ));
    }

    if !text.chars().any(char::is_alphanumeric) {
        errors.push("content must contain at least one letter or digit".to_string());
    }

    for (re, label) in FORBIDDEN_PATTERNS.iter() {
        if re.is_match(text) {
            errors.push(format!("content contains a forbidden pattern ({label})"));
        }
    }

    let (complexity, avg_sentence, long_ratio) = classify_complexity(text);
    warnings.push(format!(
        "content complexity is {} ({avg_sentence:.1} words per sentence, {:.0}% long words)",
        complexity.as_str(),
        long_ratio * 100.0
    ));

    let estimated_reading_time = if word_count == 0 {
        0
    } else {
        word_count.div_ceil(READING_WPM)
    };

    debug!(
        character_count,
        word_count,
        errors = errors.len(),
        complexity = complexity.as_str(),
        "validated source content"
    );

    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
        warnings,
        word_count,
        character_count,
        estimated_reading_time,
        complexity,
    }
}

/// Classify by average sentence length and share of words over 6 letters.
///
/// Returns the bucket plus the two measurements it was derived from.
fn classify_complexity(text: &str) -> (Complexity, f64, f64) {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return (Complexity::Simple, 0.0, 0.0);
    }

    let sentences = text
        .split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count()
        .max(1);
    let avg_sentence = words.len() as f64 / sentences as f64;

    let long_words = words
        .iter()
        .filter(|w| w.chars().filter(|c| c.is_alphabetic()).count() > 6)
        .count();
    let long_ratio = long_words as f64 / words.len() as f64;

    let complexity = if avg_sentence > 20.0 || long_ratio > 0.35 {
        Complexity::Complex
    } else if avg_sentence < 12.0 && long_ratio < 0.2 {
        Complexity::Simple
    } else {
        Complexity::Moderate
    };

    (complexity, avg_sentence, long_ratio)
}
