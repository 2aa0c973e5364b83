//! Key-points summary of the validated source.

use std::time::Instant;

use learnkit_capability::CapabilityKind;
use learnkit_shared::UserPreferences;
use learnkit_validation::SourceContent;

use crate::error::GenerationError;
use crate::materials::{GenerationMetadata, Summary};
use crate::prompt;
use crate::stages::{CapabilityScope, metadata};
use crate::text;

const BULLETS: [char; 4] = ['-', '*', '•', '+'];

pub(crate) async fn run(
    scope: &mut CapabilityScope<'_>,
    preferences: &UserPreferences,
    source: &SourceContent,
) -> Result<Summary, GenerationError> {
    let started = Instant::now();
    let output = scope
        .invoke(
            CapabilityKind::Summarize,
            source.text(),
            &prompt::summarize(preferences),
        )
        .await?;
    Ok(build(&output, metadata(preferences, started)))
}

pub(crate) fn build(output: &str, metadata: GenerationMetadata) -> Summary {
    let text = output.trim().to_string();
    Summary {
        key_points: key_points(&text),
        word_count: text::word_count(&text),
        text,
        metadata,
    }
}

/// Lines that start with a bullet marker, marker stripped.
fn key_points(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.trim_start().strip_prefix(BULLETS))
        .map(str::trim)
        .filter(|point| !point.is_empty())
        .map(str::to_string)
        .collect()
}
