//! Rewrite of the source for the learner's level and interest.

use std::time::Instant;

use learnkit_capability::CapabilityKind;
use learnkit_shared::UserPreferences;
use learnkit_validation::SourceContent;

use crate::error::GenerationError;
use crate::materials::{AdaptedContent, GenerationMetadata};
use crate::prompt;
use crate::stages::{CapabilityScope, metadata};

pub(crate) async fn run(
    scope: &mut CapabilityScope<'_>,
    preferences: &UserPreferences,
    source: &SourceContent,
) -> Result<AdaptedContent, GenerationError> {
    let started = Instant::now();
    let output = scope
        .invoke(
            CapabilityKind::Rewrite,
            source.text(),
            &prompt::rewrite(preferences),
        )
        .await?;
    Ok(build(
        &output,
        source.character_count(),
        preferences,
        metadata(preferences, started),
    ))
}

pub(crate) fn build(
    output: &str,
    original_length: usize,
    preferences: &UserPreferences,
    metadata: GenerationMetadata,
) -> AdaptedContent {
    let text = output.trim().to_string();
    let lowered = text.to_lowercase();
    let analogies_used = prompt::analogies(preferences)
        .into_iter()
        .filter(|a| lowered.contains(&a.to_lowercase()))
        .collect();

    AdaptedContent {
        original_length,
        adapted_length: text.chars().count(),
        analogies_used,
        reading_level: preferences.bucket().as_str().to_string(),
        text,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_metadata;
    use learnkit_shared::{GradeLevel, Interest};

    #[test]
    fn records_lengths_and_detected_analogies() {
        let prefs = UserPreferences::new(GradeLevel::Grade4, Interest::Sports);
        let analogy = Interest::Sports.analogies()[0];
        let output = format!("  Plants make food. Think of it {analogy}.  ");

        let adapted = build(&output, 120, &prefs, sample_metadata());
        assert_eq!(adapted.original_length, 120);
        assert_eq!(adapted.adapted_length, adapted.text.chars().count());
        assert_eq!(adapted.analogies_used, vec![analogy.to_string()]);
        assert_eq!(adapted.reading_level, "elementary");
    }

    #[test]
    fn empty_rewrite_is_allowed() {
        let prefs = UserPreferences::new(GradeLevel::Undergrad, Interest::Space);
        let adapted = build("   ", 80, &prefs, sample_metadata());
        assert!(adapted.text.is_empty());
        assert_eq!(adapted.adapted_length, 0);
        assert!(adapted.analogies_used.is_empty());
    }
}
