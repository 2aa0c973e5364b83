//! Narration script: sentences laid out on a fixed-rate timeline.

use std::time::Instant;

use learnkit_capability::CapabilityKind;
use learnkit_shared::UserPreferences;

use crate::error::GenerationError;
use crate::materials::{AdaptedContent, AudioScript, AudioSegment, GenerationMetadata};
use crate::prompt;
use crate::stages::{CapabilityScope, metadata};
use crate::text;

/// Narration speed.
pub(crate) const WORDS_PER_SECOND: f64 = 2.5;

pub(crate) async fn run(
    scope: &mut CapabilityScope<'_>,
    preferences: &UserPreferences,
    adapted: &AdaptedContent,
    topic: &str,
) -> Result<AudioScript, GenerationError> {
    let started = Instant::now();
    let notes = scope
        .invoke(
            CapabilityKind::Segment,
            &adapted.text,
            &prompt::segment(preferences),
        )
        .await?;
    Ok(build(
        &adapted.text,
        topic,
        &notes,
        metadata(preferences, started),
    ))
}

pub(crate) fn build(
    text: &str,
    topic: &str,
    narrator_notes: &str,
    metadata: GenerationMetadata,
) -> AudioScript {
    let sentences = text::sentences(text);
    let total_duration_secs = if sentences.is_empty() {
        0.0
    } else {
        text::word_count(text) as f64 / WORDS_PER_SECOND
    };

    let count = sentences.len();
    let per_segment = if count == 0 {
        0.0
    } else {
        total_duration_secs / count as f64
    };

    let mut segments = Vec::with_capacity(count);
    let mut start_time = 0.0;
    for (index, sentence) in sentences.into_iter().enumerate() {
        let end_time = if index + 1 == count {
            total_duration_secs
        } else {
            (index + 1) as f64 * per_segment
        };
        segments.push(AudioSegment {
            index,
            word_count: text::word_count(&sentence),
            text: sentence,
            start_time,
            end_time,
        });
        start_time = end_time;
    }

    let full_text = segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    AudioScript {
        title: format!("Listening guide: {topic}"),
        full_text,
        segments,
        total_duration_secs,
        words_per_second: WORDS_PER_SECOND,
        narrator_notes: narrator_notes.trim().to_string(),
        metadata,
    }
}
