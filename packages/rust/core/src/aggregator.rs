//! Final assembly of stage outputs into [`GeneratedMaterials`].

use chrono::Utc;

use learnkit_shared::{RunId, UserPreferences};
use learnkit_validation::SourceContent;

use crate::materials::{GeneratedMaterials, SourceDigest, StageOutputs};

/// Bundle the stage outputs of run `id`. Pure: no I/O, no capability calls.
pub(crate) fn assemble(
    id: RunId,
    preferences: &UserPreferences,
    source: &SourceContent,
    outputs: StageOutputs,
    total_generation_ms: u64,
) -> GeneratedMaterials {
    let digest = SourceDigest {
        word_count: source.word_count(),
        character_count: source.character_count(),
        content_hash: source.content_hash().to_string(),
    };
    GeneratedMaterials::new(
        id,
        Utc::now(),
        preferences.clone(),
        digest,
        outputs,
        total_generation_ms,
    )
}
