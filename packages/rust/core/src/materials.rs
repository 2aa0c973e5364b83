//! The generated learning-materials bundle and its parts.
//!
//! Stage outputs are plain data. [`GeneratedMaterials`] is only built by the
//! aggregator and exposes read-only accessors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use learnkit_shared::{GradeLevel, Interest, RunId, UserPreferences};

/// Schema version stamped on every bundle.
pub const MATERIALS_SCHEMA_VERSION: &str = "1.0";

/// Provenance recorded on every stage output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub generated_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub grade_level: GradeLevel,
    pub interest: Interest,
}

// ---------------------------------------------------------------------------
// Stage outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub text: String,
    pub key_points: Vec<String>,
    pub word_count: usize,
    pub metadata: GenerationMetadata,
}

/// Source text rewritten for the learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptedContent {
    pub text: String,
    /// Character count of the validated source.
    pub original_length: usize,
    /// Character count of the rewrite.
    pub adapted_length: usize,
    pub analogies_used: Vec<String>,
    /// Complexity bucket the text was written for.
    pub reading_level: String,
    pub metadata: GenerationMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptCategory {
    MainTopic,
    Subtopic,
    Example,
    Definition,
    Process,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptNode {
    pub id: String,
    pub label: String,
    /// 0 for the root, 1 for its children.
    pub level: u8,
    pub category: ConceptCategory,
    /// 1..=10, higher is more important.
    pub importance: u8,
    /// Occurrences in the adapted text.
    pub frequency: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptEdge {
    pub source: String,
    pub target: String,
    pub relationship: String,
    pub weight: f64,
}

/// A tree of concepts with exactly one root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptMap {
    pub root_id: String,
    pub nodes: Vec<ConceptNode>,
    pub edges: Vec<ConceptEdge>,
    /// Structural overview returned by the capability.
    pub overview: String,
    pub metadata: GenerationMetadata,
}

impl ConceptMap {
    pub fn root(&self) -> Option<&ConceptNode> {
        self.nodes.iter().find(|n| n.id == self.root_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSegment {
    pub index: usize,
    pub text: String,
    /// Seconds from the start of the script.
    pub start_time: f64,
    pub end_time: f64,
    pub word_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioScript {
    pub title: String,
    pub full_text: String,
    pub segments: Vec<AudioSegment>,
    pub total_duration_secs: f64,
    pub words_per_second: f64,
    pub narrator_notes: String,
    pub metadata: GenerationMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizOption {
    pub id: String,
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: String,
    pub prompt: String,
    pub options: Vec<QuizOption>,
    pub points: u32,
    pub difficulty: Difficulty,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl QuizQuestion {
    pub fn correct_option(&self) -> Option<&QuizOption> {
        self.options.iter().find(|o| o.is_correct)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub questions: Vec<QuizQuestion>,
    pub total_points: u32,
    pub difficulty: Difficulty,
    pub metadata: GenerationMetadata,
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// Counts and hash of the validated source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDigest {
    pub word_count: usize,
    pub character_count: usize,
    pub content_hash: String,
}

/// Everything one successful run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedMaterials {
    schema_version: String,
    id: RunId,
    generated_at: DateTime<Utc>,
    preferences: UserPreferences,
    source: SourceDigest,
    summary: Summary,
    adapted: AdaptedContent,
    concept_map: ConceptMap,
    audio_script: AudioScript,
    quiz: Quiz,
    total_generation_ms: u64,
}

/// The five stage outputs, in pipeline order.
pub(crate) struct StageOutputs {
    pub summary: Summary,
    pub adapted: AdaptedContent,
    pub concept_map: ConceptMap,
    pub audio_script: AudioScript,
    pub quiz: Quiz,
}

impl GeneratedMaterials {
    pub(crate) fn new(
        id: RunId,
        generated_at: DateTime<Utc>,
        preferences: UserPreferences,
        source: SourceDigest,
        outputs: StageOutputs,
        total_generation_ms: u64,
    ) -> Self {
        Self {
            schema_version: MATERIALS_SCHEMA_VERSION.to_string(),
            id,
            generated_at,
            preferences,
            source,
            summary: outputs.summary,
            adapted: outputs.adapted,
            concept_map: outputs.concept_map,
            audio_script: outputs.audio_script,
            quiz: outputs.quiz,
            total_generation_ms,
        }
    }

    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn preferences(&self) -> &UserPreferences {
        &self.preferences
    }

    pub fn source(&self) -> &SourceDigest {
        &self.source
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn adapted(&self) -> &AdaptedContent {
        &self.adapted
    }

    pub fn concept_map(&self) -> &ConceptMap {
        &self.concept_map
    }

    pub fn audio_script(&self) -> &AudioScript {
        &self.audio_script
    }

    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    /// Wall time from validation to assembly, in milliseconds.
    pub fn total_generation_ms(&self) -> u64 {
        self.total_generation_ms
    }
}
