//! Generation pipeline orchestration for LearnKit.
//!
//! This crate turns validated source text plus learner preferences into a
//! [`GeneratedMaterials`] bundle: summary, personalized rewrite, concept
//! map, audio script, and quiz. The [`Pipeline`] sequences one capability
//! call per stage, reports progress, honors cancellation, and folds every
//! failure into a single [`GenerationResult`].

mod aggregator;
pub mod error;
pub mod materials;
pub mod pipeline;
pub mod progress;
pub mod prompt;
mod stages;
pub mod stats;
mod text;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ErrorKind, GenerationError, StageFailure, classify};
pub use materials::{
    AdaptedContent, AudioScript, AudioSegment, ConceptCategory, ConceptEdge, ConceptMap,
    ConceptNode, Difficulty, GeneratedMaterials, GenerationMetadata, MATERIALS_SCHEMA_VERSION,
    Quiz, QuizOption, QuizQuestion, SourceDigest, Summary,
};
pub use pipeline::{GenerationRequest, GenerationResult, Pipeline, PipelineOptions};
pub use progress::{
    ChannelProgress, GenerationProgress, PipelineStep, ProgressRecorder, ProgressSink,
    SilentProgress, StepStatus,
};
pub use stats::GenerationStats;
