//! End-to-end generation: validate → summarize → adapt → concept map →
//! audio script → quiz → finalize.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, field, info, instrument, warn};

use learnkit_capability::{CapabilityOptions, CapabilityRegistry};
use learnkit_shared::{RunId, UserPreferences, ValidationConfig};
use learnkit_validation::SourceContent;

use crate::aggregator;
use crate::error::{ErrorKind, GenerationError, StageFailure};
use crate::materials::{GeneratedMaterials, StageOutputs};
use crate::progress::{PipelineStep, ProgressSink, ProgressTracker};
use crate::stages::{self, CapabilityScope};
use crate::stats::{GenerationStats, StatsCollector, duration_ms};

/// Input for one run.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub text: String,
    pub preferences: UserPreferences,
}

impl GenerationRequest {
    pub fn new(text: impl Into<String>, preferences: UserPreferences) -> Self {
        Self {
            text: text.into(),
            preferences,
        }
    }
}

/// Tunables passed through to every stage.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub capability: CapabilityOptions,
}

/// Terminal outcome of a run. Exactly one is produced per [`Pipeline::run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    run_id: RunId,
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    materials: Option<GeneratedMaterials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<StageFailure>,
    stats: GenerationStats,
}

impl GenerationResult {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn materials(&self) -> Option<&GeneratedMaterials> {
        self.materials.as_ref()
    }

    pub fn into_materials(self) -> Option<GeneratedMaterials> {
        self.materials
    }

    pub fn error(&self) -> Option<&StageFailure> {
        self.error.as_ref()
    }

    pub fn stats(&self) -> &GenerationStats {
        &self.stats
    }
}

/// Orchestrates one capability call per stage over an injected registry.
///
/// A `Pipeline` holds no per-run state and can serve concurrent runs.
pub struct Pipeline {
    registry: Arc<dyn CapabilityRegistry>,
    validation: ValidationConfig,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(registry: Arc<dyn CapabilityRegistry>) -> Self {
        Self {
            registry,
            validation: ValidationConfig::default(),
            options: PipelineOptions::default(),
        }
    }

    pub fn with_validation(mut self, validation: ValidationConfig) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Run every step in order.
    ///
    /// Never fails: validation errors, capability failures and
    /// cancellation all come back inside the [`GenerationResult`].
    #[instrument(
        skip_all,
        fields(
            run_id = field::Empty,
            grade = %request.preferences.grade_level,
            interest = %request.preferences.interest,
        )
    )]
    pub async fn run(
        &self,
        request: &GenerationRequest,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> GenerationResult {
        let run_id = RunId::new();
        tracing::Span::current().record("run_id", field::display(run_id));
        info!(chars = request.text.len(), "generation started");

        let mut state = RunState {
            tracker: ProgressTracker::new(progress),
            stats: StatsCollector::start(),
            scope: CapabilityScope::new(self.registry.as_ref(), &self.options.capability, cancel),
            cancel,
            step: PipelineStep::Validate,
            started: None,
        };
        state.tracker.announce();

        let outcome = self.execute(run_id, request, &mut state).await;
        let calls = state.scope.calls();
        state.stats.add_calls(calls);

        match outcome {
            Ok(materials) => {
                let stats = state.stats.finish();
                info!(
                    calls,
                    elapsed_ms = duration_ms(stats.total_time()),
                    "generation complete"
                );
                GenerationResult {
                    run_id,
                    success: true,
                    materials: Some(materials),
                    error: None,
                    stats,
                }
            }
            Err(error) => {
                let failure = state.fail(&error);
                let stats = state.stats.finish();
                if failure.kind == ErrorKind::Aborted {
                    info!(step = %failure.step, calls, "generation cancelled");
                } else {
                    warn!(
                        step = %failure.step,
                        kind = %failure.kind,
                        calls,
                        error = %failure.message,
                        "generation failed"
                    );
                }
                GenerationResult {
                    run_id,
                    success: false,
                    materials: None,
                    error: Some(failure),
                    stats,
                }
            }
        }
    }

    async fn execute(
        &self,
        run_id: RunId,
        request: &GenerationRequest,
        state: &mut RunState<'_>,
    ) -> Result<GeneratedMaterials, GenerationError> {
        let preferences = &request.preferences;

        state.begin(PipelineStep::Validate)?;
        let source = SourceContent::validate(&request.text, &self.validation).map_err(|report| {
            GenerationError::Validation {
                errors: report.errors,
            }
        })?;
        state.complete(Some(format!(
            "{} words, about {} min read",
            source.word_count(),
            source.report().estimated_reading_time
        )));

        state.begin(PipelineStep::Summarize)?;
        let summary = stages::summarize::run(&mut state.scope, preferences, &source).await?;
        state.complete(Some(format!("{} key points", summary.key_points.len())));

        state.begin(PipelineStep::Adapt)?;
        let adapted = stages::adapt::run(&mut state.scope, preferences, &source).await?;
        state.complete(Some(format!("{} characters", adapted.adapted_length)));

        state.begin(PipelineStep::ConceptMap)?;
        let concept_map = stages::concept_map::run(&mut state.scope, preferences, &adapted).await?;
        state.complete(Some(format!("{} concepts", concept_map.nodes.len())));

        state.begin(PipelineStep::AudioScript)?;
        let topic = concept_map
            .root()
            .map(|n| n.label.clone())
            .unwrap_or_default();
        let audio_script =
            stages::audio_script::run(&mut state.scope, preferences, &adapted, &topic).await?;
        state.complete(Some(format!("{} segments", audio_script.segments.len())));

        state.begin(PipelineStep::Quiz)?;
        let quiz =
            stages::quiz::run(&mut state.scope, preferences, &adapted, &summary, &concept_map)
                .await?;
        state.complete(Some(format!("{} questions", quiz.questions.len())));

        state.begin(PipelineStep::Finalize)?;
        let materials = aggregator::assemble(
            run_id,
            preferences,
            &source,
            StageOutputs {
                summary,
                adapted,
                concept_map,
                audio_script,
                quiz,
            },
            state.stats.elapsed_ms(),
        );
        state.complete(None);

        Ok(materials)
    }
}

// ---------------------------------------------------------------------------
// Per-run state
// ---------------------------------------------------------------------------

struct RunState<'a> {
    tracker: ProgressTracker<'a>,
    stats: StatsCollector,
    scope: CapabilityScope<'a>,
    cancel: &'a CancellationToken,
    step: PipelineStep,
    started: Option<(DateTime<Utc>, Instant)>,
}

impl RunState<'_> {
    /// Enter `step` unless the run was cancelled.
    fn begin(&mut self, step: PipelineStep) -> Result<(), GenerationError> {
        self.step = step;
        self.started = None;
        if self.cancel.is_cancelled() {
            return Err(GenerationError::Aborted);
        }
        let now = Utc::now();
        self.started = Some((now, Instant::now()));
        self.tracker.started(step, now);
        Ok(())
    }

    fn complete(&mut self, message: Option<String>) {
        if let Some((started_at, instant)) = self.started.take() {
            let elapsed = instant.elapsed();
            self.stats.record_step(self.step, elapsed);
            self.tracker.completed(self.step, started_at, message);
            debug!(step = %self.step, elapsed_ms = duration_ms(elapsed), "step completed");
        }
    }

    fn fail(&mut self, error: &GenerationError) -> StageFailure {
        let started_at = self.started.take().map(|(started_at, instant)| {
            self.stats.record_step(self.step, instant.elapsed());
            started_at
        });
        let failure = StageFailure::new(self.step, error);
        self.tracker
            .failed(self.step, started_at, failure.message.clone());
        failure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::{ConceptCategory, Difficulty};
    use crate::progress::{ProgressRecorder, SilentProgress, StepStatus};
    use crate::testing::ScriptedRegistry;
    use learnkit_capability::{Availability, CapabilityError, CapabilityKind};
    use learnkit_shared::{GradeLevel, Interest};
    use std::collections::HashSet;

    const LESSON: &str = "Robots use sensors to understand the world around them. \
        Cameras help robots see objects and people. Motors let robots move their arms \
        and wheels. Programmers write code that tells robots what to do next. \
        Many factories use robots to build cars safely.";

    /// 200 characters on a factual topic.
    const SHORT_LESSON: &str = "Robots use sensors to sense the world. \
        Cameras help robots see objects. Motors move their arms and wheels. \
        Programmers write code that tells robots what to do. Factories use robots to build cars fast.";

    fn request(grade: GradeLevel, interest: Interest) -> GenerationRequest {
        GenerationRequest::new(LESSON, UserPreferences::new(grade, interest))
    }

    fn pipeline(registry: ScriptedRegistry) -> Pipeline {
        Pipeline::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn successful_run_produces_materials() {
        let registry = ScriptedRegistry::new();
        let counters = registry.counters();
        let recorder = ProgressRecorder::new();

        assert_eq!(SHORT_LESSON.chars().count(), 200);
        let request = GenerationRequest::new(
            SHORT_LESSON,
            UserPreferences::new(GradeLevel::Grade8, Interest::Technology),
        );

        let result = pipeline(registry)
            .run(&request, &recorder, &CancellationToken::new())
            .await;

        assert!(result.success(), "unexpected failure: {:?}", result.error());
        assert!(result.error().is_none());
        assert_eq!(result.stats().external_call_count(), 5);
        assert_eq!(counters.creates(), 5);
        assert_eq!(counters.disposes(), 5);

        let materials = result.materials().unwrap();
        assert_eq!(materials.id(), result.run_id());
        let quiz = materials.quiz();
        assert_eq!(quiz.questions.len(), 3);
        assert_eq!(quiz.difficulty, Difficulty::Medium);
        assert_eq!(quiz.total_points, 9);
        for question in &quiz.questions {
            assert_eq!(question.difficulty, Difficulty::Medium);
            assert_eq!(question.points, 3);
        }
        assert!(!materials.summary().key_points.is_empty());
        assert!(materials.concept_map().nodes.len() <= 8);
        for step in PipelineStep::ALL {
            assert!(result.stats().step_time(step).is_some(), "{step} not timed");
        }
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_ends_at_100() {
        let recorder = ProgressRecorder::new();
        let result = pipeline(ScriptedRegistry::new())
            .run(
                &request(GradeLevel::Grade5, Interest::Animals),
                &recorder,
                &CancellationToken::new(),
            )
            .await;
        assert!(result.success());

        let percents = recorder.percents();
        assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
        assert_eq!(percents.last(), Some(&100));

        let completed: Vec<(PipelineStep, u8)> = recorder
            .events()
            .into_iter()
            .filter(|e| e.status == StepStatus::Completed)
            .map(|e| (e.step, e.percent))
            .collect();
        let expected: Vec<(PipelineStep, u8)> = PipelineStep::ALL
            .iter()
            .map(|s| (*s, s.checkpoint()))
            .collect();
        assert_eq!(completed, expected);
    }

    #[tokio::test]
    async fn invalid_content_fails_fast() {
        let registry = ScriptedRegistry::new();
        let counters = registry.counters();
        let recorder = ProgressRecorder::new();

        let result = pipeline(registry)
            .run(
                &GenerationRequest::new(
                    "Too short.",
                    UserPreferences::new(GradeLevel::Grade3, Interest::Art),
                ),
                &recorder,
                &CancellationToken::new(),
            )
            .await;

        assert!(!result.success());
        assert!(result.materials().is_none());
        let failure = result.error().unwrap();
        assert_eq!(failure.kind, ErrorKind::Validation);
        assert_eq!(failure.step, PipelineStep::Validate);
        assert!(failure.message.contains("minimum 50"));
        assert_eq!(result.stats().external_call_count(), 0);
        assert_eq!(counters.availability_checks(), 0);
        assert_eq!(counters.creates(), 0);

        let last = recorder.events().pop().unwrap();
        assert_eq!(last.status, StepStatus::Error);
    }

    #[tokio::test]
    async fn unavailable_summarizer_stops_before_any_call() {
        let registry = ScriptedRegistry::new()
            .with_availability(CapabilityKind::Summarize, Availability::Unavailable);
        let counters = registry.counters();

        let result = pipeline(registry)
            .run(
                &request(GradeLevel::Grade9, Interest::Music),
                &SilentProgress,
                &CancellationToken::new(),
            )
            .await;

        let failure = result.error().unwrap();
        assert_eq!(failure.kind, ErrorKind::CapabilityUnavailable);
        assert_eq!(failure.step, PipelineStep::Summarize);
        assert_eq!(result.stats().external_call_count(), 0);
        assert_eq!(counters.creates(), 0);
        assert!(result.materials().is_none());
    }

    #[tokio::test]
    async fn downloading_capability_reports_not_ready() {
        let registry = ScriptedRegistry::new()
            .with_availability(CapabilityKind::ExtractStructure, Availability::NeedsDownload);

        let result = pipeline(registry)
            .run(
                &request(GradeLevel::Grade9, Interest::Music),
                &SilentProgress,
                &CancellationToken::new(),
            )
            .await;

        let failure = result.error().unwrap();
        assert_eq!(failure.kind, ErrorKind::CapabilityNotReady);
        assert_eq!(failure.step, PipelineStep::ConceptMap);
        assert_eq!(result.stats().external_call_count(), 2);
    }

    #[tokio::test]
    async fn first_failure_aborts_remaining_stages() {
        let registry = ScriptedRegistry::new().with_failure(
            CapabilityKind::Rewrite,
            CapabilityError::Transport("connection reset".into()),
        );
        let counters = registry.counters();

        let result = pipeline(registry)
            .run(
                &request(GradeLevel::Grade6, Interest::Cooking),
                &SilentProgress,
                &CancellationToken::new(),
            )
            .await;

        let failure = result.error().unwrap();
        assert_eq!(failure.kind, ErrorKind::Network);
        assert_eq!(failure.step, PipelineStep::Adapt);
        assert_eq!(result.stats().external_call_count(), 2);
        assert_eq!(counters.calls(), 2);
        assert_eq!(counters.creates(), counters.disposes());
        assert!(failure.to_string().starts_with("adapt step failed"));
    }

    #[tokio::test]
    async fn cancellation_after_each_stage() {
        for k in 1..=4 {
            let cancel = CancellationToken::new();
            let registry = ScriptedRegistry::new().cancel_after(k, cancel.clone());
            let counters = registry.counters();

            let result = pipeline(registry)
                .run(
                    &request(GradeLevel::Grade10, Interest::Space),
                    &SilentProgress,
                    &cancel,
                )
                .await;

            assert!(!result.success(), "k={k}");
            assert_eq!(result.error().unwrap().kind, ErrorKind::Aborted, "k={k}");
            assert_eq!(result.stats().external_call_count() as usize, k);
            assert!(result.materials().is_none());
            assert_eq!(counters.creates(), k);
            assert_eq!(counters.disposes(), k);
        }
    }

    #[tokio::test]
    async fn cancellation_during_a_call_aborts_that_step() {
        let steps = [
            PipelineStep::Summarize,
            PipelineStep::Adapt,
            PipelineStep::ConceptMap,
            PipelineStep::AudioScript,
            PipelineStep::Quiz,
        ];
        for (k, step) in steps.into_iter().enumerate() {
            let cancel = CancellationToken::new();
            let registry = ScriptedRegistry::new().cancel_during(k + 1, cancel.clone());
            let counters = registry.counters();
            let recorder = ProgressRecorder::new();

            let result = pipeline(registry)
                .run(
                    &request(GradeLevel::Grade7, Interest::Gaming),
                    &recorder,
                    &cancel,
                )
                .await;

            let failure = result.error().unwrap();
            assert_eq!(failure.kind, ErrorKind::Aborted, "k={k}");
            assert_eq!(failure.step, step, "k={k}");
            assert!(result.materials().is_none());
            assert_eq!(result.stats().external_call_count() as usize, k + 1);
            assert_eq!(counters.calls(), k + 1);
            assert_eq!(counters.creates(), k + 1);
            assert_eq!(counters.disposes(), counters.creates(), "k={k}");
            assert_eq!(
                recorder.events().last().unwrap().status,
                StepStatus::Error,
                "k={k}"
            );
        }
    }

    #[tokio::test]
    async fn cancelled_before_start_makes_no_calls() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let registry = ScriptedRegistry::new();
        let counters = registry.counters();

        let result = pipeline(registry)
            .run(
                &request(GradeLevel::Grade1, Interest::Nature),
                &SilentProgress,
                &cancel,
            )
            .await;

        let failure = result.error().unwrap();
        assert_eq!(failure.kind, ErrorKind::Aborted);
        assert_eq!(failure.step, PipelineStep::Validate);
        assert_eq!(counters.creates(), 0);
    }

    #[tokio::test]
    async fn quiz_scoring_follows_grade() {
        let cases = [
            (GradeLevel::Grade2, Difficulty::Easy, 2),
            (GradeLevel::Grade7, Difficulty::Medium, 3),
            (GradeLevel::Grade11, Difficulty::Hard, 4),
            (GradeLevel::Undergrad, Difficulty::Hard, 4),
        ];
        for (grade, difficulty, points) in cases {
            let result = pipeline(ScriptedRegistry::new())
                .run(
                    &request(grade, Interest::Sports),
                    &SilentProgress,
                    &CancellationToken::new(),
                )
                .await;
            let quiz = result.materials().unwrap().quiz();
            assert_eq!(quiz.difficulty, difficulty, "{grade}");
            assert!(
                quiz.questions
                    .iter()
                    .all(|q| q.difficulty == difficulty && q.points == points),
                "{grade}"
            );
            assert_eq!(quiz.total_points, points * 3);
        }
    }

    #[tokio::test]
    async fn concept_map_and_audio_invariants_hold() {
        let result = pipeline(ScriptedRegistry::new())
            .run(
                &request(GradeLevel::Grade12, Interest::Business),
                &SilentProgress,
                &CancellationToken::new(),
            )
            .await;
        let materials = result.materials().unwrap();

        let map = materials.concept_map();
        let roots: Vec<_> = map
            .nodes
            .iter()
            .filter(|n| n.category == ConceptCategory::MainTopic)
            .collect();
        assert_eq!(roots.len(), 1);
        let ids: HashSet<_> = map.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids.len(), map.nodes.len());
        assert_eq!(map.edges.len(), map.nodes.len() - 1);
        assert!(map.edges.iter().all(|e| ids.contains(e.source.as_str())
            && ids.contains(e.target.as_str())
            && e.target != map.root_id));

        let script = materials.audio_script();
        assert!(!script.segments.is_empty());
        assert_eq!(script.segments[0].start_time, 0.0);
        for pair in script.segments.windows(2) {
            assert_eq!(pair[0].end_time, pair[1].start_time);
        }
        assert_eq!(
            script.segments.last().unwrap().end_time,
            script.total_duration_secs
        );
    }

    #[tokio::test]
    async fn empty_rewrite_still_completes() {
        let registry = ScriptedRegistry::new().with_output(CapabilityKind::Rewrite, "   ");
        let result = pipeline(registry)
            .run(
                &request(GradeLevel::Grade4, Interest::Travel),
                &SilentProgress,
                &CancellationToken::new(),
            )
            .await;

        let materials = result.materials().unwrap();
        assert_eq!(materials.concept_map().nodes.len(), 1);
        assert!(materials.audio_script().segments.is_empty());
        assert_eq!(materials.audio_script().total_duration_secs, 0.0);
        assert_eq!(materials.quiz().questions.len(), 3);
    }

    #[tokio::test]
    async fn result_round_trips_through_json() {
        let result = pipeline(ScriptedRegistry::new())
            .run(
                &request(GradeLevel::Grade8, Interest::Technology),
                &SilentProgress,
                &CancellationToken::new(),
            )
            .await;

        let json = serde_json::to_string(&result).unwrap();
        let back: GenerationResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.run_id(), result.run_id());
        assert!(back.success());
        let (back, original) = (back.materials().unwrap(), result.materials().unwrap());
        assert_eq!(back.quiz().questions, original.quiz().questions);
        assert_eq!(back.source(), original.source());
        assert_eq!(back.summary().key_points, original.summary().key_points);
    }
}
