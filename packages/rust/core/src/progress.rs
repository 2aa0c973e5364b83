//! Pipeline steps, progress events, and progress sinks.
//!
//! Progress is pushed to a [`ProgressSink`] observer. Percentages come from
//! fixed per-step checkpoints, never from elapsed time, so the emitted
//! sequence is deterministic and can be asserted on in tests.

use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// PipelineStep
// ---------------------------------------------------------------------------

/// One named step of the fixed pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    Validate,
    Summarize,
    Adapt,
    ConceptMap,
    AudioScript,
    Quiz,
    Finalize,
}

impl PipelineStep {
    pub const ALL: [PipelineStep; 7] = [
        Self::Validate,
        Self::Summarize,
        Self::Adapt,
        Self::ConceptMap,
        Self::AudioScript,
        Self::Quiz,
        Self::Finalize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Summarize => "summarize",
            Self::Adapt => "adapt",
            Self::ConceptMap => "concept_map",
            Self::AudioScript => "audio_script",
            Self::Quiz => "quiz",
            Self::Finalize => "finalize",
        }
    }

    /// Human-readable label for progress displays.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Validate => "Validating content",
            Self::Summarize => "Summarizing",
            Self::Adapt => "Personalizing content",
            Self::ConceptMap => "Building concept map",
            Self::AudioScript => "Writing audio script",
            Self::Quiz => "Authoring quiz",
            Self::Finalize => "Assembling materials",
        }
    }

    /// Percent reported when this step completes.
    pub fn checkpoint(&self) -> u8 {
        match self {
            Self::Validate => 10,
            Self::Summarize => 35,
            Self::Adapt => 60,
            Self::ConceptMap => 80,
            Self::AudioScript => 90,
            Self::Quiz => 98,
            Self::Finalize => 100,
        }
    }

    /// Percent reported when this step starts (the previous checkpoint).
    pub fn start_percent(&self) -> u8 {
        match self {
            Self::Validate => 0,
            Self::Summarize => Self::Validate.checkpoint(),
            Self::Adapt => Self::Summarize.checkpoint(),
            Self::ConceptMap => Self::Adapt.checkpoint(),
            Self::AudioScript => Self::ConceptMap.checkpoint(),
            Self::Quiz => Self::AudioScript.checkpoint(),
            Self::Finalize => Self::Quiz.checkpoint(),
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// GenerationProgress
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Error,
}

/// A single progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationProgress {
    pub step: PipelineStep,
    pub status: StepStatus,
    /// 0..=100, non-decreasing within one run.
    pub percent: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Observer receiving every progress event of a run, in order.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, progress: &GenerationProgress);
}

/// No-op sink for headless/test usage.
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn emit(&self, _progress: &GenerationProgress) {}
}

/// Sink that keeps the full emitted sequence.
#[derive(Default)]
pub struct ProgressRecorder {
    events: Mutex<Vec<GenerationProgress>>,
}

impl ProgressRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn events(&self) -> Vec<GenerationProgress> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn percents(&self) -> Vec<u8> {
        self.events().iter().map(|e| e.percent).collect()
    }
}

impl ProgressSink for ProgressRecorder {
    fn emit(&self, progress: &GenerationProgress) {
        if let Ok(mut events) = self.events.lock() {
            events.push(progress.clone());
        }
    }
}

/// Sink forwarding events into an unbounded tokio channel.
///
/// A dropped receiver is not an error: events are discarded.
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<GenerationProgress>,
}

impl ChannelProgress {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<GenerationProgress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn emit(&self, progress: &GenerationProgress) {
        let _ = self.tx.send(progress.clone());
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// Emits step transitions while keeping percentages monotonic.
pub(crate) struct ProgressTracker<'a> {
    sink: &'a dyn ProgressSink,
    last_percent: u8,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(sink: &'a dyn ProgressSink) -> Self {
        Self {
            sink,
            last_percent: 0,
        }
    }

    /// Announce every step as pending at 0%.
    pub(crate) fn announce(&mut self) {
        for step in PipelineStep::ALL {
            self.emit(step, StepStatus::Pending, 0, None, None, None);
        }
    }

    pub(crate) fn started(&mut self, step: PipelineStep, started_at: DateTime<Utc>) {
        self.emit(
            step,
            StepStatus::InProgress,
            step.start_percent(),
            Some(step.label().to_string()),
            Some(started_at),
            None,
        );
    }

    pub(crate) fn completed(
        &mut self,
        step: PipelineStep,
        started_at: DateTime<Utc>,
        message: Option<String>,
    ) {
        self.emit(
            step,
            StepStatus::Completed,
            step.checkpoint(),
            message,
            Some(started_at),
            Some(Utc::now()),
        );
    }

    /// Report a failure at the last emitted percentage.
    pub(crate) fn failed(
        &mut self,
        step: PipelineStep,
        started_at: Option<DateTime<Utc>>,
        message: String,
    ) {
        self.emit(
            step,
            StepStatus::Error,
            self.last_percent,
            Some(message),
            started_at,
            Some(Utc::now()),
        );
    }

    fn emit(
        &mut self,
        step: PipelineStep,
        status: StepStatus,
        percent: u8,
        message: Option<String>,
        started_at: Option<DateTime<Utc>>,
        ended_at: Option<DateTime<Utc>>,
    ) {
        let percent = percent.clamp(self.last_percent, 100);
        self.last_percent = percent;
        self.sink.emit(&GenerationProgress {
            step,
            status,
            percent,
            message,
            started_at,
            ended_at,
        });
    }
}
