//! Timing and call accounting for one pipeline run.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::progress::PipelineStep;

/// Measurements for a single run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    total_time_ms: u64,
    per_step_time_ms: BTreeMap<PipelineStep, u64>,
    external_call_count: u32,
}

impl GenerationStats {
    pub fn total_time(&self) -> Duration {
        Duration::from_millis(self.total_time_ms)
    }

    /// Time spent in `step`, if it ran to completion or failure.
    pub fn step_time(&self, step: PipelineStep) -> Option<Duration> {
        self.per_step_time_ms
            .get(&step)
            .copied()
            .map(Duration::from_millis)
    }

    pub fn steps_timed(&self) -> impl Iterator<Item = (PipelineStep, Duration)> + '_ {
        self.per_step_time_ms
            .iter()
            .map(|(step, ms)| (*step, Duration::from_millis(*ms)))
    }

    /// Number of capability transforms issued during the run.
    pub fn external_call_count(&self) -> u32 {
        self.external_call_count
    }
}

/// Builds a [`GenerationStats`] while the pipeline runs.
pub(crate) struct StatsCollector {
    started: Instant,
    stats: GenerationStats,
}

impl StatsCollector {
    pub(crate) fn start() -> Self {
        Self {
            started: Instant::now(),
            stats: GenerationStats::default(),
        }
    }

    pub(crate) fn record_step(&mut self, step: PipelineStep, elapsed: Duration) {
        self.stats
            .per_step_time_ms
            .insert(step, duration_ms(elapsed));
    }

    pub(crate) fn add_calls(&mut self, calls: u32) {
        self.stats.external_call_count += calls;
    }

    pub(crate) fn elapsed_ms(&self) -> u64 {
        duration_ms(self.started.elapsed())
    }

    pub(crate) fn finish(mut self) -> GenerationStats {
        self.stats.total_time_ms = duration_ms(self.started.elapsed());
        self.stats
    }
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
