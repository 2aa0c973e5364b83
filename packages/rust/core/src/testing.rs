//! Scripted capability registry for pipeline tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use learnkit_capability::{
    Availability, CapabilityError, CapabilityHandle, CapabilityKind, CapabilityOptions,
    CapabilityRegistry, OfflineCapabilityRegistry,
};
use learnkit_shared::{GradeLevel, Interest};

use crate::materials::GenerationMetadata;

pub(crate) fn sample_metadata() -> GenerationMetadata {
    GenerationMetadata {
        generated_at: Utc::now(),
        duration_ms: 0,
        grade_level: GradeLevel::Grade8,
        interest: Interest::Science,
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    availability_checks: AtomicUsize,
    creates: AtomicUsize,
    calls: AtomicUsize,
    disposes: AtomicUsize,
}

impl Counters {
    pub(crate) fn availability_checks(&self) -> usize {
        self.availability_checks.load(Ordering::SeqCst)
    }

    pub(crate) fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn disposes(&self) -> usize {
        self.disposes.load(Ordering::SeqCst)
    }
}

/// Registry that answers with offline heuristics unless told otherwise.
#[derive(Default)]
pub(crate) struct ScriptedRegistry {
    availability: HashMap<CapabilityKind, Availability>,
    outputs: HashMap<CapabilityKind, String>,
    failures: HashMap<CapabilityKind, CapabilityError>,
    cancel_after: Option<(usize, CancellationToken)>,
    cancel_during: Option<(usize, CancellationToken)>,
    counters: Arc<Counters>,
}

impl ScriptedRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_availability(mut self, kind: CapabilityKind, availability: Availability) -> Self {
        self.availability.insert(kind, availability);
        self
    }

    pub(crate) fn with_output(mut self, kind: CapabilityKind, output: &str) -> Self {
        self.outputs.insert(kind, output.to_string());
        self
    }

    pub(crate) fn with_failure(mut self, kind: CapabilityKind, error: CapabilityError) -> Self {
        self.failures.insert(kind, error);
        self
    }

    /// Cancel `token` once `calls` transforms have completed.
    pub(crate) fn cancel_after(mut self, calls: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((calls, token));
        self
    }

    /// Cancel `token` while transform number `call` is in flight; that
    /// call then reports [`CapabilityError::Cancelled`].
    pub(crate) fn cancel_during(mut self, call: usize, token: CancellationToken) -> Self {
        self.cancel_during = Some((call, token));
        self
    }

    pub(crate) fn counters(&self) -> Arc<Counters> {
        Arc::clone(&self.counters)
    }
}

#[async_trait]
impl CapabilityRegistry for ScriptedRegistry {
    async fn availability(&self, kind: CapabilityKind) -> Availability {
        self.counters
            .availability_checks
            .fetch_add(1, Ordering::SeqCst);
        self.availability
            .get(&kind)
            .copied()
            .unwrap_or(Availability::Ready)
    }

    async fn create(
        &self,
        kind: CapabilityKind,
        options: &CapabilityOptions,
    ) -> Result<Box<dyn CapabilityHandle>, CapabilityError> {
        let inner = OfflineCapabilityRegistry::new().create(kind, options).await?;
        self.counters.creates.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedHandle {
            kind,
            inner,
            output: self.outputs.get(&kind).cloned(),
            failure: self.failures.get(&kind).cloned(),
            cancel_after: self.cancel_after.clone(),
            cancel_during: self.cancel_during.clone(),
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct ScriptedHandle {
    kind: CapabilityKind,
    inner: Box<dyn CapabilityHandle>,
    output: Option<String>,
    failure: Option<CapabilityError>,
    cancel_after: Option<(usize, CancellationToken)>,
    cancel_during: Option<(usize, CancellationToken)>,
    counters: Arc<Counters>,
}

#[async_trait]
impl CapabilityHandle for ScriptedHandle {
    fn kind(&self) -> CapabilityKind {
        self.kind
    }

    async fn transform(
        &mut self,
        input: &str,
        context: &str,
        cancel: &CancellationToken,
    ) -> Result<String, CapabilityError> {
        let done = self.counters.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some((during, token)) = &self.cancel_during {
            if done == *during {
                token.cancel();
                tokio::task::yield_now().await;
                if cancel.is_cancelled() {
                    return Err(CapabilityError::Cancelled);
                }
            }
        }

        let outcome = if let Some(error) = &self.failure {
            Err(error.clone())
        } else if let Some(output) = &self.output {
            Ok(output.clone())
        } else {
            self.inner.transform(input, context, cancel).await
        };

        if let Some((after, token)) = &self.cancel_after {
            if done >= *after {
                token.cancel();
            }
        }
        outcome
    }

    async fn dispose(self: Box<Self>) {
        self.counters.disposes.fetch_add(1, Ordering::SeqCst);
        self.inner.dispose().await;
    }
}
