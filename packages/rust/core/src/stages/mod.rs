//! Stage adapters and the capability scope they call through.
//!
//! An adapter builds its context string, makes exactly one capability
//! call via [`CapabilityScope::invoke`], and turns the output into its
//! stage type. Failures are classified by the scope, never by adapters.

pub(crate) mod adapt;
pub(crate) mod audio_script;
pub(crate) mod concept_map;
pub(crate) mod quiz;
pub(crate) mod summarize;

use std::collections::HashSet;
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use learnkit_capability::{Availability, CapabilityKind, CapabilityOptions, CapabilityRegistry};
use learnkit_shared::UserPreferences;

use crate::error::{GenerationError, classify};
use crate::materials::GenerationMetadata;
use crate::stats::duration_ms;

/// Per-run access to the capability registry.
///
/// Availability is checked once per kind, before its first use. Every
/// handle created here is disposed before `invoke` returns.
pub(crate) struct CapabilityScope<'a> {
    registry: &'a dyn CapabilityRegistry,
    options: &'a CapabilityOptions,
    cancel: &'a CancellationToken,
    checked: HashSet<CapabilityKind>,
    calls: u32,
}

impl<'a> CapabilityScope<'a> {
    pub(crate) fn new(
        registry: &'a dyn CapabilityRegistry,
        options: &'a CapabilityOptions,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            registry,
            options,
            cancel,
            checked: HashSet::new(),
            calls: 0,
        }
    }

    /// Transform calls attempted so far.
    pub(crate) fn calls(&self) -> u32 {
        self.calls
    }

    pub(crate) async fn invoke(
        &mut self,
        kind: CapabilityKind,
        input: &str,
        context: &str,
    ) -> Result<String, GenerationError> {
        if !self.checked.contains(&kind) {
            match self.registry.availability(kind).await {
                Availability::Ready => {}
                Availability::NeedsDownload => {
                    return Err(GenerationError::CapabilityNotReady { kind });
                }
                Availability::Unavailable => {
                    return Err(GenerationError::CapabilityUnavailable { kind });
                }
            }
            self.checked.insert(kind);
        }

        let mut handle = self
            .registry
            .create(kind, self.options)
            .await
            .map_err(|e| classify(&e))?;

        self.calls += 1;
        let started = Instant::now();
        let outcome = handle.transform(input, context, self.cancel).await;
        handle.dispose().await;

        debug!(
            %kind,
            input_chars = input.len(),
            elapsed_ms = duration_ms(started.elapsed()),
            ok = outcome.is_ok(),
            "capability call finished"
        );

        outcome.map_err(|e| classify(&e))
    }
}

/// Stamp for a stage output that started at `started`.
pub(crate) fn metadata(preferences: &UserPreferences, started: Instant) -> GenerationMetadata {
    GenerationMetadata {
        generated_at: Utc::now(),
        duration_ms: duration_ms(started.elapsed()),
        grade_level: preferences.grade_level,
        interest: preferences.interest,
    }
}
