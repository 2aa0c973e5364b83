//! Deterministic local capability backend.
//!
//! Used when no API key is configured (`learnkit generate --offline`) and in
//! demos. Every kind is a small extractive heuristic over the input
//! sentences, so output is stable across runs and needs no network.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use learnkit_shared::text::sentences;

use crate::{
    Availability, CapabilityError, CapabilityHandle, CapabilityKind, CapabilityOptions,
    CapabilityRegistry,
};

/// Context lines starting with this prefix carry interest analogies.
const ANALOGY_PREFIX: &str = "Analogy:";

/// Sentences used by the summarizer.
const SUMMARY_SENTENCES: usize = 4;

/// Questions authored per request.
const QUESTION_COUNT: usize = 3;

/// Registry whose handles run local heuristics.
#[derive(Debug, Default)]
pub struct OfflineCapabilityRegistry {
    overrides: HashMap<CapabilityKind, Availability>,
}

impl OfflineCapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `availability` for `kind` instead of [`Availability::Ready`].
    pub fn with_availability(mut self, kind: CapabilityKind, availability: Availability) -> Self {
        self.overrides.insert(kind, availability);
        self
    }
}

#[async_trait]
impl CapabilityRegistry for OfflineCapabilityRegistry {
    async fn availability(&self, kind: CapabilityKind) -> Availability {
        self.overrides
            .get(&kind)
            .copied()
            .unwrap_or(Availability::Ready)
    }

    async fn create(
        &self,
        kind: CapabilityKind,
        _options: &CapabilityOptions,
    ) -> Result<Box<dyn CapabilityHandle>, CapabilityError> {
        match self.availability(kind).await {
            Availability::Ready => Ok(Box::new(OfflineHandle { kind })),
            Availability::NeedsDownload => Err(CapabilityError::NotReady { kind }),
            Availability::Unavailable => Err(CapabilityError::Unavailable { kind }),
        }
    }
}

struct OfflineHandle {
    kind: CapabilityKind,
}

#[async_trait]
impl CapabilityHandle for OfflineHandle {
    fn kind(&self) -> CapabilityKind {
        self.kind
    }

    async fn transform(
        &mut self,
        input: &str,
        context: &str,
        cancel: &CancellationToken,
    ) -> Result<String, CapabilityError> {
        if cancel.is_cancelled() {
            return Err(CapabilityError::Cancelled);
        }

        let sentences = sentences(input);
        let output = match self.kind {
            CapabilityKind::Summarize => summarize(&sentences),
            CapabilityKind::Rewrite => rewrite(&sentences, context),
            CapabilityKind::ExtractStructure => sentences
                .first()
                .map(|s| format!("Main topic: {s}"))
                .unwrap_or_default(),
            CapabilityKind::Segment => {
                "Read each segment at a steady pace and pause briefly between ideas.".to_string()
            }
            CapabilityKind::AuthorQuestions => author_questions(&sentences),
        };

        debug!(kind = %self.kind, output_chars = output.len(), "offline transform complete");
        Ok(output)
    }

    async fn dispose(self: Box<Self>) {}
}

fn summarize(sentences: &[String]) -> String {
    let mut out = String::from("Key points:\n");
    for s in sentences.iter().take(SUMMARY_SENTENCES) {
        out.push_str("- ");
        out.push_str(s);
        out.push('\n');
    }
    out
}

fn rewrite(sentences: &[String], context: &str) -> String {
    let mut out = sentences.join(" ");
    let analogy = context
        .lines()
        .find_map(|l| l.trim().strip_prefix(ANALOGY_PREFIX))
        .map(str::trim)
        .filter(|a| !a.is_empty());
    if let Some(analogy) = analogy {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&format!("Think of it {analogy}."));
    }
    out
}

fn author_questions(sentences: &[String]) -> String {
    sentences
        .iter()
        .take(QUESTION_COUNT)
        .map(|s| {
            format!(
                "Q: According to the text, which statement is true?\n\
                 A) {s}\n\
                 B) The text does not discuss this idea.\n\
                 C) The text says the opposite of this.\n\
                 Answer: A"
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "Volcanoes form where magma rises. Some erupt often! \
        Others sleep for centuries. Scientists watch them closely. Ash can travel far.";

    async fn run(kind: CapabilityKind, context: &str) -> String {
        let registry = OfflineCapabilityRegistry::new();
        let mut handle = registry
            .create(kind, &CapabilityOptions::default())
            .await
            .unwrap();
        let out = handle
            .transform(TEXT, context, &CancellationToken::new())
            .await
            .unwrap();
        handle.dispose().await;
        out
    }

    #[tokio::test]
    async fn summarize_emits_bullets() {
        let out = run(CapabilityKind::Summarize, "").await;
        assert_eq!(out.lines().filter(|l| l.starts_with("- ")).count(), 4);
    }

    #[tokio::test]
    async fn rewrite_appends_analogy_from_context() {
        let out = run(CapabilityKind::Rewrite, "Tone: simple\nAnalogy: like leveling up a character").await;
        assert!(out.ends_with("Think of it like leveling up a character."));
    }

    #[tokio::test]
    async fn questions_are_authored_per_sentence() {
        let out = run(CapabilityKind::AuthorQuestions, "").await;
        assert_eq!(out.matches("Q:").count(), 3);
        assert_eq!(out.matches("Answer: A").count(), 3);
    }

    #[tokio::test]
    async fn availability_overrides() {
        let registry = OfflineCapabilityRegistry::new()
            .with_availability(CapabilityKind::Segment, Availability::NeedsDownload);
        assert_eq!(
            registry.availability(CapabilityKind::Segment).await,
            Availability::NeedsDownload
        );
        assert!(matches!(
            registry
                .create(CapabilityKind::Segment, &CapabilityOptions::default())
                .await,
            Err(CapabilityError::NotReady { .. })
        ));
        assert_eq!(
            registry.availability(CapabilityKind::Summarize).await,
            Availability::Ready
        );
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let registry = OfflineCapabilityRegistry::new();
        let mut handle = registry
            .create(CapabilityKind::Summarize, &CapabilityOptions::default())
            .await
            .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(
            handle.transform(TEXT, "", &cancel).await,
            Err(CapabilityError::Cancelled)
        );
        handle.dispose().await;
    }
}
