//! Generative text capability contract.
//!
//! A [`CapabilityRegistry`] answers, per [`CapabilityKind`], whether the
//! capability can be used right now and hands out disposable
//! [`CapabilityHandle`]s that perform exactly one kind of transformation.
//! Registries are injected into the pipeline; nothing here is global.
//!
//! Two registries ship with the crate:
//! - [`HttpCapabilityRegistry`] — OpenAI-compatible chat-completions API
//! - [`OfflineCapabilityRegistry`] — deterministic local heuristics

pub mod http;
pub mod offline;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

pub use http::{HttpCapabilityRegistry, HttpSettings};
pub use offline::OfflineCapabilityRegistry;

// ---------------------------------------------------------------------------
// Kinds and availability
// ---------------------------------------------------------------------------

/// The transformation a handle performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Summarize,
    Rewrite,
    ExtractStructure,
    Segment,
    AuthorQuestions,
}

impl CapabilityKind {
    pub const ALL: [CapabilityKind; 5] = [
        Self::Summarize,
        Self::Rewrite,
        Self::ExtractStructure,
        Self::Segment,
        Self::AuthorQuestions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summarize => "summarize",
            Self::Rewrite => "rewrite",
            Self::ExtractStructure => "extract_structure",
            Self::Segment => "segment",
            Self::AuthorQuestions => "author_questions",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a capability kind can be used right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Ready,
    /// The backing model exists but is still being fetched.
    NeedsDownload,
    Unavailable,
}

/// Options passed to [`CapabilityRegistry::create`].
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityOptions {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for CapabilityOptions {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            max_output_tokens: 1_024,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// The nature of a failure surfaced by the capability layer.
///
/// Variants describe *what happened*; mapping them onto the user-facing
/// taxonomy is done once, centrally, by the pipeline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CapabilityError {
    #[error("capability '{kind}' is unavailable")]
    Unavailable { kind: CapabilityKind },

    #[error("capability '{kind}' is not ready (model still downloading)")]
    NotReady { kind: CapabilityKind },

    #[error("rate limited by capability backend")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("input too large: {actual} characters")]
    InputTooLarge { limit: Option<usize>, actual: usize },

    #[error("backend returned HTTP {code}: {message}")]
    Status { code: u16, message: String },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("request cancelled")]
    Cancelled,

    #[error("malformed backend response: {0}")]
    Malformed(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Source of capability handles, one factory per [`CapabilityKind`].
#[async_trait]
pub trait CapabilityRegistry: Send + Sync {
    /// Report whether `kind` can be used right now.
    async fn availability(&self, kind: CapabilityKind) -> Availability;

    /// Create a handle for `kind`. The caller owns the handle and must
    /// [`dispose`](CapabilityHandle::dispose) it.
    async fn create(
        &self,
        kind: CapabilityKind,
        options: &CapabilityOptions,
    ) -> Result<Box<dyn CapabilityHandle>, CapabilityError>;
}

/// A disposable handle performing a single transformation kind.
#[async_trait]
pub trait CapabilityHandle: Send {
    fn kind(&self) -> CapabilityKind;

    /// Transform `input` under the instruction/context string `context`.
    ///
    /// Implementations should return [`CapabilityError::Cancelled`] promptly
    /// once `cancel` fires.
    async fn transform(
        &mut self,
        input: &str,
        context: &str,
        cancel: &CancellationToken,
    ) -> Result<String, CapabilityError>;

    /// Release the handle.
    async fn dispose(self: Box<Self>);
}
