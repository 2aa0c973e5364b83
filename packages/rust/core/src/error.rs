//! Generation failure taxonomy and the single place failures are classified.
//!
//! Stage adapters never inspect capability failures themselves: everything
//! surfaced by the capability layer goes through [`classify`], so every
//! stage shares one mapping policy.

use std::fmt;

use serde::{Deserialize, Serialize};

use learnkit_capability::{CapabilityError, CapabilityKind};

use crate::progress::PipelineStep;

/// Tag identifying which class of failure ended a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    CapabilityUnavailable,
    CapabilityNotReady,
    RateLimited,
    ContentTooLong,
    Network,
    Aborted,
    UnknownProcessing,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::CapabilityUnavailable => "capability_unavailable",
            Self::CapabilityNotReady => "capability_not_ready",
            Self::RateLimited => "rate_limited",
            Self::ContentTooLong => "content_too_long",
            Self::Network => "network",
            Self::Aborted => "aborted",
            Self::UnknownProcessing => "unknown_processing",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified generation failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    #[error("content failed validation: {}", .errors.join("; "))]
    Validation { errors: Vec<String> },

    #[error("the {kind} capability is not available on this system")]
    CapabilityUnavailable { kind: CapabilityKind },

    #[error("the {kind} capability is still downloading; try again shortly")]
    CapabilityNotReady { kind: CapabilityKind },

    #[error("{}", rate_limited_message(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("{}", too_long_message(.limit, .actual))]
    ContentTooLong { limit: Option<usize>, actual: usize },

    #[error("network problem while generating: {0}")]
    Network(String),

    #[error("generation was cancelled")]
    Aborted,

    #[error("generation failed unexpectedly: {0}")]
    UnknownProcessing(String),
}

impl GenerationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::CapabilityUnavailable { .. } => ErrorKind::CapabilityUnavailable,
            Self::CapabilityNotReady { .. } => ErrorKind::CapabilityNotReady,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::ContentTooLong { .. } => ErrorKind::ContentTooLong,
            Self::Network(_) => ErrorKind::Network,
            Self::Aborted => ErrorKind::Aborted,
            Self::UnknownProcessing(_) => ErrorKind::UnknownProcessing,
        }
    }
}

fn rate_limited_message(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!("the generation service is busy; try again in {secs}s"),
        None => "the generation service is busy; try again later".to_string(),
    }
}

fn too_long_message(limit: &Option<usize>, actual: &usize) -> String {
    match limit {
        Some(limit) => format!(
            "content is too long for the generation service ({actual} characters, limit {limit})"
        ),
        None => format!("content is too long for the generation service ({actual} characters)"),
    }
}

/// Map a capability-layer failure onto the generation taxonomy.
pub fn classify(error: &CapabilityError) -> GenerationError {
    match error {
        CapabilityError::Unavailable { kind } => {
            GenerationError::CapabilityUnavailable { kind: *kind }
        }
        CapabilityError::NotReady { kind } => GenerationError::CapabilityNotReady { kind: *kind },
        CapabilityError::RateLimited { retry_after_secs } => GenerationError::RateLimited {
            retry_after_secs: *retry_after_secs,
        },
        CapabilityError::InputTooLarge { limit, actual } => GenerationError::ContentTooLong {
            limit: *limit,
            actual: *actual,
        },
        CapabilityError::Status { code: 429, .. } => GenerationError::RateLimited {
            retry_after_secs: None,
        },
        CapabilityError::Status { code: 413, .. } => GenerationError::ContentTooLong {
            limit: None,
            actual: 0,
        },
        CapabilityError::Status {
            code: 408 | 502 | 503 | 504,
            message,
        } => GenerationError::Network(message.clone()),
        CapabilityError::Status { code, message } => {
            GenerationError::UnknownProcessing(format!("HTTP {code}: {message}"))
        }
        CapabilityError::Transport(msg) => GenerationError::Network(msg.clone()),
        CapabilityError::Timeout => GenerationError::Network("request timed out".into()),
        CapabilityError::Cancelled => GenerationError::Aborted,
        CapabilityError::Malformed(msg) | CapabilityError::Backend(msg) => {
            GenerationError::UnknownProcessing(msg.clone())
        }
    }
}

/// The failure carried by an unsuccessful [`GenerationResult`](crate::GenerationResult).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageFailure {
    pub kind: ErrorKind,
    /// Step that was running when the run ended.
    pub step: PipelineStep,
    /// Human-readable description.
    pub message: String,
}

impl StageFailure {
    pub(crate) fn new(step: PipelineStep, error: &GenerationError) -> Self {
        Self {
            kind: error.kind(),
            step,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} step failed: {}", self.step, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_table() {
        let cases = [
            (
                CapabilityError::Unavailable {
                    kind: CapabilityKind::Summarize,
                },
                ErrorKind::CapabilityUnavailable,
            ),
            (
                CapabilityError::NotReady {
                    kind: CapabilityKind::Rewrite,
                },
                ErrorKind::CapabilityNotReady,
            ),
            (
                CapabilityError::RateLimited {
                    retry_after_secs: Some(5),
                },
                ErrorKind::RateLimited,
            ),
            (
                CapabilityError::InputTooLarge {
                    limit: Some(10),
                    actual: 20,
                },
                ErrorKind::ContentTooLong,
            ),
            (
                CapabilityError::Status {
                    code: 429,
                    message: String::new(),
                },
                ErrorKind::RateLimited,
            ),
            (
                CapabilityError::Status {
                    code: 503,
                    message: "down".into(),
                },
                ErrorKind::Network,
            ),
            (
                CapabilityError::Status {
                    code: 401,
                    message: "bad key".into(),
                },
                ErrorKind::UnknownProcessing,
            ),
            (CapabilityError::Transport("reset".into()), ErrorKind::Network),
            (CapabilityError::Timeout, ErrorKind::Network),
            (CapabilityError::Cancelled, ErrorKind::Aborted),
            (CapabilityError::Malformed("{".into()), ErrorKind::UnknownProcessing),
            (CapabilityError::Backend("oops".into()), ErrorKind::UnknownProcessing),
        ];

        for (input, expected) in cases {
            assert_eq!(classify(&input).kind(), expected, "classifying {input:?}");
        }
    }

    #[test]
    fn messages_are_human_readable() {
        let err = GenerationError::RateLimited {
            retry_after_secs: Some(30),
        };
        assert_eq!(err.to_string(), "the generation service is busy; try again in 30s");

        let err = GenerationError::ContentTooLong {
            limit: Some(100),
            actual: 250,
        };
        assert!(err.to_string().contains("limit 100"));

        let err = GenerationError::Validation {
            errors: vec!["too short".into(), "too few words".into()],
        };
        assert_eq!(
            err.to_string(),
            "content failed validation: too short; too few words"
        );
    }

    #[test]
    fn stage_failure_display_names_step() {
        let failure = StageFailure::new(PipelineStep::Summarize, &GenerationError::Aborted);
        assert_eq!(failure.kind, ErrorKind::Aborted);
        assert_eq!(failure.to_string(), "summarize step failed: generation was cancelled");
    }
}
