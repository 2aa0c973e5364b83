//! Shared types, error model, and configuration for LearnKit.
//!
//! This crate is the foundation depended on by all other LearnKit crates.
//! It provides:
//! - [`LearnkitError`] — the unified ambient error type (config, I/O, storage)
//! - Learner preference types ([`GradeLevel`], [`Interest`], [`UserPreferences`])
//! - Configuration ([`AppConfig`], [`ValidationConfig`], config loading)
//! - Sentence splitting shared by backends and stages ([`text::sentences`])

pub mod config;
pub mod error;
pub mod text;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CapabilityBackend, CapabilityConfig, DefaultsConfig, SessionsConfig,
    ValidationConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    validate_api_key,
};
pub use error::{LearnkitError, Result};
pub use types::{
    ComplexityBucket, GradeLevel, Interest, LearningStyle, RunId, SessionId, UserPreferences,
};
