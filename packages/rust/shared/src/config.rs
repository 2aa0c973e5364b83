//! Application configuration for LearnKit.
//!
//! User config lives at `~/.learnkit/learnkit.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LearnkitError, Result};
use crate::types::{GradeLevel, Interest};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "learnkit.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".learnkit";

// ---------------------------------------------------------------------------
// Config structs (matching learnkit.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default learner preferences.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Content validation limits.
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Generative capability backend settings.
    #[serde(default)]
    pub capability: CapabilityConfig,

    /// Session persistence settings.
    #[serde(default)]
    pub sessions: SessionsConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Grade level used when `--grade` is not given.
    #[serde(default = "default_grade_level")]
    pub grade_level: GradeLevel,

    /// Interest used when `--interest` is not given.
    #[serde(default = "default_interest")]
    pub interest: Interest,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            grade_level: default_grade_level(),
            interest: default_interest(),
        }
    }
}

fn default_grade_level() -> GradeLevel {
    GradeLevel::Grade8
}
fn default_interest() -> Interest {
    Interest::Science
}

/// `[validation]` section. Bounds applied before any capability call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_min_words")]
    pub min_words: usize,
    #[serde(default = "default_max_words")]
    pub max_words: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_chars: default_min_chars(),
            max_chars: default_max_chars(),
            min_words: default_min_words(),
            max_words: default_max_words(),
        }
    }
}

fn default_min_chars() -> usize {
    50
}
fn default_max_chars() -> usize {
    50_000
}
fn default_min_words() -> usize {
    10
}
fn default_max_words() -> usize {
    10_000
}

/// Which capability backend the CLI wires into the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityBackend {
    /// OpenAI-compatible chat-completions endpoint.
    Http,
    /// Deterministic local heuristics, no network.
    Offline,
}

/// `[capability]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityConfig {
    #[serde(default = "default_backend")]
    pub backend: CapabilityBackend,

    /// Base URL of the chat-completions API (without `/chat/completions`).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for every generation stage.
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Inputs longer than this are rejected before sending.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            max_input_chars: default_max_input_chars(),
        }
    }
}

impl CapabilityConfig {
    /// Parse and check `base_url`.
    pub fn endpoint(&self) -> Result<url::Url> {
        url::Url::parse(&self.base_url).map_err(|e| {
            LearnkitError::config(format!("invalid capability base_url '{}': {e}", self.base_url))
        })
    }
}

fn default_backend() -> CapabilityBackend {
    CapabilityBackend::Http
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_input_chars() -> usize {
    60_000
}

/// `[sessions]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Database file; relative paths resolve against the config directory.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Maximum number of sessions retained (oldest inserted is evicted).
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            max_sessions: default_max_sessions(),
        }
    }
}

impl SessionsConfig {
    /// Resolve `db_path` against the config directory.
    pub fn resolved_db_path(&self) -> Result<PathBuf> {
        let path = PathBuf::from(&self.db_path);
        if path.is_absolute() {
            Ok(path)
        } else {
            Ok(config_dir()?.join(path))
        }
    }
}

fn default_db_path() -> String {
    "sessions.db".into()
}
fn default_max_sessions() -> usize {
    10
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.learnkit/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| LearnkitError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.learnkit/learnkit.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LearnkitError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        LearnkitError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    check_limits(&config)?;
    Ok(config)
}

/// Reject configs whose bounds can never be satisfied.
fn check_limits(config: &AppConfig) -> Result<()> {
    let v = &config.validation;
    if v.min_chars > v.max_chars {
        return Err(LearnkitError::config(format!(
            "validation.min_chars ({}) exceeds validation.max_chars ({})",
            v.min_chars, v.max_chars
        )));
    }
    if v.min_words > v.max_words {
        return Err(LearnkitError::config(format!(
            "validation.min_words ({}) exceeds validation.max_words ({})",
            v.min_words, v.max_words
        )));
    }
    if config.sessions.max_sessions == 0 {
        return Err(LearnkitError::config("sessions.max_sessions must be at least 1"));
    }
    Ok(())
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LearnkitError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LearnkitError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LearnkitError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the capability API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.capability.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(LearnkitError::config(format!(
            "capability API key not found. Set the {var_name} environment variable,\n\
             or pass --offline to use the local heuristic backend."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("max_chars"));
        assert!(toml_str.contains("OPENROUTER_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.validation.min_chars, 50);
        assert_eq!(parsed.validation.max_chars, 50_000);
        assert_eq!(parsed.sessions.max_sessions, 10);
        assert_eq!(parsed.defaults.grade_level, GradeLevel::Grade8);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
grade_level = "undergrad"
interest = "space"

[capability]
backend = "offline"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.grade_level, GradeLevel::Undergrad);
        assert_eq!(config.defaults.interest, Interest::Space);
        assert_eq!(config.capability.backend, CapabilityBackend::Offline);
        assert_eq!(config.capability.timeout_secs, 60);
        assert_eq!(config.validation, ValidationConfig::default());
    }

    #[test]
    fn inverted_limits_are_rejected() {
        let dir = std::env::temp_dir().join(format!("lk_cfg_{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("learnkit.toml");
        std::fs::write(&path, "[validation]\nmin_chars = 500\nmax_chars = 100\n").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("min_chars"));
    }

    #[test]
    fn endpoint_parsing() {
        let mut config = CapabilityConfig::default();
        assert!(config.endpoint().is_ok());
        config.base_url = "not a url".into();
        assert!(config.endpoint().is_err());
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.capability.api_key_env = "LK_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
