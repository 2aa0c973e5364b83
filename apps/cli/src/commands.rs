//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use learnkit_capability::{
    CapabilityRegistry, HttpCapabilityRegistry, HttpSettings, OfflineCapabilityRegistry,
};
use learnkit_core::{
    GenerationProgress, GenerationRequest, GenerationResult, Pipeline, PipelineStep,
    ProgressSink, StepStatus,
};
use learnkit_shared::{
    AppConfig, CapabilityBackend, SessionId, init_config, load_config, validate_api_key,
};
use learnkit_storage::SessionStore;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// LearnKit — personalized learning materials from any text.
#[derive(Parser)]
#[command(
    name = "learnkit",
    version,
    about = "Generate summaries, concept maps, audio scripts, and quizzes tailored to a learner.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Generate learning materials from a text file.
    Generate {
        /// Source text file.
        file: PathBuf,

        /// Grade level: 1-12 or undergrad (defaults to config).
        #[arg(short, long)]
        grade: Option<String>,

        /// Learner interest, e.g. gaming or space (defaults to config).
        #[arg(short, long)]
        interest: Option<String>,

        /// Learning style tag (repeatable).
        #[arg(short, long = "style")]
        styles: Vec<String>,

        /// Use the local heuristic backend instead of the HTTP service.
        #[arg(long)]
        offline: bool,

        /// Session id to save the run under (defaults to a new id).
        #[arg(long)]
        session: Option<String>,

        /// Write the generated materials as JSON to this file.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Check a text file against the content rules without generating.
    Validate {
        /// Source text file.
        file: PathBuf,
    },

    /// Inspect saved sessions.
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Session subcommands.
#[derive(Subcommand)]
pub(crate) enum SessionsAction {
    /// List saved sessions, oldest first.
    List,
    /// Print a saved session as JSON.
    Show {
        /// Session id.
        id: String,
    },
    /// Delete a saved session.
    Delete {
        /// Session id.
        id: String,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "learnkit=info",
        1 => "learnkit=debug",
        _ => "learnkit=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Generate {
            file,
            grade,
            interest,
            styles,
            offline,
            session,
            out,
        } => {
            let options = GenerateOptions {
                grade,
                interest,
                styles,
                offline,
                session,
                out,
            };
            cmd_generate(&file, options).await
        }
        Command::Validate { file } => cmd_validate(&file).await,
        Command::Sessions { action } => match action {
            SessionsAction::List => cmd_sessions_list().await,
            SessionsAction::Show { id } => cmd_sessions_show(&id).await,
            SessionsAction::Delete { id } => cmd_sessions_delete(&id).await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// generate
// ---------------------------------------------------------------------------

struct GenerateOptions {
    grade: Option<String>,
    interest: Option<String>,
    styles: Vec<String>,
    offline: bool,
    session: Option<String>,
    out: Option<PathBuf>,
}

async fn cmd_generate(file: &Path, options: GenerateOptions) -> Result<()> {
    let config = load_config()?;
    let text = read_source(file)?;

    let grade = options
        .grade
        .unwrap_or_else(|| config.defaults.grade_level.as_str().to_string());
    let interest = options
        .interest
        .unwrap_or_else(|| config.defaults.interest.as_str().to_string());
    let preferences = learnkit_validation::validate_preferences(&grade, &interest, &options.styles)?;

    let registry = build_registry(&config, options.offline)?;
    let pipeline = Pipeline::new(registry).with_validation(config.validation.clone());

    let session_id = options
        .session
        .as_deref()
        .map(SessionId::from)
        .unwrap_or_else(SessionId::generate);

    info!(
        file = %file.display(),
        grade = %preferences.grade_level,
        interest = %preferences.interest,
        session = %session_id,
        "generating materials"
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });

    let label = format!(
        "{} / {}",
        preferences.grade_level.display_name(),
        preferences.interest.as_str()
    );
    let request = GenerationRequest::new(text, preferences);
    let progress = CliProgress::new();
    let result = pipeline.run(&request, &progress, &cancel).await;
    progress.finish();

    save_session(&config, &session_id, &label, &result).await?;

    if let Some(failure) = result.error() {
        return Err(eyre!("{failure}"));
    }
    let materials = result
        .materials()
        .ok_or_else(|| eyre!("run reported success without materials"))?;

    if let Some(out) = &options.out {
        let json = serde_json::to_string_pretty(materials)?;
        std::fs::write(out, json)
            .wrap_err_with(|| format!("failed to write {}", out.display()))?;
    }

    let stats = result.stats();
    println!();
    println!("  Materials generated!");
    println!("  Session:   {session_id}");
    println!("  Summary:   {} key points", materials.summary().key_points.len());
    println!("  Concepts:  {}", materials.concept_map().nodes.len());
    println!(
        "  Audio:     {} segments, {:.0}s",
        materials.audio_script().segments.len(),
        materials.audio_script().total_duration_secs
    );
    println!(
        "  Quiz:      {} questions ({}, {} points)",
        materials.quiz().questions.len(),
        materials.quiz().difficulty.as_str(),
        materials.quiz().total_points
    );
    println!("  Calls:     {}", stats.external_call_count());
    println!("  Time:      {:.1}s", stats.total_time().as_secs_f64());
    if let Some(out) = &options.out {
        println!("  Output:    {}", out.display());
    }
    println!();

    Ok(())
}

fn read_source(file: &Path) -> Result<String> {
    std::fs::read_to_string(file).wrap_err_with(|| format!("failed to read {}", file.display()))
}

fn build_registry(config: &AppConfig, offline: bool) -> Result<Arc<dyn CapabilityRegistry>> {
    if offline || config.capability.backend == CapabilityBackend::Offline {
        info!("using offline capability backend");
        return Ok(Arc::new(OfflineCapabilityRegistry::new()));
    }

    validate_api_key(config)?;
    let settings = HttpSettings::from_config(&config.capability)?;
    info!(model = %config.capability.model, "using HTTP capability backend");
    Ok(Arc::new(HttpCapabilityRegistry::new(settings)?))
}

async fn open_store(config: &AppConfig) -> Result<SessionStore> {
    let path = config.sessions.resolved_db_path()?;
    Ok(SessionStore::open(&path, config.sessions.max_sessions).await?)
}

async fn save_session(
    config: &AppConfig,
    id: &SessionId,
    label: &str,
    result: &GenerationResult,
) -> Result<()> {
    let store = open_store(config).await?;
    let evicted = store.save(id, Some(label), result).await?;
    for old in evicted {
        info!(session = %old, "dropped oldest saved session");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Progress bar driven by pipeline progress events.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }

    fn finish(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl ProgressSink for CliProgress {
    fn emit(&self, progress: &GenerationProgress) {
        self.bar.set_position(u64::from(progress.percent));
        match progress.status {
            StepStatus::Pending => {}
            StepStatus::InProgress => self.bar.set_message(progress.step.label()),
            StepStatus::Completed => {
                if progress.step == PipelineStep::Finalize {
                    self.bar.finish_and_clear();
                }
            }
            StepStatus::Error => {
                let message = progress.message.clone().unwrap_or_default();
                self.bar
                    .abandon_with_message(format!("{} failed: {message}", progress.step));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

async fn cmd_validate(file: &Path) -> Result<()> {
    let config = load_config()?;
    let text = read_source(file)?;
    let report = learnkit_validation::validate(&text, &config.validation);

    println!();
    println!("  Characters: {}", report.character_count);
    println!("  Words:      {}", report.word_count);
    println!("  Reading:    ~{} min", report.estimated_reading_time);
    println!("  Complexity: {}", report.complexity.as_str());
    for warning in &report.warnings {
        println!("  warning: {warning}");
    }
    for error in &report.errors {
        println!("  error:   {error}");
    }
    println!();

    if report.is_valid {
        println!("  Content is ready for generation.");
        Ok(())
    } else {
        Err(eyre!(
            "content failed validation with {} error(s)",
            report.errors.len()
        ))
    }
}

// ---------------------------------------------------------------------------
// sessions
// ---------------------------------------------------------------------------

async fn cmd_sessions_list() -> Result<()> {
    let config = load_config()?;
    let store = open_store(&config).await?;
    let sessions = store.list().await?;

    if sessions.is_empty() {
        println!("No saved sessions.");
        return Ok(());
    }
    for session in sessions {
        println!(
            "{}  {}  {}",
            session.id,
            session.updated_at.format("%Y-%m-%d %H:%M"),
            session.label.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn cmd_sessions_show(id: &str) -> Result<()> {
    let config = load_config()?;
    let store = open_store(&config).await?;
    let id = SessionId::from(id);
    let result: GenerationResult = store
        .load(&id)
        .await?
        .ok_or_else(|| eyre!("no session named '{id}'"))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn cmd_sessions_delete(id: &str) -> Result<()> {
    let config = load_config()?;
    let store = open_store(&config).await?;
    let id = SessionId::from(id);
    if store.delete(&id).await? {
        println!("Deleted session {id}");
        Ok(())
    } else {
        Err(eyre!("no session named '{id}'"))
    }
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
