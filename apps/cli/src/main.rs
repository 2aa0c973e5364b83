//! LearnKit CLI: turn source text into personalized learning materials.
//!
//! Validates a text file, runs the generation pipeline against the
//! configured capability backend, and keeps recent runs in a local
//! session store.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
