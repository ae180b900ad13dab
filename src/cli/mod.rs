//! CLI module for the experiment engine
//!
//! Subcommands:
//! - `analyze`: one-shot reports over a configuration file and an event log
//! - `run`: keep evaluating auto-end conditions until interrupted

pub mod analyze;
pub mod run;

use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::domain::event::ExperimentEvent;
use crate::infrastructure::logging;

/// PMP Experiment Engine - experiment analysis and automated decisions
#[derive(Parser)]
#[command(name = "pmp-experiment-engine")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print reports for experiments, optionally applying auto-end and exporting
    Analyze(analyze::AnalyzeArgs),

    /// Run the auto-end scheduler until Ctrl+C
    Run(run::RunArgs),
}

/// Load `.env`, configuration and logging shared by every subcommand
fn bootstrap() -> AppConfig {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    logging::init_logging(&config.logging);

    config
}

/// Read newline-delimited JSON events; blank lines are skipped
pub async fn load_events(path: &Path) -> anyhow::Result<Vec<ExperimentEvent>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read events from {}", path.display()))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("Invalid event on line {} of {}", index + 1, path.display()))
        })
        .collect()
}
