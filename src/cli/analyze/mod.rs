//! Analyze command - one-shot reports over files

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use serde_json::json;
use tracing::info;

use crate::domain::experiment::{ExperimentConfigSource, ExperimentId};
use crate::domain::export::ExportFormat;
use crate::infrastructure::experiment::InMemoryExperimentConfigSource;

/// Arguments for the analyze command
#[derive(Args, Clone)]
pub struct AnalyzeArgs {
    /// JSON array of experiment configurations
    #[arg(long)]
    pub experiments: PathBuf,

    /// Newline-delimited JSON events to ingest before analysis
    #[arg(long)]
    pub events: Option<PathBuf>,

    /// Only analyze this experiment (defaults to every running experiment)
    #[arg(long)]
    pub experiment: Option<String>,

    /// Apply auto-end conditions (notifies and marks experiments ended)
    #[arg(long)]
    pub evaluate: bool,

    /// Also write an export in this format (json, csv or excel)
    #[arg(long)]
    pub export: Option<ExportFormat>,
}

/// Run the analyze command
pub async fn run(args: AnalyzeArgs) -> anyhow::Result<()> {
    let config = super::bootstrap();

    let source = Arc::new(InMemoryExperimentConfigSource::load(&args.experiments).await?);
    let engine = crate::create_engine(&config, source.clone())?;

    if let Some(path) = &args.events {
        let events = super::load_events(path).await?;
        let summary = engine.submit_batch(events).await;
        info!(
            accepted = summary.accepted,
            aggregated = summary.aggregated,
            skipped = summary.skipped,
            failed = summary.failed,
            "Events ingested"
        );
    }

    let experiment_ids = match &args.experiment {
        Some(id) => vec![ExperimentId::new(id.as_str())?],
        None => source.list_tracked().await?,
    };

    for experiment_id in &experiment_ids {
        let report = engine.report(experiment_id).await?;

        let decision = if args.evaluate {
            engine
                .check_auto_end(experiment_id)
                .await?
                .map(|outcome| outcome.decision)
        } else {
            None
        };

        let export_location = match args.export {
            Some(format) => Some(engine.export_to_destination(experiment_id, format).await?),
            None => None,
        };

        let output = json!({
            "report": report,
            "decision": decision,
            "export": export_location,
        });

        println!("{}", serde_json::to_string_pretty(&output)?);
    }

    Ok(())
}
