//! Run command - scheduled auto-end evaluation until shutdown

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use tokio::signal;
use tracing::info;

use crate::infrastructure::experiment::InMemoryExperimentConfigSource;

/// Arguments for the run command
#[derive(Args, Clone)]
pub struct RunArgs {
    /// JSON array of experiment configurations
    #[arg(long)]
    pub experiments: PathBuf,

    /// Newline-delimited JSON events to ingest before scheduling
    #[arg(long)]
    pub events: Option<PathBuf>,
}

/// Run the scheduler
pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = super::bootstrap();

    let source = Arc::new(InMemoryExperimentConfigSource::load(&args.experiments).await?);
    let engine = crate::create_engine(&config, source)?;

    if let Some(path) = &args.events {
        let events = super::load_events(path).await?;
        let summary = engine.submit_batch(events).await;
        info!(accepted = summary.accepted, aggregated = summary.aggregated, "Events ingested");
    }

    let tracked = engine.start().await?;
    info!(tracked, "Scheduler running, press Ctrl+C to stop");

    shutdown_signal().await;

    let stopped = engine.stop().await;
    info!(stopped, "Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
