//! PMP Experiment Engine
//!
//! Experiment analysis and automated decisions:
//! - Streaming per-variant aggregation of behavioral events
//! - Statistical comparison of variants against a control
//! - Synthesized reports with recommendations
//! - Auto-end conditions evaluated on a schedule, with notifications
//! - Dashboard overview and data export

pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod infrastructure;

pub use config::AppConfig;
pub use engine::{ExperimentEngine, ExperimentEngineBuilder};

use std::sync::Arc;

use domain::experiment::ExperimentConfigSource;
use domain::notification::NotificationSink;
use infrastructure::export::FileExportDestination;
use infrastructure::notification::{LogNotificationSink, WebhookNotificationSink};
use tracing::info;

/// Create an engine from application configuration
pub fn create_engine(
    config: &AppConfig,
    config_source: Arc<dyn ExperimentConfigSource>,
) -> anyhow::Result<ExperimentEngine> {
    let notifier = create_notification_sink(config)?;
    let export_destination = Arc::new(FileExportDestination::new(&config.export.directory));

    info!(
        check_interval_secs = config.engine.check_interval_secs,
        auto_end = config.engine.enable_auto_end,
        export_directory = %config.export.directory.display(),
        "Creating experiment engine"
    );

    let engine = ExperimentEngine::builder()
        .config(config.engine.clone())
        .config_source(config_source)
        .notification_sink(notifier)
        .export_destination(export_destination)
        .build()?;

    Ok(engine)
}

fn create_notification_sink(config: &AppConfig) -> anyhow::Result<Arc<dyn NotificationSink>> {
    let Some(url) = config.notification.webhook_url.as_deref() else {
        info!("No webhook configured, auto-end notifications go to the log");
        return Ok(Arc::new(LogNotificationSink::new()));
    };

    let mut sink = WebhookNotificationSink::new(url, config.engine.notification_timeout())?;
    if let Some(secret) = &config.notification.secret {
        sink = sink.with_secret(secret.clone());
    }

    info!(url = %url, signed = config.notification.secret.is_some(), "Using webhook notifications");
    Ok(Arc::new(sink))
}
