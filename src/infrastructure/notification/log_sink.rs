//! Logging notification sink

use async_trait::async_trait;
use tracing::info;

use crate::domain::analysis::ExperimentResults;
use crate::domain::experiment::ExperimentId;
use crate::domain::notification::NotificationSink;
use crate::domain::DomainError;

/// Writes auto-end notifications to the log; used when no webhook is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotificationSink;

impl LogNotificationSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn notify(
        &self,
        experiment_id: &ExperimentId,
        reason: &str,
        report: &ExperimentResults,
    ) -> Result<(), DomainError> {
        let actions: Vec<_> = report
            .recommendations
            .iter()
            .map(|r| r.action.as_str())
            .collect();

        info!(
            experiment_id = %experiment_id,
            reason = %reason,
            participants = report.summary.total_participants,
            confidence = report.summary.overall_confidence,
            winner = ?report.summary.primary_winner,
            recommendations = ?actions,
            "Experiment auto-ended"
        );

        Ok(())
    }
}
