//! Notification sink boundary

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::analysis::{ExperimentResults, Recommendation, ResultsSummary};
use crate::domain::experiment::ExperimentId;
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Event name carried by auto-end notifications
pub const AUTO_END_EVENT: &str = "experiment.auto_ended";

/// Payload delivered when an experiment is concluded automatically
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentEndedNotification {
    /// Unique notification ID
    pub id: String,
    pub event: String,
    pub experiment_id: ExperimentId,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    pub summary: ResultsSummary,
    pub recommendations: Vec<Recommendation>,
}

impl ExperimentEndedNotification {
    pub fn new(experiment_id: &ExperimentId, reason: &str, report: &ExperimentResults) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event: AUTO_END_EVENT.to_string(),
            experiment_id: experiment_id.clone(),
            reason: reason.to_string(),
            timestamp: Utc::now(),
            summary: report.summary.clone(),
            recommendations: report.recommendations.clone(),
        }
    }
}

/// Delivery channel for auto-end notifications.
///
/// Callers treat delivery as fire-and-forget; errors are logged, never
/// propagated into evaluation.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        experiment_id: &ExperimentId,
        reason: &str,
        report: &ExperimentResults,
    ) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_payload() {
        let id = ExperimentId::new("exp-1").unwrap();
        let mut report = ExperimentResults::new(id.clone(), Utc::now());
        report.summary.total_participants = 42;

        let notification = ExperimentEndedNotification::new(&id, "Sample size reached", &report);
        let json = serde_json::to_value(&notification).unwrap();

        assert_eq!(json["event"], AUTO_END_EVENT);
        assert_eq!(json["experiment_id"], "exp-1");
        assert_eq!(json["summary"]["total_participants"], 42);
    }
}
