//! Dashboard view types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::experiment::{ExperimentId, ExperimentStatus, VariantId};
use crate::domain::metric::MetricId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    LowSampleSize,
    LongRunning,
    NoData,
    SafetyBreach,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardAlert {
    pub experiment_id: ExperimentId,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
}

impl DashboardAlert {
    pub fn new(
        experiment_id: ExperimentId,
        kind: AlertKind,
        severity: AlertSeverity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            experiment_id,
            kind,
            severity,
            message: message.into(),
        }
    }
}

/// Winner and lift of one metric, as shown on the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopLineMetric {
    pub metric_id: MetricId,
    pub winner: Option<VariantId>,
    pub value: Option<f64>,
    pub improvement: f64,
    pub significance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentOverview {
    pub experiment_id: ExperimentId,
    pub name: String,
    pub status: ExperimentStatus,
    pub participants: u64,
    pub duration_days: f64,
    pub overall_confidence: f64,
    pub primary_winner: Option<VariantId>,
    pub top_metrics: Vec<TopLineMetric>,
}

/// Cross-experiment dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub generated_at: DateTime<Utc>,
    pub total_participants: u64,
    pub running_experiments: usize,
    pub experiments: Vec<ExperimentOverview>,
    pub alerts: Vec<DashboardAlert>,
}

impl DashboardView {
    pub fn alerts_for(&self, experiment_id: &ExperimentId) -> Vec<&DashboardAlert> {
        self.alerts
            .iter()
            .filter(|a| &a.experiment_id == experiment_id)
            .collect()
    }

    pub fn has_critical_alerts(&self) -> bool {
        self.alerts
            .iter()
            .any(|a| a.severity == AlertSeverity::Critical)
    }
}
