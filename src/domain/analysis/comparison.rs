//! Control vs treatment comparison result

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::aggregate::AggregatedMetric;
use crate::domain::experiment::VariantId;
use crate::domain::metric::MetricId;

/// Per-metric verdict of one comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonRecommendation {
    Deploy,
    Continue,
    Stop,
}

impl ComparisonRecommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deploy => "deploy",
            Self::Continue => "continue",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for ComparisonRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Significance of one treatment against the control for one metric.
///
/// Computed on demand and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub metric_id: MetricId,
    /// Control aggregate snapshot
    pub control: AggregatedMetric,
    /// Treatment aggregate snapshot
    pub treatment: AggregatedMetric,
    /// 1 - approximate p-value, in [0, 1]
    pub statistical_significance: f64,
    /// Effect size relative to the metric target, in [0, 1]
    pub practical_significance: f64,
    /// Signed relative change in percent
    pub improvement: f64,
    pub confidence_level: f64,
    pub recommendation: ComparisonRecommendation,
}

impl ComparisonResult {
    pub fn control_variant_id(&self) -> &VariantId {
        self.control.variant_id()
    }

    pub fn treatment_variant_id(&self) -> &VariantId {
        self.treatment.variant_id()
    }

    /// Absolute difference of the two aggregated values
    pub fn difference(&self) -> f64 {
        self.treatment.aggregated_value() - self.control.aggregated_value()
    }

    /// Significance meets the configured confidence level
    pub fn is_significant(&self) -> bool {
        self.statistical_significance >= self.confidence_level
    }
}
