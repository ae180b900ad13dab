//! Synthesized experiment report types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::comparison::ComparisonResult;
use crate::domain::aggregate::ConfidenceInterval;
use crate::domain::experiment::{ExperimentId, VariantId};
use crate::domain::metric::{AggregationKind, MetricId, TargetDirection};

// ============================================================================
// Per-variant and per-metric sections
// ============================================================================

/// One variant's value for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantMetricValue {
    pub variant_id: VariantId,
    pub value: f64,
    pub count: u64,
    pub confidence_interval: ConfidenceInterval,
}

/// Summary of one variant across all metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantResults {
    pub variant_id: VariantId,
    pub name: String,
    pub is_control: bool,
    /// Max observed count across this variant's metrics
    pub participants: u64,
    pub metrics: BTreeMap<MetricId, VariantMetricValue>,
}

/// Summary of one metric across all variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResults {
    pub metric_id: MetricId,
    pub name: String,
    pub aggregation: AggregationKind,
    pub direction: TargetDirection,
    /// Variant with the extremal value in the target direction
    pub winner: Option<VariantId>,
    pub winner_value: Option<f64>,
    /// Best significance among treatment/control comparisons
    pub significance: f64,
    /// Improvement of the comparison that produced `significance`
    pub improvement: f64,
    pub values: Vec<VariantMetricValue>,
    pub comparisons: Vec<ComparisonResult>,
}

impl MetricResults {
    pub fn value_for(&self, variant_id: &VariantId) -> Option<&VariantMetricValue> {
        self.values.iter().find(|v| &v.variant_id == variant_id)
    }

    /// Comparison with the highest significance, first on ties
    pub fn best_comparison(&self) -> Option<&ComparisonResult> {
        self.comparisons.iter().fold(None, |best, c| match best {
            Some(b) if b.statistical_significance >= c.statistical_significance => Some(b),
            _ => Some(c),
        })
    }
}

/// Top-line numbers of a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResultsSummary {
    pub total_participants: u64,
    pub duration_days: f64,
    /// Best significance of the primary metric
    pub overall_confidence: f64,
    pub primary_metric: Option<MetricId>,
    pub primary_winner: Option<VariantId>,
}

// ============================================================================
// Recommendation
// ============================================================================

/// Action proposed by a report recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationAction {
    Deploy,
    Continue,
    Stop,
    Rollback,
    Investigate,
}

impl RecommendationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deploy => "deploy",
            Self::Continue => "continue",
            Self::Stop => "stop",
            Self::Rollback => "rollback",
            Self::Investigate => "investigate",
        }
    }
}

impl fmt::Display for RecommendationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationPriority {
    Low,
    Medium,
    High,
    Critical,
}

/// Human-facing recommendation attached to a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: RecommendationAction,
    pub priority: RecommendationPriority,
    pub title: String,
    pub description: String,
    /// In [0, 1]
    pub confidence: f64,
}

impl Recommendation {
    pub fn new(
        action: RecommendationAction,
        priority: RecommendationPriority,
        title: impl Into<String>,
        description: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            action,
            priority,
            title: title.into(),
            description: description.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

// ============================================================================
// StatisticalAnalysis
// ============================================================================

/// Power estimate for the primary metric.
///
/// Uses the normal approximation with fixed z values for 95% confidence and
/// 80% power; not a substitute for a proper power analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StatisticalAnalysis {
    /// Smallest per-variant count of the primary metric
    pub sample_size: u64,
    pub statistical_power: f64,
    /// Per-variant count needed to detect the target effect
    pub required_sample_size: u64,
    pub confidence_level: f64,
}

impl StatisticalAnalysis {
    pub fn is_sufficiently_powered(&self) -> bool {
        self.sample_size >= self.required_sample_size
    }
}

// ============================================================================
// ExperimentResults
// ============================================================================

/// Full experiment report; a pure function of the aggregates at build time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResults {
    pub experiment_id: ExperimentId,
    pub generated_at: DateTime<Utc>,
    pub control_variant: Option<VariantId>,
    pub variants: Vec<VariantResults>,
    pub metrics: Vec<MetricResults>,
    pub summary: ResultsSummary,
    pub recommendations: Vec<Recommendation>,
    pub statistical_analysis: StatisticalAnalysis,
}

impl ExperimentResults {
    /// Empty report for an experiment
    pub fn new(experiment_id: ExperimentId, generated_at: DateTime<Utc>) -> Self {
        Self {
            experiment_id,
            generated_at,
            control_variant: None,
            variants: Vec::new(),
            metrics: Vec::new(),
            summary: ResultsSummary::default(),
            recommendations: Vec::new(),
            statistical_analysis: StatisticalAnalysis::default(),
        }
    }

    pub fn variant(&self, variant_id: &VariantId) -> Option<&VariantResults> {
        self.variants.iter().find(|v| &v.variant_id == variant_id)
    }

    pub fn metric(&self, metric_id: &MetricId) -> Option<&MetricResults> {
        self.metrics.iter().find(|m| &m.metric_id == metric_id)
    }

    pub fn primary_metric_results(&self) -> Option<&MetricResults> {
        self.summary
            .primary_metric
            .as_ref()
            .and_then(|id| self.metric(id))
    }

    /// Winning value of a metric, if any variant has data
    pub fn winner_value(&self, metric_id: &MetricId) -> Option<f64> {
        self.metric(metric_id).and_then(|m| m.winner_value)
    }

    pub fn has_data(&self) -> bool {
        self.summary.total_participants > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(variant: &str, v: f64) -> VariantMetricValue {
        VariantMetricValue {
            variant_id: VariantId::new(variant).unwrap(),
            value: v,
            count: 10,
            confidence_interval: ConfidenceInterval::point(v),
        }
    }

    fn metric_results(id: &str, winner_value: Option<f64>) -> MetricResults {
        MetricResults {
            metric_id: MetricId::new(id).unwrap(),
            name: id.to_string(),
            aggregation: AggregationKind::Average,
            direction: TargetDirection::Increase,
            winner: winner_value.map(|_| VariantId::new("treatment").unwrap()),
            winner_value,
            significance: 0.0,
            improvement: 0.0,
            values: vec![value("control", 1.0), value("treatment", 2.0)],
            comparisons: Vec::new(),
        }
    }

    #[test]
    fn test_lookup_helpers() {
        let mut results = ExperimentResults::new(ExperimentId::new("exp-1").unwrap(), Utc::now());
        results.metrics.push(metric_results("revenue", Some(2.0)));
        results.summary.primary_metric = Some(MetricId::new("revenue").unwrap());

        let revenue = MetricId::new("revenue").unwrap();
        assert_eq!(results.winner_value(&revenue), Some(2.0));
        assert!(results.primary_metric_results().is_some());
        assert!(results.metric(&MetricId::new("missing").unwrap()).is_none());

        let treatment = VariantId::new("treatment").unwrap();
        assert_eq!(
            results.metric(&revenue).unwrap().value_for(&treatment).unwrap().value,
            2.0
        );
        assert!(!results.has_data());
    }

    #[test]
    fn test_recommendation_confidence_clamped() {
        let rec = Recommendation::new(
            RecommendationAction::Investigate,
            RecommendationPriority::Low,
            "Check",
            "Check data",
            1.7,
        );
        assert_eq!(rec.confidence, 1.0);
        assert_eq!(rec.action.to_string(), "investigate");
    }

    #[test]
    fn test_priority_ordering() {
        assert!(RecommendationPriority::Critical > RecommendationPriority::High);
        assert!(RecommendationPriority::Medium > RecommendationPriority::Low);
    }

    #[test]
    fn test_report_serializes_metric_keys_as_strings() {
        let mut metrics = BTreeMap::new();
        metrics.insert(MetricId::new("revenue").unwrap(), value("control", 3.0));

        let variant = VariantResults {
            variant_id: VariantId::new("control").unwrap(),
            name: "Control".to_string(),
            is_control: true,
            participants: 10,
            metrics,
        };

        let json = serde_json::to_value(&variant).unwrap();
        assert_eq!(json["metrics"]["revenue"]["value"], 3.0);

        let back: VariantResults = serde_json::from_value(json).unwrap();
        assert_eq!(back, variant);
    }
}
