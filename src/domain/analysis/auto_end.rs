//! Auto-end conditions and decisions

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::metric::{MetricId, TargetDirection};

// ============================================================================
// AutoEndRule
// ============================================================================

/// Type-specific predicate of an auto-end condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AutoEndRule {
    /// Elapsed days since start reached `max_days`
    Time { max_days: f64 },
    /// Total participants reached `target`
    SampleSize { target: u64 },
    /// Primary metric significance reached `target_confidence`
    StatisticalSignificance {
        /// Falls back to the engine's default confidence threshold
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_confidence: Option<f64>,
        /// Overrides the experiment's primary metric
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metric_id: Option<MetricId>,
    },
    /// A metric's winning value crossed `threshold`
    MetricThreshold {
        metric_id: MetricId,
        threshold: f64,
        #[serde(default)]
        direction: TargetDirection,
    },
    /// Any safety metric's winning value fell below `minimum`
    Safety {
        metric_ids: Vec<MetricId>,
        minimum: f64,
    },
}

impl AutoEndRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Time { .. } => "time",
            Self::SampleSize { .. } => "sample_size",
            Self::StatisticalSignificance { .. } => "statistical_significance",
            Self::MetricThreshold { .. } => "metric_threshold",
            Self::Safety { .. } => "safety",
        }
    }

    pub fn is_safety(&self) -> bool {
        matches!(self, Self::Safety { .. })
    }
}

impl fmt::Display for AutoEndRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// AutoEndCondition
// ============================================================================

/// Externally supplied rule that concludes an experiment when satisfied.
///
/// Serialized flat: `{"type": "sample_size", "target": 500, "priority": 1}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoEndCondition {
    /// Higher priorities are evaluated first
    #[serde(default)]
    pub priority: i32,
    #[serde(flatten)]
    pub rule: AutoEndRule,
}

impl AutoEndCondition {
    pub fn new(rule: AutoEndRule) -> Self {
        Self { priority: 0, rule }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn time(max_days: f64) -> Self {
        Self::new(AutoEndRule::Time { max_days })
    }

    pub fn sample_size(target: u64) -> Self {
        Self::new(AutoEndRule::SampleSize { target })
    }

    pub fn statistical_significance(target_confidence: Option<f64>) -> Self {
        Self::new(AutoEndRule::StatisticalSignificance {
            target_confidence,
            metric_id: None,
        })
    }

    pub fn metric_threshold(
        metric_id: MetricId,
        threshold: f64,
        direction: TargetDirection,
    ) -> Self {
        Self::new(AutoEndRule::MetricThreshold {
            metric_id,
            threshold,
            direction,
        })
    }

    pub fn safety(metric_ids: Vec<MetricId>, minimum: f64) -> Self {
        Self::new(AutoEndRule::Safety {
            metric_ids,
            minimum,
        })
    }

    pub fn kind(&self) -> &'static str {
        self.rule.as_str()
    }

    pub fn is_safety(&self) -> bool {
        self.rule.is_safety()
    }
}

// ============================================================================
// AutoEndDecision
// ============================================================================

/// Outcome of evaluating an experiment's auto-end conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoEndDecision {
    pub should_end: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triggered_condition: Option<AutoEndCondition>,
}

impl AutoEndDecision {
    /// No condition fired
    pub fn keep_running() -> Self {
        Self {
            should_end: false,
            reason: None,
            triggered_condition: None,
        }
    }

    pub fn end(reason: impl Into<String>, condition: AutoEndCondition) -> Self {
        Self {
            should_end: true,
            reason: Some(reason.into()),
            triggered_condition: Some(condition),
        }
    }

    /// True when a safety condition ended the experiment
    pub fn is_safety_stop(&self) -> bool {
        self.should_end
            && self
                .triggered_condition
                .as_ref()
                .is_some_and(AutoEndCondition::is_safety)
    }
}
