//! Metric definitions

use serde::{Deserialize, Serialize};
use std::fmt;

use super::validation::{validate_metric_id, MetricValidationError};

// ============================================================================
// MetricId
// ============================================================================

/// Unique key of a metric definition
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MetricId(String);

impl MetricId {
    /// Create a new metric ID with validation
    pub fn new(id: impl Into<String>) -> Result<Self, MetricValidationError> {
        let id = id.into();
        validate_metric_id(&id)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MetricId {
    type Error = MetricValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MetricId> for String {
    fn from(id: MetricId) -> Self {
        id.0
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for MetricId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// MetricType / AggregationKind
// ============================================================================

/// Business category of a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Engagement,
    Conversion,
    Satisfaction,
    Performance,
    Quality,
    Custom,
}

/// How events for a metric are folded into a running statistic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationKind {
    Sum,
    Average,
    Count,
    UniqueCount,
    /// Folded as a running mean; no order statistics are kept
    Median,
    /// Folded as a running mean of per-event 0/1 (or fractional) outcomes
    Rate,
}

impl AggregationKind {
    /// Kinds that use the Welford running mean/variance update
    pub fn uses_running_mean(&self) -> bool {
        matches!(self, Self::Average | Self::Median | Self::Rate)
    }

    /// Kinds where every event counts as one occurrence regardless of value
    pub fn counts_occurrences(&self) -> bool {
        matches!(self, Self::Count | Self::UniqueCount)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Average => "average",
            Self::Count => "count",
            Self::UniqueCount => "unique_count",
            Self::Median => "median",
            Self::Rate => "rate",
        }
    }
}

// ============================================================================
// MetricTarget
// ============================================================================

/// Which way a metric has to move to count as an improvement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TargetDirection {
    #[default]
    Increase,
    Decrease,
}

impl TargetDirection {
    /// True when `candidate` beats `incumbent` in this direction
    pub fn is_better(&self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Self::Increase => candidate > incumbent,
            Self::Decrease => candidate < incumbent,
        }
    }

    /// True when a signed change points the desired way
    pub fn matches_change(&self, change: f64) -> bool {
        match self {
            Self::Increase => change > 0.0,
            Self::Decrease => change < 0.0,
        }
    }

    /// True when `value` has reached `threshold` in this direction
    pub fn has_crossed(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Increase => value >= threshold,
            Self::Decrease => value <= threshold,
        }
    }

    pub fn reversed(&self) -> Self {
        match self {
            Self::Increase => Self::Decrease,
            Self::Decrease => Self::Increase,
        }
    }
}

/// Declared goal for a metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricTarget {
    pub value: f64,
    #[serde(default)]
    pub direction: TargetDirection,
}

impl MetricTarget {
    pub fn increase(value: f64) -> Self {
        Self {
            value,
            direction: TargetDirection::Increase,
        }
    }

    pub fn decrease(value: f64) -> Self {
        Self {
            value,
            direction: TargetDirection::Decrease,
        }
    }
}

// ============================================================================
// MetricDefinition
// ============================================================================

/// Immutable definition of a tracked metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    id: MetricId,
    name: String,
    #[serde(rename = "type")]
    metric_type: MetricType,
    aggregation: AggregationKind,
    #[serde(default)]
    is_primary: bool,
    #[serde(default)]
    target: Option<MetricTarget>,
}

impl MetricDefinition {
    pub fn new(
        id: MetricId,
        name: impl Into<String>,
        metric_type: MetricType,
        aggregation: AggregationKind,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            metric_type,
            aggregation,
            is_primary: false,
            target: None,
        }
    }

    pub fn with_primary(mut self, is_primary: bool) -> Self {
        self.is_primary = is_primary;
        self
    }

    pub fn with_target(mut self, target: MetricTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn id(&self) -> &MetricId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    pub fn aggregation(&self) -> AggregationKind {
        self.aggregation
    }

    pub fn is_primary(&self) -> bool {
        self.is_primary
    }

    pub fn target(&self) -> Option<&MetricTarget> {
        self.target.as_ref()
    }

    /// Target direction, larger-is-better when no target is declared
    pub fn direction(&self) -> TargetDirection {
        self.target.map(|t| t.direction).unwrap_or_default()
    }

    /// Check the fields a registry would reject
    pub fn validate(&self) -> Result<(), MetricValidationError> {
        if self.name.trim().is_empty() {
            return Err(MetricValidationError::EmptyName);
        }

        if let Some(target) = self.target {
            if !target.value.is_finite() {
                return Err(MetricValidationError::InvalidTarget(target.value));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_defaults_to_increase() {
        let def = MetricDefinition::new(
            MetricId::new("page_views").unwrap(),
            "Page Views",
            MetricType::Engagement,
            AggregationKind::Count,
        );
        assert_eq!(def.direction(), TargetDirection::Increase);
    }

    #[test]
    fn test_direction_comparisons() {
        assert!(TargetDirection::Increase.is_better(2.0, 1.0));
        assert!(TargetDirection::Decrease.is_better(1.0, 2.0));
        assert!(!TargetDirection::Decrease.is_better(1.0, 1.0));

        assert!(TargetDirection::Increase.matches_change(0.5));
        assert!(!TargetDirection::Increase.matches_change(0.0));
        assert!(TargetDirection::Decrease.matches_change(-3.0));

        assert!(TargetDirection::Increase.has_crossed(10.0, 10.0));
        assert!(TargetDirection::Decrease.has_crossed(9.0, 10.0));
        assert!(!TargetDirection::Decrease.has_crossed(11.0, 10.0));
    }

    #[test]
    fn test_aggregation_kind_groups() {
        assert!(AggregationKind::Median.uses_running_mean());
        assert!(AggregationKind::Rate.uses_running_mean());
        assert!(!AggregationKind::Sum.uses_running_mean());
        assert!(AggregationKind::UniqueCount.counts_occurrences());
    }

    #[test]
    fn test_definition_deserialize() {
        let json = serde_json::json!({
            "id": "conversion_rate",
            "name": "Conversion Rate",
            "type": "conversion",
            "aggregation": "rate",
            "is_primary": true,
            "target": { "value": 0.05, "direction": "increase" }
        });

        let def: MetricDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(def.aggregation(), AggregationKind::Rate);
        assert!(def.is_primary());
        assert_eq!(def.target().unwrap().value, 0.05);
    }

    #[test]
    fn test_validate_rejects_bad_target() {
        let def = MetricDefinition::new(
            MetricId::new("latency").unwrap(),
            "Latency",
            MetricType::Performance,
            AggregationKind::Average,
        )
        .with_target(MetricTarget::decrease(f64::NAN));

        assert!(matches!(
            def.validate(),
            Err(MetricValidationError::InvalidTarget(_))
        ));
    }
}
