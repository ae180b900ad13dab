//! Experiment domain entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::validation::{
    validate_experiment_id, validate_variant_id, ExperimentValidationError,
};
use crate::domain::analysis::AutoEndCondition;
use crate::domain::metric::MetricId;

// ============================================================================
// ExperimentId
// ============================================================================

/// Unique identifier for an experiment
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExperimentId(String);

impl ExperimentId {
    /// Create a new experiment ID with validation
    pub fn new(id: impl Into<String>) -> Result<Self, ExperimentValidationError> {
        let id = id.into();
        validate_experiment_id(&id)?;
        Ok(Self(id))
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ExperimentId {
    type Error = ExperimentValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ExperimentId> for String {
    fn from(id: ExperimentId) -> Self {
        id.0
    }
}

impl fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ExperimentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// VariantId
// ============================================================================

/// Unique identifier for a variant within an experiment
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VariantId(String);

impl VariantId {
    /// Create a new variant ID with validation
    pub fn new(id: impl Into<String>) -> Result<Self, ExperimentValidationError> {
        let id = id.into();
        validate_variant_id(&id)?;
        Ok(Self(id))
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for VariantId {
    type Error = ExperimentValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VariantId> for String {
    fn from(id: VariantId) -> Self {
        id.0
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for VariantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// ExperimentStatus
// ============================================================================

/// Lifecycle status as reported by the configuration source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    /// Being configured, no traffic yet
    #[default]
    Draft,
    /// Receiving traffic and tracked by the scheduler
    Running,
    /// Temporarily halted
    Paused,
    /// Concluded, either manually or by an auto-end decision
    Completed,
}

impl ExperimentStatus {
    /// Check if the experiment should be evaluated periodically
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// VariantDefinition
// ============================================================================

/// One arm of an experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantDefinition {
    id: VariantId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    control: bool,
}

impl VariantDefinition {
    pub fn new(id: VariantId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            control: false,
        }
    }

    /// Mark this variant as the control arm
    pub fn with_control(mut self, control: bool) -> Self {
        self.control = control;
        self
    }

    pub fn id(&self) -> &VariantId {
        &self.id
    }

    pub fn name(&self) -> &str {
        if self.name.is_empty() {
            self.id.as_str()
        } else {
            &self.name
        }
    }

    pub fn is_control(&self) -> bool {
        self.control
    }
}

// ============================================================================
// ExperimentConfig
// ============================================================================

/// Read-only experiment configuration supplied by the configuration source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    id: ExperimentId,
    #[serde(default)]
    name: String,
    variants: Vec<VariantDefinition>,
    #[serde(default)]
    metrics: Vec<MetricId>,
    #[serde(default)]
    primary_metric: Option<MetricId>,
    #[serde(default)]
    auto_end_conditions: Vec<AutoEndCondition>,
    start_date: DateTime<Utc>,
    #[serde(default)]
    status: ExperimentStatus,
}

impl ExperimentConfig {
    /// Create a running experiment configuration started now
    pub fn new(id: ExperimentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            variants: Vec::new(),
            metrics: Vec::new(),
            primary_metric: None,
            auto_end_conditions: Vec::new(),
            start_date: Utc::now(),
            status: ExperimentStatus::Running,
        }
    }

    pub fn with_variant(mut self, variant: VariantDefinition) -> Self {
        self.variants.push(variant);
        self
    }

    pub fn with_metric(mut self, metric_id: MetricId) -> Self {
        self.metrics.push(metric_id);
        self
    }

    pub fn with_primary_metric(mut self, metric_id: MetricId) -> Self {
        self.primary_metric = Some(metric_id);
        self
    }

    pub fn with_auto_end_condition(mut self, condition: AutoEndCondition) -> Self {
        self.auto_end_conditions.push(condition);
        self
    }

    pub fn with_start_date(mut self, start_date: DateTime<Utc>) -> Self {
        self.start_date = start_date;
        self
    }

    pub fn with_status(mut self, status: ExperimentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn id(&self) -> &ExperimentId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variants(&self) -> &[VariantDefinition] {
        &self.variants
    }

    pub fn variant_ids(&self) -> Vec<VariantId> {
        self.variants.iter().map(|v| v.id().clone()).collect()
    }

    pub fn metrics(&self) -> &[MetricId] {
        &self.metrics
    }

    pub fn primary_metric(&self) -> Option<&MetricId> {
        self.primary_metric.as_ref()
    }

    pub fn auto_end_conditions(&self) -> &[AutoEndCondition] {
        &self.auto_end_conditions
    }

    pub fn start_date(&self) -> DateTime<Utc> {
        self.start_date
    }

    pub fn status(&self) -> ExperimentStatus {
        self.status
    }

    pub fn set_status(&mut self, status: ExperimentStatus) {
        self.status = status;
    }

    /// The explicitly flagged control variant, or the first declared variant
    pub fn control_variant(&self) -> Option<&VariantDefinition> {
        self.variants
            .iter()
            .find(|v| v.is_control())
            .or_else(|| self.variants.first())
    }

    /// Elapsed time since the start date, in fractional days
    pub fn elapsed_days(&self, now: DateTime<Utc>) -> f64 {
        let seconds = (now - self.start_date).num_seconds().max(0);
        seconds as f64 / 86_400.0
    }

    /// Structural checks on the variant list
    pub fn validate(&self) -> Result<(), ExperimentValidationError> {
        if self.variants.len() < 2 {
            return Err(ExperimentValidationError::InsufficientVariants);
        }

        let mut seen = HashSet::new();

        for variant in &self.variants {
            if !seen.insert(variant.id()) {
                return Err(ExperimentValidationError::DuplicateVariantId(
                    variant.id().to_string(),
                ));
            }
        }

        let controls = self.variants.iter().filter(|v| v.is_control()).count();

        if controls > 1 {
            return Err(ExperimentValidationError::MultipleControls(controls));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn variant(id: &str) -> VariantDefinition {
        VariantDefinition::new(VariantId::new(id).unwrap(), id)
    }

    #[test]
    fn test_experiment_id_rejects_invalid() {
        assert!(ExperimentId::new("checkout-v2").is_ok());
        assert!(ExperimentId::new("").is_err());
        assert!(ExperimentId::new("bad id").is_err());
    }

    #[test]
    fn test_experiment_id_serde_validates() {
        let id: Result<ExperimentId, _> = serde_json::from_str("\"bad id\"");
        assert!(id.is_err());

        let id: ExperimentId = serde_json::from_str("\"exp-1\"").unwrap();
        assert_eq!(id.as_str(), "exp-1");
    }

    #[test]
    fn test_control_variant_prefers_flag() {
        let config = ExperimentConfig::new(ExperimentId::new("exp-1").unwrap(), "Test")
            .with_variant(variant("a"))
            .with_variant(variant("b").with_control(true));

        assert_eq!(config.control_variant().unwrap().id().as_str(), "b");
    }

    #[test]
    fn test_control_variant_defaults_to_first() {
        let config = ExperimentConfig::new(ExperimentId::new("exp-1").unwrap(), "Test")
            .with_variant(variant("a"))
            .with_variant(variant("b"));

        assert_eq!(config.control_variant().unwrap().id().as_str(), "a");
    }

    #[test]
    fn test_validate_variants() {
        let base = ExperimentConfig::new(ExperimentId::new("exp-1").unwrap(), "Test");

        assert_eq!(
            base.clone().with_variant(variant("a")).validate(),
            Err(ExperimentValidationError::InsufficientVariants)
        );

        assert_eq!(
            base.clone()
                .with_variant(variant("a"))
                .with_variant(variant("a"))
                .validate(),
            Err(ExperimentValidationError::DuplicateVariantId("a".to_string()))
        );

        assert_eq!(
            base.clone()
                .with_variant(variant("a").with_control(true))
                .with_variant(variant("b").with_control(true))
                .validate(),
            Err(ExperimentValidationError::MultipleControls(2))
        );

        assert!(base
            .with_variant(variant("a"))
            .with_variant(variant("b"))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_elapsed_days() {
        let now = Utc::now();
        let config = ExperimentConfig::new(ExperimentId::new("exp-1").unwrap(), "Test")
            .with_start_date(now - Duration::hours(36));

        assert!((config.elapsed_days(now) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_elapsed_days_future_start_is_zero() {
        let now = Utc::now();
        let config = ExperimentConfig::new(ExperimentId::new("exp-1").unwrap(), "Test")
            .with_start_date(now + Duration::days(2));

        assert_eq!(config.elapsed_days(now), 0.0);
    }

    #[test]
    fn test_status_running() {
        assert!(ExperimentStatus::Running.is_running());
        assert!(!ExperimentStatus::Completed.is_running());
        assert_eq!(ExperimentStatus::Paused.to_string(), "paused");
    }
}
