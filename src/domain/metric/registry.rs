//! Metric registry

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use tracing::debug;

use super::entity::{AggregationKind, MetricDefinition, MetricId, MetricTarget, MetricType};
use crate::domain::DomainError;

/// Registry of metric definitions.
///
/// Definitions are immutable once registered; the registry only grows.
/// Lookups are synchronous because they sit on the event fold path.
#[derive(Debug, Default)]
pub struct MetricRegistry {
    metrics: RwLock<HashMap<MetricId, MetricDefinition>>,
}

impl MetricRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with the default metric catalog
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        let mut metrics = registry.metrics.write().unwrap_or_else(PoisonError::into_inner);

        for definition in default_catalog() {
            metrics.insert(definition.id().clone(), definition);
        }
        drop(metrics);

        registry
    }

    /// Builder-style registration for static setups; later duplicates are ignored
    pub fn with_definition(self, definition: MetricDefinition) -> Self {
        if let Err(e) = self.register(definition) {
            debug!(error = %e, "Skipping metric definition");
        }
        self
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<MetricId, MetricDefinition>> {
        self.metrics.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new metric definition
    pub fn register(&self, definition: MetricDefinition) -> Result<(), DomainError> {
        definition
            .validate()
            .map_err(|e| DomainError::validation(e.to_string()))?;

        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);

        if metrics.contains_key(definition.id()) {
            return Err(DomainError::conflict(format!(
                "Metric '{}' is already registered",
                definition.id()
            )));
        }

        debug!(metric_id = %definition.id(), aggregation = definition.aggregation().as_str(), "Registered metric");
        metrics.insert(definition.id().clone(), definition);

        Ok(())
    }

    /// Get a metric definition by ID
    pub fn get(&self, id: &MetricId) -> Option<MetricDefinition> {
        self.read().get(id).cloned()
    }

    /// Get a metric definition by its raw string key
    pub fn get_by_key(&self, key: &str) -> Option<MetricDefinition> {
        let id = MetricId::new(key).ok()?;
        self.get(&id)
    }

    /// Check whether a metric id is known
    pub fn contains(&self, id: &MetricId) -> bool {
        self.read().contains_key(id)
    }

    /// Aggregation kind for a metric, if registered
    pub fn aggregation_kind(&self, id: &MetricId) -> Option<AggregationKind> {
        self.read().get(id).map(MetricDefinition::aggregation)
    }

    /// All definitions, ordered by id
    pub fn list(&self) -> Vec<MetricDefinition> {
        let mut definitions: Vec<_> = self.read().values().cloned().collect();
        definitions.sort_by(|a, b| a.id().cmp(b.id()));
        definitions
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

fn catalog_entry(
    id: &str,
    name: &str,
    metric_type: MetricType,
    aggregation: AggregationKind,
) -> Option<MetricDefinition> {
    MetricId::new(id)
        .ok()
        .map(|id| MetricDefinition::new(id, name, metric_type, aggregation))
}

/// Default metric catalog registered by `MetricRegistry::with_defaults`
pub fn default_catalog() -> Vec<MetricDefinition> {
    use AggregationKind as A;
    use MetricType as T;

    [
        catalog_entry("conversion_rate", "Conversion Rate", T::Conversion, A::Rate)
            .map(|m| m.with_primary(true).with_target(MetricTarget::increase(0.05))),
        catalog_entry("click_through_rate", "Click-Through Rate", T::Engagement, A::Rate)
            .map(|m| m.with_target(MetricTarget::increase(0.1))),
        catalog_entry("session_duration", "Session Duration", T::Engagement, A::Average)
            .map(|m| m.with_target(MetricTarget::increase(300.0))),
        catalog_entry("satisfaction_score", "Satisfaction Score", T::Satisfaction, A::Average)
            .map(|m| m.with_target(MetricTarget::increase(4.0))),
        catalog_entry("response_time", "Response Time", T::Performance, A::Median)
            .map(|m| m.with_target(MetricTarget::decrease(200.0))),
        catalog_entry("error_rate", "Error Rate", T::Quality, A::Rate)
            .map(|m| m.with_target(MetricTarget::decrease(0.01))),
        catalog_entry("page_views", "Page Views", T::Engagement, A::Count),
        catalog_entry("unique_visitors", "Unique Visitors", T::Engagement, A::UniqueCount),
        catalog_entry("revenue", "Revenue", T::Conversion, A::Sum),
    ]
    .into_iter()
    .flatten()
    .collect()
}
