//! Concurrent aggregation store
//!
//! Aggregates live in a sharded `DashMap`. A fold holds the write lock of the
//! key's shard for the whole read-modify-write, so concurrent folds on the
//! same key are serialized while keys in other shards proceed in parallel.
//! Reads clone one key under its shard read lock; a report therefore sees a
//! consistent value per key but not a cross-key snapshot.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::domain::aggregate::{AggregateKey, AggregatedMetric};
use crate::domain::event::ExperimentEvent;
use crate::domain::experiment::{ExperimentId, VariantId};
use crate::domain::metric::{MetricId, MetricRegistry};

/// Value folded for events that carry no numeric value
pub const OCCURRENCE_VALUE: f64 = 1.0;

/// What happened to an event handed to `fold`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldOutcome {
    Folded,
    /// Metric id not registered; the event is ignored
    UnknownMetric,
    /// Value was NaN or infinite
    Rejected,
}

impl FoldOutcome {
    pub fn is_folded(&self) -> bool {
        matches!(self, Self::Folded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Folded => "folded",
            Self::UnknownMetric => "unknown_metric",
            Self::Rejected => "non_finite_value",
        }
    }
}

/// Per-(experiment, metric, variant) running statistics
pub struct AggregationStore {
    registry: Arc<MetricRegistry>,
    aggregates: DashMap<AggregateKey, AggregatedMetric>,
}

impl AggregationStore {
    pub fn new(registry: Arc<MetricRegistry>) -> Self {
        Self {
            registry,
            aggregates: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    /// Fold one event into its aggregate, creating the aggregate on first use
    pub fn fold(&self, event: &ExperimentEvent) -> FoldOutcome {
        let Some((metric_id, kind)) = MetricId::new(event.metric_id.as_str())
            .ok()
            .and_then(|id| self.registry.aggregation_kind(&id).map(|kind| (id, kind)))
        else {
            trace!(metric_id = %event.metric_id, "Skipping event for unregistered metric");
            return FoldOutcome::UnknownMetric;
        };

        let value = event.value.unwrap_or(OCCURRENCE_VALUE);

        if !value.is_finite() {
            debug!(
                experiment_id = %event.experiment_id,
                metric_id = %metric_id,
                "Rejecting non-finite event value"
            );
            return FoldOutcome::Rejected;
        }

        let key = AggregateKey::new(
            event.experiment_id.clone(),
            metric_id,
            event.variant_id.clone(),
        );

        self.aggregates
            .entry(key.clone())
            .or_insert_with(|| AggregatedMetric::new(key, kind, event.timestamp))
            .fold(value, event.timestamp);

        FoldOutcome::Folded
    }

    /// Snapshot of one aggregate
    pub fn read(
        &self,
        experiment_id: &ExperimentId,
        metric_id: &MetricId,
        variant_id: &VariantId,
    ) -> Option<AggregatedMetric> {
        let key = AggregateKey::new(experiment_id.clone(), metric_id.clone(), variant_id.clone());
        self.aggregates.get(&key).map(|entry| entry.value().clone())
    }

    /// All aggregates of an experiment, ordered by metric then variant
    pub fn snapshot(&self, experiment_id: &ExperimentId) -> Vec<AggregatedMetric> {
        let mut aggregates: Vec<_> = self
            .aggregates
            .iter()
            .filter(|entry| &entry.key().experiment_id == experiment_id)
            .map(|entry| entry.value().clone())
            .collect();

        aggregates.sort_by(|a, b| a.key().cmp(b.key()));
        aggregates
    }

    /// Experiments that have at least one aggregate
    pub fn experiments(&self) -> Vec<ExperimentId> {
        let mut ids: Vec<_> = self
            .aggregates
            .iter()
            .map(|entry| entry.key().experiment_id.clone())
            .collect();

        ids.sort();
        ids.dedup();
        ids
    }

    /// Load aggregates from an export; keys already present are left untouched.
    ///
    /// Returns the number of aggregates inserted.
    pub fn restore(&self, aggregates: impl IntoIterator<Item = AggregatedMetric>) -> usize {
        let mut inserted = 0;

        for aggregate in aggregates {
            if let dashmap::mapref::entry::Entry::Vacant(slot) =
                self.aggregates.entry(aggregate.key().clone())
            {
                slot.insert(aggregate);
                inserted += 1;
            }
        }

        debug!(inserted, "Restored aggregates");
        inserted
    }

    /// Drop every aggregate of an experiment
    pub fn remove_experiment(&self, experiment_id: &ExperimentId) -> usize {
        let before = self.aggregates.len();
        self.aggregates
            .retain(|key, _| &key.experiment_id != experiment_id);
        before - self.aggregates.len()
    }

    pub fn len(&self) -> usize {
        self.aggregates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aggregates.is_empty()
    }
}
