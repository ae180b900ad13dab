//! Event repository trait and query types

use async_trait::async_trait;

use super::entity::ExperimentEvent;
use crate::domain::experiment::{ExperimentId, VariantId};
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Query parameters for stored events
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    /// Filter by experiment ID
    pub experiment_id: Option<ExperimentId>,
    /// Filter by variant ID
    pub variant_id: Option<VariantId>,
    /// Filter by raw metric key
    pub metric_id: Option<String>,
    /// Maximum number of results
    pub limit: Option<usize>,
    /// Number of results to skip
    pub offset: Option<usize>,
}

impl EventQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_experiment(mut self, experiment_id: ExperimentId) -> Self {
        self.experiment_id = Some(experiment_id);
        self
    }

    pub fn with_variant(mut self, variant_id: VariantId) -> Self {
        self.variant_id = Some(variant_id);
        self
    }

    pub fn with_metric(mut self, metric_id: impl Into<String>) -> Self {
        self.metric_id = Some(metric_id.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Check whether an event satisfies every filter
    pub fn matches(&self, event: &ExperimentEvent) -> bool {
        if let Some(ref experiment_id) = self.experiment_id {
            if &event.experiment_id != experiment_id {
                return false;
            }
        }

        if let Some(ref variant_id) = self.variant_id {
            if &event.variant_id != variant_id {
                return false;
            }
        }

        if let Some(ref metric_id) = self.metric_id {
            if &event.metric_id != metric_id {
                return false;
            }
        }

        true
    }
}

/// Storage boundary for raw (already scrubbed) events
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Persist an event
    async fn record(&self, event: ExperimentEvent) -> Result<(), DomainError>;

    /// Query events, oldest first
    async fn query(&self, query: &EventQuery) -> Result<Vec<ExperimentEvent>, DomainError>;

    /// Count events matching the query, ignoring pagination
    async fn count(&self, query: &EventQuery) -> Result<usize, DomainError>;

    /// Delete all events of an experiment
    async fn delete_by_experiment(&self, experiment_id: &ExperimentId)
        -> Result<usize, DomainError>;
}
