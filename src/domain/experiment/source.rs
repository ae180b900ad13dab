//! Experiment configuration source trait

use async_trait::async_trait;

use super::entity::{ExperimentConfig, ExperimentId};
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Read-mostly access to the external experiment configuration registry.
///
/// The engine never owns experiment lifecycle state; status transitions are
/// requested through `mark_ended` and recorded by the source.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ExperimentConfigSource: Send + Sync {
    /// Fetch the configuration of one experiment
    async fn get_config(&self, id: &ExperimentId)
        -> Result<Option<ExperimentConfig>, DomainError>;

    /// Experiments that should be evaluated by the scheduler
    async fn list_tracked(&self) -> Result<Vec<ExperimentId>, DomainError>;

    /// Record that an experiment was concluded
    async fn mark_ended(&self, id: &ExperimentId, reason: &str) -> Result<(), DomainError>;
}
