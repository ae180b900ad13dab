//! Metric domain module
//!
//! Metric definitions (aggregation kind, target direction) and the registry
//! consulted by ingestion and analysis.

mod entity;
mod registry;
mod validation;

pub use entity::{
    AggregationKind, MetricDefinition, MetricId, MetricTarget, MetricType, TargetDirection,
};
pub use registry::{default_catalog, MetricRegistry};
pub use validation::{validate_metric_id, MetricValidationError};
