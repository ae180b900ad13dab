//! Aggregate domain module
//!
//! Streaming statistics kept per (experiment, metric, variant).

mod entity;

pub use entity::{
    critical_value, AggregateKey, AggregatedMetric, ConfidenceInterval,
    CRITICAL_VALUE_LARGE_SAMPLE, CRITICAL_VALUE_SMALL_SAMPLE, LARGE_SAMPLE_THRESHOLD,
};
