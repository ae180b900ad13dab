//! Aggregation infrastructure

mod store;

pub use store::{AggregationStore, FoldOutcome, OCCURRENCE_VALUE};
