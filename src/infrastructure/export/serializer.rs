//! Export serialization
//!
//! JSON carries the full export and can be read back. CSV and the
//! Excel-compatible TSV flatten aggregates to one row per
//! (metric, variant) and are one-way.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::aggregate::AggregatedMetric;
use crate::domain::export::{ExperimentExport, ExportFormat};
use crate::domain::DomainError;

#[derive(Debug, Serialize)]
struct AggregateRow<'a> {
    experiment_id: &'a str,
    metric_id: &'a str,
    variant_id: &'a str,
    aggregation: &'a str,
    value: f64,
    count: u64,
    variance: f64,
    ci_lower: f64,
    ci_upper: f64,
    last_updated: DateTime<Utc>,
}

impl<'a> From<&'a AggregatedMetric> for AggregateRow<'a> {
    fn from(aggregate: &'a AggregatedMetric) -> Self {
        let interval = aggregate.confidence_interval();

        Self {
            experiment_id: aggregate.experiment_id().as_str(),
            metric_id: aggregate.metric_id().as_str(),
            variant_id: aggregate.variant_id().as_str(),
            aggregation: aggregate.aggregation().as_str(),
            value: aggregate.aggregated_value(),
            count: aggregate.count(),
            variance: aggregate.variance(),
            ci_lower: interval.lower,
            ci_upper: interval.upper,
            last_updated: aggregate.last_updated(),
        }
    }
}

/// Serialize an export in the requested format
pub fn serialize_export(export: &ExperimentExport, format: ExportFormat) -> Result<Vec<u8>, DomainError> {
    match format {
        ExportFormat::Json => to_json(export),
        ExportFormat::Csv => to_delimited(export, b','),
        ExportFormat::Excel => to_delimited(export, b'\t'),
    }
}

pub fn to_json(export: &ExperimentExport) -> Result<Vec<u8>, DomainError> {
    serde_json::to_vec_pretty(export)
        .map_err(|e| DomainError::export(format!("Failed to serialize JSON export: {}", e)))
}

/// Read back a JSON export
pub fn from_json(bytes: &[u8]) -> Result<ExperimentExport, DomainError> {
    serde_json::from_slice(bytes)
        .map_err(|e| DomainError::export(format!("Invalid JSON export: {}", e)))
}

fn to_delimited(export: &ExperimentExport, delimiter: u8) -> Result<Vec<u8>, DomainError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());

    for aggregate in &export.aggregates {
        writer
            .serialize(AggregateRow::from(aggregate))
            .map_err(|e| DomainError::export(format!("Failed to write row: {}", e)))?;
    }

    writer
        .into_inner()
        .map_err(|e| DomainError::export(format!("Failed to flush export: {}", e)))
}
