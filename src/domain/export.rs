//! Export formats, payload and destination boundary

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::aggregate::AggregatedMetric;
use crate::domain::analysis::ExperimentResults;
use crate::domain::event::ExperimentEvent;
use crate::domain::experiment::ExperimentId;
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Serialization format of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
    /// Tab-separated values, opened natively by spreadsheet tools
    Excel,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Excel => "excel",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Excel => "tsv",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Csv => "text/csv",
            Self::Excel => "text/tab-separated-values",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "excel" | "tsv" | "xls" => Ok(Self::Excel),
            other => Err(DomainError::validation(format!(
                "Unsupported export format '{}'",
                other
            ))),
        }
    }
}

/// Snapshot of an experiment's state.
///
/// The JSON form can be read back to restore aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentExport {
    pub experiment_id: ExperimentId,
    pub exported_at: DateTime<Utc>,
    pub aggregates: Vec<AggregatedMetric>,
    #[serde(default)]
    pub events: Vec<ExperimentEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<ExperimentResults>,
}

/// Where exported bytes end up
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ExportDestination: Send + Sync {
    /// Persist an export and return its location
    async fn store(
        &self,
        experiment_id: &ExperimentId,
        format: ExportFormat,
        bytes: Vec<u8>,
    ) -> Result<String, DomainError>;
}
