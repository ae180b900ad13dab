//! Infrastructure services

mod ingestion_service;
mod reporting_service;
mod scheduler;

pub use ingestion_service::{BatchIngestionSummary, EventIngestionService};
pub use reporting_service::{EvaluationOutcome, EvaluationSummary, ReportingService};
pub use scheduler::AutoEndScheduler;
