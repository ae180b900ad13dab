//! Observability infrastructure - Engine metrics

mod metrics;

pub use metrics::{
    record_auto_end_decision, record_evaluation_failure, record_event_dropped,
    record_event_ingested, record_notification_failure, record_report_duration,
};
