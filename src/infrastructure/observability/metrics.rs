//! Engine metrics
//!
//! Emitted through the `metrics` facade; the hosting service installs the
//! recorder/exporter.

use std::time::Duration;

use metrics::{counter, histogram};

/// Record an ingested event
pub fn record_event_ingested(experiment_id: &str, aggregated: bool) {
    let labels = [
        ("experiment_id", experiment_id.to_string()),
        ("aggregated", aggregated.to_string()),
    ];

    counter!("experiment_events_ingested_total", &labels).increment(1);
}

/// Record an event that never reached aggregation
pub fn record_event_dropped(reason: &'static str) {
    counter!("experiment_events_dropped_total", "reason" => reason).increment(1);
}

/// Record the outcome of an auto-end evaluation
pub fn record_auto_end_decision(experiment_id: &str, condition: Option<&str>) {
    let labels = [
        ("experiment_id", experiment_id.to_string()),
        ("condition", condition.unwrap_or("none").to_string()),
        ("should_end", condition.is_some().to_string()),
    ];

    counter!("experiment_auto_end_decisions_total", &labels).increment(1);
}

pub fn record_evaluation_failure(experiment_id: &str) {
    counter!(
        "experiment_evaluation_failures_total",
        "experiment_id" => experiment_id.to_string()
    )
    .increment(1);
}

/// Record an undelivered notification (`error` or `timeout`)
pub fn record_notification_failure(reason: &'static str) {
    counter!("experiment_notification_failures_total", "reason" => reason).increment(1);
}

/// Record how long one report synthesis took
pub fn record_report_duration(experiment_id: &str, duration: Duration) {
    histogram!(
        "experiment_report_duration_seconds",
        "experiment_id" => experiment_id.to_string()
    )
    .record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_event_ingested("exp-1", true);
        record_event_dropped("unknown_metric");
        record_auto_end_decision("exp-1", Some("sample_size"));
        record_auto_end_decision("exp-1", None);
        record_evaluation_failure("exp-1");
        record_notification_failure("timeout");
        record_report_duration("exp-1", Duration::from_millis(12));
    }
}
