//! Event ingestion service
//!
//! Scrubs incoming events, persists them and folds them into the
//! aggregation store. Folding is synchronous arithmetic; the only await is
//! the repository write.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::event::{EventRepository, ExperimentEvent};
use crate::domain::DomainError;
use crate::infrastructure::aggregation::{AggregationStore, FoldOutcome};
use crate::infrastructure::event::EventScrubber;
use crate::infrastructure::observability::{record_event_dropped, record_event_ingested};

/// Counts for a batch submission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchIngestionSummary {
    /// Events persisted
    pub accepted: usize,
    /// Events folded into an aggregate
    pub aggregated: usize,
    /// Persisted but not aggregated (unknown metric or non-finite value)
    pub skipped: usize,
    /// Events the repository refused
    pub failed: usize,
}

/// Entry point for behavioral events
pub struct EventIngestionService {
    scrubber: EventScrubber,
    store: Arc<AggregationStore>,
    repository: Arc<dyn EventRepository>,
}

impl EventIngestionService {
    pub fn new(store: Arc<AggregationStore>, repository: Arc<dyn EventRepository>) -> Self {
        Self {
            scrubber: EventScrubber::new(),
            store,
            repository,
        }
    }

    /// Scrub, persist and aggregate one event
    pub async fn submit(&self, event: ExperimentEvent) -> Result<FoldOutcome, DomainError> {
        let event = self.scrubber.scrub(event);

        self.repository.record(event.clone()).await?;

        let outcome = self.store.fold(&event);

        if !outcome.is_folded() {
            debug!(
                experiment_id = %event.experiment_id,
                metric_id = %event.metric_id,
                outcome = outcome.as_str(),
                "Event stored without aggregation"
            );
            record_event_dropped(outcome.as_str());
        }

        record_event_ingested(event.experiment_id.as_str(), outcome.is_folded());

        Ok(outcome)
    }

    /// Submit events one by one; a failing event does not stop the batch
    pub async fn submit_batch(
        &self,
        events: impl IntoIterator<Item = ExperimentEvent>,
    ) -> BatchIngestionSummary {
        let mut summary = BatchIngestionSummary::default();

        for event in events {
            let event_id = event.id.clone();

            match self.submit(event).await {
                Ok(outcome) => {
                    summary.accepted += 1;
                    if outcome.is_folded() {
                        summary.aggregated += 1;
                    } else {
                        summary.skipped += 1;
                    }
                }
                Err(e) => {
                    warn!(event_id = %event_id, error = %e, "Failed to ingest event");
                    record_event_dropped("storage_error");
                    summary.failed += 1;
                }
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::{EventQuery, MockEventRepository};
    use crate::domain::experiment::{ExperimentId, VariantId};
    use crate::domain::metric::{MetricId, MetricRegistry};
    use crate::infrastructure::event::{InMemoryEventRepository, REDACTED};

    fn event(metric: &str) -> ExperimentEvent {
        ExperimentEvent::new(
            ExperimentId::new("exp-1").unwrap(),
            VariantId::new("control").unwrap(),
            "session-1",
            metric,
        )
    }

    fn service() -> (
        EventIngestionService,
        Arc<AggregationStore>,
        Arc<InMemoryEventRepository>,
    ) {
        let store = Arc::new(AggregationStore::new(Arc::new(MetricRegistry::with_defaults())));
        let repository = Arc::new(InMemoryEventRepository::new());
        let service = EventIngestionService::new(store.clone(), repository.clone());
        (service, store, repository)
    }

    #[tokio::test]
    async fn test_submit_scrubs_stores_and_aggregates() {
        let (service, store, repository) = service();

        let outcome = service
            .submit(
                event("revenue")
                    .with_value(12.5)
                    .with_property("email", "a@b.com")
                    .with_property("note", "call 555-123-4567"),
            )
            .await
            .unwrap();

        assert_eq!(outcome, FoldOutcome::Folded);

        let stored = repository.query(&EventQuery::new()).await.unwrap();
        let properties = stored[0].properties.as_ref().unwrap();
        assert!(!properties.contains_key("email"));
        assert_eq!(properties["note"], REDACTED);

        let aggregate = store
            .read(
                &ExperimentId::new("exp-1").unwrap(),
                &MetricId::new("revenue").unwrap(),
                &VariantId::new("control").unwrap(),
            )
            .unwrap();
        assert_eq!(aggregate.aggregated_value(), 12.5);
    }

    #[tokio::test]
    async fn test_unknown_metric_is_stored_not_aggregated() {
        let (service, store, repository) = service();

        let outcome = service.submit(event("mystery_metric")).await.unwrap();

        assert_eq!(outcome, FoldOutcome::UnknownMetric);
        assert!(store.is_empty());
        assert_eq!(repository.count(&EventQuery::new()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_batch_summary() {
        let (service, _, _) = service();

        let summary = service
            .submit_batch(vec![
                event("page_views"),
                event("page_views"),
                event("unknown"),
                event("revenue").with_value(f64::NAN),
            ])
            .await;

        assert_eq!(
            summary,
            BatchIngestionSummary {
                accepted: 4,
                aggregated: 2,
                skipped: 2,
                failed: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_storage_failure_skips_aggregation() {
        let store = Arc::new(AggregationStore::new(Arc::new(MetricRegistry::with_defaults())));
        let mut repository = MockEventRepository::new();
        repository
            .expect_record()
            .returning(|_| Err(DomainError::storage("disk full")));

        let service = EventIngestionService::new(store.clone(), Arc::new(repository));

        assert!(service.submit(event("page_views")).await.is_err());
        assert!(store.is_empty());

        let summary = service.submit_batch(vec![event("page_views")]).await;
        assert_eq!(summary.failed, 1);
    }
}
