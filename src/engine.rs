//! Engine composition root
//!
//! `ExperimentEngine` wires the aggregation store, analysis pipeline and
//! services around injected collaborators. The host owns the scheduler
//! lifecycle through `start` / `stop`.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::domain::analysis::{ComparisonResult, ExperimentResults};
use crate::domain::dashboard::DashboardView;
use crate::domain::event::{EventRepository, ExperimentEvent};
use crate::domain::experiment::{ExperimentConfigSource, ExperimentId, VariantId};
use crate::domain::export::{ExportDestination, ExportFormat};
use crate::domain::metric::{MetricId, MetricRegistry};
use crate::domain::notification::NotificationSink;
use crate::domain::{AggregatedMetric, DomainError};
use crate::infrastructure::aggregation::{AggregationStore, FoldOutcome};
use crate::infrastructure::event::InMemoryEventRepository;
use crate::infrastructure::notification::LogNotificationSink;
use crate::infrastructure::services::{
    AutoEndScheduler, BatchIngestionSummary, EvaluationOutcome, EvaluationSummary,
    EventIngestionService, ReportingService,
};

/// A fully wired experiment analysis engine
#[derive(Clone)]
pub struct ExperimentEngine {
    pub registry: Arc<MetricRegistry>,
    pub store: Arc<AggregationStore>,
    pub ingestion: Arc<EventIngestionService>,
    pub reporting: Arc<ReportingService>,
    pub scheduler: Arc<AutoEndScheduler>,
}

impl ExperimentEngine {
    pub fn builder() -> ExperimentEngineBuilder {
        ExperimentEngineBuilder::default()
    }

    pub async fn submit(&self, event: ExperimentEvent) -> Result<FoldOutcome, DomainError> {
        self.ingestion.submit(event).await
    }

    pub async fn submit_batch(
        &self,
        events: impl IntoIterator<Item = ExperimentEvent>,
    ) -> BatchIngestionSummary {
        self.ingestion.submit_batch(events).await
    }

    /// Current aggregate of one (experiment, metric, variant)
    pub fn aggregate(
        &self,
        experiment_id: &ExperimentId,
        metric_id: &MetricId,
        variant_id: &VariantId,
    ) -> Option<AggregatedMetric> {
        self.store.read(experiment_id, metric_id, variant_id)
    }

    pub fn compare(
        &self,
        experiment_id: &ExperimentId,
        metric_id: &MetricId,
        control: &VariantId,
        treatment: &VariantId,
    ) -> Option<ComparisonResult> {
        self.reporting
            .synthesizer()
            .comparator()
            .compare(experiment_id, metric_id, control, treatment)
    }

    /// Report over explicit variants without a configuration; the first
    /// variant is the control
    pub fn synthesize(&self, experiment_id: &ExperimentId, variant_ids: &[VariantId]) -> ExperimentResults {
        self.reporting.synthesizer().synthesize(experiment_id, variant_ids)
    }

    pub async fn report(&self, experiment_id: &ExperimentId) -> Result<ExperimentResults, DomainError> {
        self.reporting.report(experiment_id).await
    }

    /// On-demand auto-end check, serialized with scheduled ones
    pub async fn check_auto_end(
        &self,
        experiment_id: &ExperimentId,
    ) -> Result<Option<EvaluationOutcome>, DomainError> {
        self.scheduler.trigger(experiment_id).await
    }

    /// Check every tracked experiment; ones already being checked are
    /// listed as in flight
    pub async fn evaluate_all(&self) -> Result<EvaluationSummary, DomainError> {
        self.reporting.evaluate_all().await
    }

    pub async fn dashboard(&self) -> Result<DashboardView, DomainError> {
        self.reporting.dashboard().await
    }

    pub async fn export(&self, experiment_id: &ExperimentId, format: ExportFormat) -> Result<Vec<u8>, DomainError> {
        self.reporting.export(experiment_id, format).await
    }

    pub async fn export_to_destination(
        &self,
        experiment_id: &ExperimentId,
        format: ExportFormat,
    ) -> Result<String, DomainError> {
        self.reporting.export_to_destination(experiment_id, format).await
    }

    pub fn restore(&self, bytes: &[u8]) -> Result<usize, DomainError> {
        self.reporting.restore(bytes)
    }

    /// Start periodic evaluation of tracked experiments
    pub async fn start(&self) -> Result<usize, DomainError> {
        self.scheduler.start().await
    }

    pub async fn stop(&self) -> usize {
        self.scheduler.stop().await
    }
}

// ============================================================================
// Builder
// ============================================================================

#[derive(Default)]
pub struct ExperimentEngineBuilder {
    config: EngineConfig,
    registry: Option<Arc<MetricRegistry>>,
    config_source: Option<Arc<dyn ExperimentConfigSource>>,
    repository: Option<Arc<dyn EventRepository>>,
    notifier: Option<Arc<dyn NotificationSink>>,
    export_destination: Option<Arc<dyn ExportDestination>>,
}

impl ExperimentEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(mut self, registry: Arc<MetricRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn config_source(mut self, source: Arc<dyn ExperimentConfigSource>) -> Self {
        self.config_source = Some(source);
        self
    }

    pub fn event_repository(mut self, repository: Arc<dyn EventRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn notification_sink(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn export_destination(mut self, destination: Arc<dyn ExportDestination>) -> Self {
        self.export_destination = Some(destination);
        self
    }

    /// Defaults: built-in metric catalog, in-memory event log, log notifications
    pub fn build(self) -> Result<ExperimentEngine, DomainError> {
        let config_source = self
            .config_source
            .ok_or_else(|| DomainError::configuration("An experiment configuration source is required"))?;

        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(MetricRegistry::with_defaults()));
        let repository = self
            .repository
            .unwrap_or_else(|| Arc::new(InMemoryEventRepository::new()));
        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(LogNotificationSink::new()));

        let store = Arc::new(AggregationStore::new(registry.clone()));
        let ingestion = Arc::new(EventIngestionService::new(store.clone(), repository.clone()));

        let interval = self.config.check_interval();
        let mut reporting =
            ReportingService::new(self.config, config_source, store.clone(), repository, notifier);
        if let Some(destination) = self.export_destination {
            reporting = reporting.with_export_destination(destination);
        }
        let reporting = Arc::new(reporting);

        let scheduler = Arc::new(AutoEndScheduler::new(reporting.clone(), interval));

        Ok(ExperimentEngine {
            registry,
            store,
            ingestion,
            reporting,
            scheduler,
        })
    }
}
