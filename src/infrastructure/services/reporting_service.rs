//! Reporting service
//!
//! Owns everything that happens after ingestion: report synthesis,
//! auto-end evaluation with notification and status transition, the
//! dashboard and data export. External I/O failures are logged here and
//! never escape a per-experiment evaluation.
//!
//! Auto-end checks of one experiment never overlap: on-demand checks, bulk
//! evaluation and scheduled ticks all take the same per-experiment flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::domain::analysis::{AutoEndCondition, AutoEndDecision, ExperimentResults};
use crate::domain::dashboard::{
    AlertKind, AlertSeverity, DashboardAlert, DashboardView, ExperimentOverview, TopLineMetric,
};
use crate::domain::event::{EventQuery, EventRepository};
use crate::domain::experiment::{ExperimentConfig, ExperimentConfigSource, ExperimentId};
use crate::domain::export::{ExperimentExport, ExportDestination, ExportFormat};
use crate::domain::notification::NotificationSink;
use crate::domain::DomainError;
use crate::infrastructure::aggregation::AggregationStore;
use crate::infrastructure::analysis::{
    safety_rollback, AutoEndEvaluator, Comparator, ResultsSynthesizer,
};
use crate::infrastructure::export::{from_json, serialize_export};
use crate::infrastructure::observability::{
    record_auto_end_decision, record_evaluation_failure, record_notification_failure,
    record_report_duration,
};

// ============================================================================
// Outcomes
// ============================================================================

/// Result of one auto-end check
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationOutcome {
    pub experiment_id: ExperimentId,
    /// False when the experiment is not running and nothing was evaluated
    pub evaluated: bool,
    pub decision: AutoEndDecision,
    pub results: Option<ExperimentResults>,
    pub notified: bool,
    pub marked_ended: bool,
}

impl EvaluationOutcome {
    fn skipped(experiment_id: ExperimentId) -> Self {
        Self {
            experiment_id,
            evaluated: false,
            decision: AutoEndDecision::keep_running(),
            results: None,
            notified: false,
            marked_ended: false,
        }
    }

    /// The experiment no longer needs periodic evaluation
    pub fn is_concluded(&self) -> bool {
        !self.evaluated || self.marked_ended
    }
}

/// Result of evaluating every tracked experiment
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvaluationSummary {
    pub evaluated: usize,
    pub ended: Vec<ExperimentId>,
    pub failed: Vec<ExperimentId>,
    /// Skipped because another check of the same experiment was running
    pub in_flight: Vec<ExperimentId>,
}

/// Clears the in-flight flag when dropped
pub(crate) struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    pub(crate) fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ============================================================================
// ReportingService
// ============================================================================

pub struct ReportingService {
    config: EngineConfig,
    config_source: Arc<dyn ExperimentConfigSource>,
    store: Arc<AggregationStore>,
    repository: Arc<dyn EventRepository>,
    synthesizer: ResultsSynthesizer,
    evaluator: AutoEndEvaluator,
    notifier: Arc<dyn NotificationSink>,
    export_destination: Option<Arc<dyn ExportDestination>>,
    in_flight: DashMap<ExperimentId, Arc<AtomicBool>>,
}

impl ReportingService {
    pub fn new(
        config: EngineConfig,
        config_source: Arc<dyn ExperimentConfigSource>,
        store: Arc<AggregationStore>,
        repository: Arc<dyn EventRepository>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let comparator = Comparator::new(store.clone(), config.default_confidence_threshold);
        let synthesizer =
            ResultsSynthesizer::new(store.clone(), comparator, config.minimum_sample_size);
        let evaluator = AutoEndEvaluator::new(config.default_confidence_threshold);

        Self {
            config,
            config_source,
            store,
            repository,
            synthesizer,
            evaluator,
            notifier,
            export_destination: None,
            in_flight: DashMap::new(),
        }
    }

    pub fn with_export_destination(mut self, destination: Arc<dyn ExportDestination>) -> Self {
        self.export_destination = Some(destination);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn synthesizer(&self) -> &ResultsSynthesizer {
        &self.synthesizer
    }

    pub fn config_source(&self) -> &Arc<dyn ExperimentConfigSource> {
        &self.config_source
    }

    pub(crate) fn flag_for(&self, experiment_id: &ExperimentId) -> Arc<AtomicBool> {
        self.in_flight
            .entry(experiment_id.clone())
            .or_default()
            .value()
            .clone()
    }

    async fn load_config(&self, experiment_id: &ExperimentId) -> Result<ExperimentConfig, DomainError> {
        self.config_source
            .get_config(experiment_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Experiment '{}' not found", experiment_id)))
    }

    fn synthesize(&self, config: &ExperimentConfig, now: DateTime<Utc>) -> ExperimentResults {
        let started = Instant::now();
        let results = self.synthesizer.synthesize_experiment(config, now);
        record_report_duration(config.id().as_str(), started.elapsed());
        results
    }

    // ------------------------------------------------------------------------
    // Reports and auto-end
    // ------------------------------------------------------------------------

    /// Fresh report for a configured experiment
    pub async fn report(&self, experiment_id: &ExperimentId) -> Result<ExperimentResults, DomainError> {
        let config = self.load_config(experiment_id).await?;
        Ok(self.synthesize(&config, Utc::now()))
    }

    /// Re-synthesize, evaluate auto-end conditions and act on a positive
    /// decision. `None` when a check of this experiment is already running.
    ///
    /// Notification and status-transition failures are logged and reflected
    /// in the outcome flags; only configuration lookup errors are returned.
    pub async fn check_auto_end(
        &self,
        experiment_id: &ExperimentId,
    ) -> Result<Option<EvaluationOutcome>, DomainError> {
        let flag = self.flag_for(experiment_id);

        let Some(_guard) = InFlightGuard::try_acquire(&flag) else {
            debug!(experiment_id = %experiment_id, "Evaluation already in flight");
            return Ok(None);
        };

        self.evaluate_experiment(experiment_id).await.map(Some)
    }

    async fn evaluate_experiment(&self, experiment_id: &ExperimentId) -> Result<EvaluationOutcome, DomainError> {
        let config = self.load_config(experiment_id).await?;

        if !config.status().is_running() {
            debug!(
                experiment_id = %experiment_id,
                status = %config.status(),
                "Skipping evaluation of experiment that is not running"
            );
            return Ok(EvaluationOutcome::skipped(experiment_id.clone()));
        }

        let now = Utc::now();
        let mut results = self.synthesize(&config, now);

        let decision = if self.config.enable_auto_end {
            self.evaluator
                .evaluate(config.auto_end_conditions(), &results, config.elapsed_days(now))
        } else {
            AutoEndDecision::keep_running()
        };

        record_auto_end_decision(
            experiment_id.as_str(),
            decision.triggered_condition.as_ref().map(|c| c.kind()),
        );

        let mut outcome = EvaluationOutcome {
            experiment_id: experiment_id.clone(),
            evaluated: true,
            decision,
            results: None,
            notified: false,
            marked_ended: false,
        };

        if !outcome.decision.should_end {
            outcome.results = Some(results);
            return Ok(outcome);
        }

        let reason = outcome
            .decision
            .reason
            .clone()
            .unwrap_or_else(|| "Auto-end condition met".to_string());

        if let Some(rollback) = safety_rollback(&outcome.decision) {
            results.recommendations.insert(0, rollback);
        }

        info!(
            experiment_id = %experiment_id,
            reason = %reason,
            safety = outcome.decision.is_safety_stop(),
            "Auto-ending experiment"
        );

        outcome.notified = self.dispatch_notification(experiment_id, &reason, &results).await;

        outcome.marked_ended = match self.config_source.mark_ended(experiment_id, &reason).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    experiment_id = %experiment_id,
                    error = %e,
                    "Failed to mark experiment as ended"
                );
                false
            }
        };

        outcome.results = Some(results);
        Ok(outcome)
    }

    async fn dispatch_notification(
        &self,
        experiment_id: &ExperimentId,
        reason: &str,
        results: &ExperimentResults,
    ) -> bool {
        match timeout(
            self.config.notification_timeout(),
            self.notifier.notify(experiment_id, reason, results),
        )
        .await
        {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(experiment_id = %experiment_id, error = %e, "Notification failed");
                record_notification_failure("error");
                false
            }
            Err(_) => {
                warn!(
                    experiment_id = %experiment_id,
                    timeout_secs = self.config.notification_timeout_secs,
                    "Notification timed out"
                );
                record_notification_failure("timeout");
                false
            }
        }
    }

    /// Check every tracked experiment concurrently
    pub async fn evaluate_all(&self) -> Result<EvaluationSummary, DomainError> {
        let tracked = self.config_source.list_tracked().await?;

        let outcomes = join_all(tracked.iter().map(|id| async move {
            (id, self.check_auto_end(id).await)
        }))
        .await;

        let mut summary = EvaluationSummary::default();

        for (id, outcome) in outcomes {
            match outcome {
                Ok(None) => summary.in_flight.push(id.clone()),
                Ok(Some(outcome)) => {
                    if outcome.evaluated {
                        summary.evaluated += 1;
                    }
                    if outcome.decision.should_end {
                        summary.ended.push(id.clone());
                    }
                }
                Err(e) => {
                    error!(experiment_id = %id, error = %e, "Experiment evaluation failed");
                    record_evaluation_failure(id.as_str());
                    summary.failed.push(id.clone());
                }
            }
        }

        Ok(summary)
    }

    // ------------------------------------------------------------------------
    // Dashboard
    // ------------------------------------------------------------------------

    /// Overview of every tracked experiment with alerts
    pub async fn dashboard(&self) -> Result<DashboardView, DomainError> {
        let now = Utc::now();
        let tracked = self.config_source.list_tracked().await?;

        let mut view = DashboardView {
            generated_at: now,
            total_participants: 0,
            running_experiments: 0,
            experiments: Vec::with_capacity(tracked.len()),
            alerts: Vec::new(),
        };

        for id in tracked {
            let config = match self.config_source.get_config(&id).await {
                Ok(Some(config)) => config,
                Ok(None) => {
                    warn!(experiment_id = %id, "Tracked experiment has no configuration");
                    continue;
                }
                Err(e) => {
                    warn!(experiment_id = %id, error = %e, "Failed to load experiment for dashboard");
                    continue;
                }
            };

            let results = self.synthesize(&config, now);

            if config.status().is_running() {
                view.running_experiments += 1;
            }
            view.total_participants += results.summary.total_participants;
            view.alerts.extend(self.alerts(&config, &results, now));
            view.experiments.push(overview(&config, &results));
        }

        Ok(view)
    }

    fn alerts(
        &self,
        config: &ExperimentConfig,
        results: &ExperimentResults,
        now: DateTime<Utc>,
    ) -> Vec<DashboardAlert> {
        let id = config.id();
        let elapsed_days = config.elapsed_days(now);
        let mut alerts = Vec::new();

        if !results.has_data() {
            alerts.push(DashboardAlert::new(
                id.clone(),
                AlertKind::NoData,
                AlertSeverity::Warning,
                "No events have been aggregated yet",
            ));
        } else if results.statistical_analysis.sample_size < self.config.minimum_sample_size {
            alerts.push(DashboardAlert::new(
                id.clone(),
                AlertKind::LowSampleSize,
                AlertSeverity::Info,
                format!(
                    "Smallest variant has {} of {} required samples",
                    results.statistical_analysis.sample_size, self.config.minimum_sample_size
                ),
            ));
        }

        if elapsed_days > self.config.maximum_duration_days {
            alerts.push(DashboardAlert::new(
                id.clone(),
                AlertKind::LongRunning,
                AlertSeverity::Warning,
                format!(
                    "Running for {:.1} days (maximum {} days)",
                    elapsed_days, self.config.maximum_duration_days
                ),
            ));
        }

        let safety: Vec<AutoEndCondition> = config
            .auto_end_conditions()
            .iter()
            .filter(|c| c.is_safety())
            .cloned()
            .collect();

        let breach = self.evaluator.evaluate(&safety, results, elapsed_days);
        if breach.should_end {
            alerts.push(DashboardAlert::new(
                id.clone(),
                AlertKind::SafetyBreach,
                AlertSeverity::Critical,
                breach.reason.unwrap_or_else(|| "Safety condition breached".to_string()),
            ));
        }

        alerts
    }

    // ------------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------------

    /// Collect aggregates, optionally raw events, and the current report
    pub async fn build_export(
        &self,
        experiment_id: &ExperimentId,
        include_events: bool,
    ) -> Result<ExperimentExport, DomainError> {
        let now = Utc::now();
        let aggregates = self.store.snapshot(experiment_id);

        let results = self
            .config_source
            .get_config(experiment_id)
            .await?
            .map(|config| self.synthesize(&config, now));

        if aggregates.is_empty() && results.is_none() {
            return Err(DomainError::not_found(format!(
                "No data for experiment '{}'",
                experiment_id
            )));
        }

        let events = if include_events {
            self.repository
                .query(&EventQuery::new().with_experiment(experiment_id.clone()))
                .await?
        } else {
            Vec::new()
        };

        Ok(ExperimentExport {
            experiment_id: experiment_id.clone(),
            exported_at: now,
            aggregates,
            events,
            results,
        })
    }

    /// Serialize an experiment's data; raw events are only part of JSON exports
    pub async fn export(&self, experiment_id: &ExperimentId, format: ExportFormat) -> Result<Vec<u8>, DomainError> {
        let export = timeout(
            self.config.export_timeout(),
            self.build_export(experiment_id, format == ExportFormat::Json),
        )
        .await
        .map_err(|_| {
            DomainError::timeout(
                format!("export of experiment {}", experiment_id),
                self.config.export_timeout_secs,
            )
        })??;

        let bytes = serialize_export(&export, format)?;

        debug!(
            experiment_id = %experiment_id,
            format = %format,
            bytes = bytes.len(),
            "Export serialized"
        );

        Ok(bytes)
    }

    /// Export and hand the bytes to the configured destination
    pub async fn export_to_destination(
        &self,
        experiment_id: &ExperimentId,
        format: ExportFormat,
    ) -> Result<String, DomainError> {
        let destination = self
            .export_destination
            .as_ref()
            .ok_or_else(|| DomainError::configuration("No export destination configured"))?;

        let bytes = self.export(experiment_id, format).await?;

        timeout(
            self.config.export_timeout(),
            destination.store(experiment_id, format, bytes),
        )
        .await
        .map_err(|_| {
            DomainError::timeout(
                format!("storing export of experiment {}", experiment_id),
                self.config.export_timeout_secs,
            )
        })?
    }

    /// Load aggregates from a JSON export; existing keys are left untouched
    pub fn restore(&self, bytes: &[u8]) -> Result<usize, DomainError> {
        let export = from_json(bytes)?;
        let experiment_id = export.experiment_id.clone();
        let restored = self.store.restore(export.aggregates);

        info!(experiment_id = %experiment_id, restored, "Restored aggregates from export");

        Ok(restored)
    }
}

fn overview(config: &ExperimentConfig, results: &ExperimentResults) -> ExperimentOverview {
    ExperimentOverview {
        experiment_id: config.id().clone(),
        name: config.name().to_string(),
        status: config.status(),
        participants: results.summary.total_participants,
        duration_days: results.summary.duration_days,
        overall_confidence: results.summary.overall_confidence,
        primary_winner: results.summary.primary_winner.clone(),
        top_metrics: results
            .metrics
            .iter()
            .map(|m| TopLineMetric {
                metric_id: m.metric_id.clone(),
                winner: m.winner.clone(),
                value: m.winner_value,
                improvement: m.improvement,
                significance: m.significance,
            })
            .collect(),
    }
}
