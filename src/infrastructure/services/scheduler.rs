//! Auto-end scheduler
//!
//! One task per tracked experiment, each with its own ticker. Ticks and
//! on-demand triggers go through the reporting service's in-flight check, so
//! evaluations of one experiment never overlap. Shutdown is observed between
//! evaluations; a running synthesis always completes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::domain::experiment::ExperimentId;
use crate::domain::DomainError;
use crate::infrastructure::observability::record_evaluation_failure;

use super::reporting_service::{EvaluationOutcome, ReportingService};

pub struct AutoEndScheduler {
    reporting: Arc<ReportingService>,
    interval: Duration,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<HashMap<ExperimentId, JoinHandle<()>>>,
}

impl AutoEndScheduler {
    pub fn new(reporting: Arc<ReportingService>, interval: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);

        Self {
            reporting,
            interval,
            shutdown,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Spawn a ticker for every tracked experiment that does not have a live
    /// one yet. Safe to call again to pick up newly tracked experiments.
    pub async fn start(&self) -> Result<usize, DomainError> {
        self.shutdown.send_replace(false);

        let tracked = self.reporting.config_source().list_tracked().await?;
        let mut tasks = self.tasks.lock().await;
        let mut spawned = 0;

        for experiment_id in tracked {
            if tasks
                .get(&experiment_id)
                .is_some_and(|handle| !handle.is_finished())
            {
                continue;
            }

            let handle = tokio::spawn(watch_experiment(
                self.reporting.clone(),
                experiment_id.clone(),
                self.interval,
                self.shutdown.subscribe(),
            ));

            tasks.insert(experiment_id, handle);
            spawned += 1;
        }

        info!(
            spawned,
            interval_secs = self.interval.as_secs(),
            "Auto-end scheduler started"
        );

        Ok(spawned)
    }

    /// Evaluate now; `None` when an evaluation of this experiment is already
    /// running.
    pub async fn trigger(&self, experiment_id: &ExperimentId) -> Result<Option<EvaluationOutcome>, DomainError> {
        self.reporting.check_auto_end(experiment_id).await
    }

    /// Experiments whose ticker is still alive
    pub async fn active_experiments(&self) -> Vec<ExperimentId> {
        let tasks = self.tasks.lock().await;
        let mut active: Vec<_> = tasks
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        active.sort();
        active
    }

    /// Signal shutdown and wait for every ticker to exit
    pub async fn stop(&self) -> usize {
        self.shutdown.send_replace(true);

        let handles: Vec<_> = self.tasks.lock().await.drain().collect();
        let stopped = handles.len();

        for (experiment_id, handle) in handles {
            if let Err(e) = handle.await {
                error!(experiment_id = %experiment_id, error = %e, "Scheduler task panicked");
            }
        }

        info!(stopped, "Auto-end scheduler stopped");
        stopped
    }
}

async fn watch_experiment(
    reporting: Arc<ReportingService>,
    experiment_id: ExperimentId,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        if *shutdown.borrow() {
            break;
        }

        match reporting.check_auto_end(&experiment_id).await {
            Ok(None) => {
                debug!(experiment_id = %experiment_id, "Skipping tick, evaluation in flight");
            }
            Ok(Some(outcome)) if outcome.is_concluded() => {
                info!(experiment_id = %experiment_id, "Experiment concluded, stopping its ticker");
                break;
            }
            Ok(Some(_)) => {}
            Err(DomainError::NotFound { message }) => {
                warn!(experiment_id = %experiment_id, message = %message, "Experiment disappeared");
                break;
            }
            Err(e) => {
                error!(experiment_id = %experiment_id, error = %e, "Scheduled evaluation failed");
                record_evaluation_failure(experiment_id.as_str());
            }
        }
    }

    debug!(experiment_id = %experiment_id, "Scheduler task exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::domain::analysis::AutoEndCondition;
    use crate::domain::event::ExperimentEvent;
    use crate::domain::experiment::{
        ExperimentConfig, ExperimentConfigSource, VariantDefinition, VariantId,
    };
    use crate::domain::metric::MetricRegistry;
    use crate::infrastructure::aggregation::AggregationStore;
    use crate::infrastructure::event::InMemoryEventRepository;
    use crate::infrastructure::experiment::InMemoryExperimentConfigSource;
    use crate::infrastructure::notification::LogNotificationSink;
    use std::sync::atomic::Ordering;
    use tokio_test::{assert_err, assert_ok};

    fn id(value: &str) -> ExperimentId {
        ExperimentId::new(value).unwrap()
    }

    fn experiment(experiment_id: &str) -> ExperimentConfig {
        ExperimentConfig::new(id(experiment_id), experiment_id)
            .with_variant(VariantDefinition::new(VariantId::new("a").unwrap(), "A"))
            .with_variant(VariantDefinition::new(VariantId::new("b").unwrap(), "B"))
    }

    type Fixture = (
        AutoEndScheduler,
        Arc<AggregationStore>,
        Arc<InMemoryExperimentConfigSource>,
    );

    fn scheduler(configs: Vec<ExperimentConfig>) -> Fixture {
        let store = Arc::new(AggregationStore::new(Arc::new(MetricRegistry::with_defaults())));
        let source = Arc::new(InMemoryExperimentConfigSource::with_configs(configs).unwrap());
        let reporting = Arc::new(ReportingService::new(
            EngineConfig::default(),
            source.clone(),
            store.clone(),
            Arc::new(InMemoryEventRepository::new()),
            Arc::new(LogNotificationSink::new()),
        ));

        (
            AutoEndScheduler::new(reporting, Duration::from_secs(3600)),
            store,
            source,
        )
    }

    #[tokio::test]
    async fn test_first_tick_ends_satisfied_experiment() {
        let (scheduler, store, source) = scheduler(vec![
            experiment("exp-1").with_auto_end_condition(AutoEndCondition::sample_size(1)),
        ]);
        store.fold(&ExperimentEvent::new(id("exp-1"), VariantId::new("a").unwrap(), "s", "page_views"));

        assert_eq!(scheduler.start().await.unwrap(), 1);

        for _ in 0..100 {
            if source.end_reason(&id("exp-1")).is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(source.end_reason(&id("exp-1")).is_some());
        assert!(source.list_tracked().await.unwrap().is_empty());

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_stop_waits_for_every_task() {
        let (scheduler, _, _) = scheduler(vec![experiment("exp-1"), experiment("exp-2")]);

        assert_eq!(scheduler.start().await.unwrap(), 2);
        // Already running tickers are not duplicated
        assert_eq!(scheduler.start().await.unwrap(), 0);
        assert_eq!(scheduler.active_experiments().await, vec![id("exp-1"), id("exp-2")]);

        assert_eq!(scheduler.stop().await, 2);
        assert!(scheduler.active_experiments().await.is_empty());
    }

    #[tokio::test]
    async fn test_trigger_skips_when_in_flight() {
        let (scheduler, _, _) = scheduler(vec![experiment("exp-1")]);
        let flag = scheduler.reporting.flag_for(&id("exp-1"));

        flag.store(true, Ordering::SeqCst);
        assert!(assert_ok!(scheduler.trigger(&id("exp-1")).await).is_none());

        flag.store(false, Ordering::SeqCst);
        let outcome = assert_ok!(scheduler.trigger(&id("exp-1")).await).unwrap();
        assert!(outcome.evaluated);
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_trigger_unknown_experiment() {
        let (scheduler, _, _) = scheduler(vec![]);

        let error = assert_err!(scheduler.trigger(&id("missing")).await);
        assert!(matches!(error, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_trigger_and_evaluate_all_share_in_flight_flag() {
        let (scheduler, _, _) = scheduler(vec![experiment("exp-1")]);
        let flag = scheduler.reporting.flag_for(&id("exp-1"));

        flag.store(true, Ordering::SeqCst);

        let summary = scheduler.reporting.evaluate_all().await.unwrap();
        assert_eq!(summary.evaluated, 0);
        assert_eq!(summary.in_flight, vec![id("exp-1")]);
        assert!(assert_ok!(scheduler.trigger(&id("exp-1")).await).is_none());
    }
}
