//! Experiment report synthesis
//!
//! A report is rebuilt from the aggregation store on every call; nothing is
//! cached between calls.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::analysis::{
    ExperimentResults, MetricResults, ResultsSummary, StatisticalAnalysis, VariantMetricValue,
    VariantResults,
};
use crate::domain::experiment::{ExperimentConfig, ExperimentId, VariantId};
use crate::domain::metric::{MetricDefinition, MetricId};
use crate::infrastructure::aggregation::AggregationStore;

use super::comparator::Comparator;
use super::recommendations::generate_recommendations;
use super::statistical::{required_sample_size, statistical_power};

/// Share of the primary metric target used as the minimum detectable effect
const DETECTABLE_EFFECT_SHARE: f64 = 0.05;

/// Variant as seen by the synthesizer
#[derive(Debug, Clone)]
struct VariantSlot {
    id: VariantId,
    name: String,
    is_control: bool,
}

/// Inputs that differ between an ad-hoc and a configured synthesis
struct SynthesisPlan<'a> {
    experiment_id: &'a ExperimentId,
    variants: Vec<VariantSlot>,
    metrics: Vec<MetricDefinition>,
    primary_metric: Option<MetricId>,
    duration_days: f64,
    now: DateTime<Utc>,
}

/// Builds `ExperimentResults` from current aggregates
#[derive(Clone)]
pub struct ResultsSynthesizer {
    store: Arc<AggregationStore>,
    comparator: Comparator,
    minimum_sample_size: u64,
}

impl ResultsSynthesizer {
    pub fn new(store: Arc<AggregationStore>, comparator: Comparator, minimum_sample_size: u64) -> Self {
        Self {
            store,
            comparator,
            minimum_sample_size,
        }
    }

    pub fn comparator(&self) -> &Comparator {
        &self.comparator
    }

    /// Report over every registered metric; the first variant is the control
    pub fn synthesize(&self, experiment_id: &ExperimentId, variant_ids: &[VariantId]) -> ExperimentResults {
        let variants = variant_ids
            .iter()
            .enumerate()
            .map(|(i, id)| VariantSlot {
                id: id.clone(),
                name: id.to_string(),
                is_control: i == 0,
            })
            .collect();

        let metrics = self.store.registry().list();
        let primary_metric = metrics.iter().find(|m| m.is_primary()).map(|m| m.id().clone());

        self.build(SynthesisPlan {
            experiment_id,
            variants,
            metrics,
            primary_metric,
            duration_days: 0.0,
            now: Utc::now(),
        })
    }

    /// Report for a configured experiment.
    ///
    /// Restricted to the configured metrics when the config lists any; the
    /// flagged (or first) variant is the control.
    pub fn synthesize_experiment(&self, config: &ExperimentConfig, now: DateTime<Utc>) -> ExperimentResults {
        let control_id = config.control_variant().map(|v| v.id().clone());

        let variants = config
            .variants()
            .iter()
            .map(|v| VariantSlot {
                id: v.id().clone(),
                name: v.name().to_string(),
                is_control: Some(v.id()) == control_id.as_ref(),
            })
            .collect();

        let registry = self.store.registry();
        let metrics: Vec<_> = if config.metrics().is_empty() {
            registry.list()
        } else {
            config
                .metrics()
                .iter()
                .filter_map(|id| registry.get(id))
                .collect()
        };

        let primary_metric = config
            .primary_metric()
            .cloned()
            .or_else(|| metrics.iter().find(|m| m.is_primary()).map(|m| m.id().clone()));

        self.build(SynthesisPlan {
            experiment_id: config.id(),
            variants,
            metrics,
            primary_metric,
            duration_days: config.elapsed_days(now),
            now,
        })
    }

    fn build(&self, plan: SynthesisPlan<'_>) -> ExperimentResults {
        let mut results = ExperimentResults::new(plan.experiment_id.clone(), plan.now);
        let control = plan.variants.iter().find(|v| v.is_control).map(|v| v.id.clone());
        results.control_variant = control.clone();

        let mut per_variant: BTreeMap<VariantId, BTreeMap<MetricId, VariantMetricValue>> =
            BTreeMap::new();

        for definition in &plan.metrics {
            let Some(metric_results) =
                self.metric_results(plan.experiment_id, definition, &plan.variants, control.as_ref())
            else {
                continue;
            };

            for value in &metric_results.values {
                per_variant
                    .entry(value.variant_id.clone())
                    .or_default()
                    .insert(definition.id().clone(), value.clone());
            }

            results.metrics.push(metric_results);
        }

        results.variants = plan
            .variants
            .iter()
            .map(|slot| {
                let metrics = per_variant.remove(&slot.id).unwrap_or_default();
                let participants = metrics.values().map(|v| v.count).max().unwrap_or(0);

                VariantResults {
                    variant_id: slot.id.clone(),
                    name: slot.name.clone(),
                    is_control: slot.is_control,
                    participants,
                    metrics,
                }
            })
            .collect();

        let (overall_confidence, primary_winner) = plan
            .primary_metric
            .as_ref()
            .and_then(|id| results.metric(id))
            .map(|m| (m.significance, m.winner.clone()))
            .unwrap_or((0.0, None));

        results.summary = ResultsSummary {
            total_participants: results.variants.iter().map(|v| v.participants).sum(),
            duration_days: plan.duration_days,
            overall_confidence,
            primary_metric: plan.primary_metric.clone(),
            primary_winner,
        };

        let primary_definition = plan
            .primary_metric
            .as_ref()
            .and_then(|id| plan.metrics.iter().find(|m| m.id() == id));

        results.statistical_analysis = self.statistical_analysis(&results, primary_definition, &plan.variants);
        results.recommendations = generate_recommendations(&results, self.minimum_sample_size);

        results
    }

    fn metric_results(
        &self,
        experiment_id: &ExperimentId,
        definition: &MetricDefinition,
        variants: &[VariantSlot],
        control: Option<&VariantId>,
    ) -> Option<MetricResults> {
        let values: Vec<_> = variants
            .iter()
            .filter_map(|slot| self.store.read(experiment_id, definition.id(), &slot.id))
            .map(|agg| VariantMetricValue {
                variant_id: agg.variant_id().clone(),
                value: agg.aggregated_value(),
                count: agg.count(),
                confidence_interval: agg.confidence_interval(),
            })
            .collect();

        if values.is_empty() {
            return None;
        }

        let direction = definition.direction();

        // Strictly better only, so the first variant keeps ties
        let winner = values.iter().fold(None::<&VariantMetricValue>, |best, v| match best {
            Some(b) if !direction.is_better(v.value, b.value) => Some(b),
            _ => Some(v),
        });

        let comparisons: Vec<_> = match control {
            Some(control) => variants
                .iter()
                .filter(|slot| &slot.id != control)
                .filter_map(|slot| {
                    self.comparator
                        .compare(experiment_id, definition.id(), control, &slot.id)
                })
                .collect(),
            None => Vec::new(),
        };

        let mut metric_results = MetricResults {
            metric_id: definition.id().clone(),
            name: definition.name().to_string(),
            aggregation: definition.aggregation(),
            direction,
            winner: winner.map(|w| w.variant_id.clone()),
            winner_value: winner.map(|w| w.value),
            significance: 0.0,
            improvement: 0.0,
            values,
            comparisons,
        };

        if let Some(best) = metric_results.best_comparison() {
            let (significance, improvement) = (best.statistical_significance, best.improvement);
            metric_results.significance = significance;
            metric_results.improvement = improvement;
        }

        Some(metric_results)
    }

    fn statistical_analysis(
        &self,
        results: &ExperimentResults,
        primary: Option<&MetricDefinition>,
        variants: &[VariantSlot],
    ) -> StatisticalAnalysis {
        let confidence_level = self.comparator.confidence_level();

        let Some(metric) = primary.and_then(|d| results.metric(d.id())) else {
            return StatisticalAnalysis {
                required_sample_size: self.minimum_sample_size,
                confidence_level,
                ..Default::default()
            };
        };

        // Smallest arm bounds the power; arms without data count as zero
        let sample_size = variants
            .iter()
            .map(|slot| metric.value_for(&slot.id).map(|v| v.count).unwrap_or(0))
            .min()
            .unwrap_or(0);

        let variances: Vec<f64> = metric
            .comparisons
            .iter()
            .flat_map(|c| [c.control.variance(), c.treatment.variance()])
            .collect();
        let variance = if variances.is_empty() {
            0.0
        } else {
            variances.iter().sum::<f64>() / variances.len() as f64
        };

        let effect = primary
            .and_then(|d| d.target())
            .map(|t| t.value * DETECTABLE_EFFECT_SHARE)
            .filter(|e| *e != 0.0)
            .or_else(|| metric.best_comparison().map(|c| c.difference()))
            .unwrap_or(0.0);

        StatisticalAnalysis {
            sample_size,
            statistical_power: statistical_power(variance, effect, sample_size),
            required_sample_size: required_sample_size(variance, effect)
                .unwrap_or(self.minimum_sample_size),
            confidence_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::ExperimentEvent;
    use crate::domain::experiment::VariantDefinition;
    use crate::domain::metric::MetricRegistry;
    use chrono::Duration;

    fn experiment() -> ExperimentId {
        ExperimentId::new("exp-1").unwrap()
    }

    fn variant(id: &str) -> VariantId {
        VariantId::new(id).unwrap()
    }

    fn metric(id: &str) -> MetricId {
        MetricId::new(id).unwrap()
    }

    fn setup() -> (Arc<AggregationStore>, ResultsSynthesizer) {
        let store = Arc::new(AggregationStore::new(Arc::new(MetricRegistry::with_defaults())));
        let comparator = Comparator::new(store.clone(), 0.95);
        let synthesizer = ResultsSynthesizer::new(store.clone(), comparator, 100);
        (store, synthesizer)
    }

    fn fold_n(store: &AggregationStore, variant_id: &str, metric_id: &str, value: f64, n: usize) {
        for _ in 0..n {
            store.fold(
                &ExperimentEvent::new(experiment(), variant(variant_id), "s", metric_id)
                    .with_value(value),
            );
        }
    }

    #[test]
    fn test_winner_follows_target_direction() {
        let (store, synthesizer) = setup();
        fold_n(&store, "control", "conversion_rate", 0.04, 10);
        fold_n(&store, "treatment", "conversion_rate", 0.06, 10);
        fold_n(&store, "control", "response_time", 180.0, 10);
        fold_n(&store, "treatment", "response_time", 250.0, 10);

        let results = synthesizer.synthesize(&experiment(), &[variant("control"), variant("treatment")]);

        let conversion = results.metric(&metric("conversion_rate")).unwrap();
        assert_eq!(conversion.winner, Some(variant("treatment")));
        assert_eq!(conversion.winner_value, Some(0.06));

        let latency = results.metric(&metric("response_time")).unwrap();
        assert_eq!(latency.winner, Some(variant("control")));
    }

    #[test]
    fn test_ties_go_to_first_variant() {
        let (store, synthesizer) = setup();
        fold_n(&store, "treatment", "revenue", 10.0, 1);
        fold_n(&store, "control", "revenue", 10.0, 1);

        let results = synthesizer.synthesize(&experiment(), &[variant("control"), variant("treatment")]);
        assert_eq!(
            results.metric(&metric("revenue")).unwrap().winner,
            Some(variant("control"))
        );
    }

    #[test]
    fn test_metrics_without_data_are_omitted() {
        let (store, synthesizer) = setup();
        fold_n(&store, "control", "page_views", 1.0, 3);

        let results = synthesizer.synthesize(&experiment(), &[variant("control"), variant("treatment")]);

        assert_eq!(results.metrics.len(), 1);
        assert!(results.metrics[0].comparisons.is_empty());
        assert_eq!(results.metrics[0].significance, 0.0);
    }

    #[test]
    fn test_participants_are_max_count_per_variant() {
        let (store, synthesizer) = setup();
        fold_n(&store, "control", "page_views", 1.0, 30);
        fold_n(&store, "control", "revenue", 5.0, 12);
        fold_n(&store, "treatment", "page_views", 1.0, 20);

        let results = synthesizer.synthesize(&experiment(), &[variant("control"), variant("treatment")]);

        assert_eq!(results.variant(&variant("control")).unwrap().participants, 30);
        assert_eq!(results.variant(&variant("treatment")).unwrap().participants, 20);
        assert_eq!(results.summary.total_participants, 50);
    }

    #[test]
    fn test_empty_store_gives_empty_report() {
        let (_, synthesizer) = setup();
        let results = synthesizer.synthesize(&experiment(), &[variant("control"), variant("treatment")]);

        assert!(results.metrics.is_empty());
        assert!(!results.has_data());
        assert_eq!(results.summary.overall_confidence, 0.0);
        assert_eq!(results.statistical_analysis.required_sample_size, 100);
    }

    #[test]
    fn test_configured_experiment_report() {
        let (store, synthesizer) = setup();
        fold_n(&store, "a", "conversion_rate", 0.04, 100);
        fold_n(&store, "b", "conversion_rate", 0.06, 100);
        fold_n(&store, "b", "revenue", 3.0, 5);

        let now = Utc::now();
        let config = ExperimentConfig::new(experiment(), "Checkout")
            .with_variant(VariantDefinition::new(variant("a"), "Treatment A"))
            .with_variant(VariantDefinition::new(variant("b"), "Baseline").with_control(true))
            .with_metric(metric("conversion_rate"))
            .with_primary_metric(metric("conversion_rate"))
            .with_start_date(now - Duration::days(3));

        let results = synthesizer.synthesize_experiment(&config, now);

        assert_eq!(results.control_variant, Some(variant("b")));
        assert_eq!(results.metrics.len(), 1);
        assert!((results.summary.duration_days - 3.0).abs() < 1e-6);
        assert_eq!(results.summary.primary_winner, Some(variant("b")));
        assert_eq!(results.summary.overall_confidence, 1.0);

        let comparison = &results.metrics[0].comparisons[0];
        assert_eq!(comparison.control_variant_id(), &variant("b"));
        assert_eq!(comparison.treatment_variant_id(), &variant("a"));
        assert_eq!(results.variant(&variant("b")).unwrap().name, "Baseline");
    }

    #[test]
    fn test_statistical_analysis_uses_variance() {
        let (store, synthesizer) = setup();
        for i in 0..50 {
            let v = if i % 2 == 0 { 1.0 } else { 0.0 };
            fold_n(&store, "control", "conversion_rate", v, 1);
            fold_n(&store, "treatment", "conversion_rate", v, 1);
        }

        let results = synthesizer.synthesize(&experiment(), &[variant("control"), variant("treatment")]);
        let analysis = &results.statistical_analysis;

        // variance 0.25, effect 0.0025 → 2 * 2.8^2 * 0.25 / 0.0025^2
        assert_eq!(analysis.sample_size, 50);
        assert!((627_199..=627_201).contains(&analysis.required_sample_size));
        assert!(!analysis.is_sufficiently_powered());
        assert!(analysis.statistical_power < 0.1);
    }
}
