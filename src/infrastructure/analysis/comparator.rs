//! Control vs treatment comparison

use std::sync::Arc;

use crate::domain::aggregate::AggregatedMetric;
use crate::domain::analysis::{ComparisonRecommendation, ComparisonResult};
use crate::domain::experiment::{ExperimentId, VariantId};
use crate::domain::metric::{MetricDefinition, MetricId, TargetDirection};
use crate::infrastructure::aggregation::AggregationStore;

use super::statistical::{approximate_p_value, pooled_standard_error, relative_change};

/// Share of the target value treated as a fully practical effect
const PRACTICAL_EFFECT_SHARE: f64 = 0.05;

const DEPLOY_SIGNIFICANCE: f64 = 0.95;
const DEPLOY_PRACTICAL: f64 = 0.8;
const CONTINUE_SIGNIFICANCE: f64 = 0.8;
const CONTINUE_PRACTICAL: f64 = 0.5;

/// Computes significance between two variants' aggregates for one metric
#[derive(Clone)]
pub struct Comparator {
    store: Arc<AggregationStore>,
    confidence_level: f64,
}

impl Comparator {
    pub fn new(store: Arc<AggregationStore>, confidence_level: f64) -> Self {
        Self {
            store,
            confidence_level,
        }
    }

    pub fn confidence_level(&self) -> f64 {
        self.confidence_level
    }

    /// Compare treatment against control; `None` when either aggregate is missing
    pub fn compare(
        &self,
        experiment_id: &ExperimentId,
        metric_id: &MetricId,
        control: &VariantId,
        treatment: &VariantId,
    ) -> Option<ComparisonResult> {
        let definition = self.store.registry().get(metric_id)?;
        let control = self.store.read(experiment_id, metric_id, control)?;
        let treatment = self.store.read(experiment_id, metric_id, treatment)?;

        Some(compare_aggregates(
            &definition,
            control,
            treatment,
            self.confidence_level,
        ))
    }
}

/// Pure comparison of two aggregate snapshots
pub fn compare_aggregates(
    definition: &MetricDefinition,
    control: AggregatedMetric,
    treatment: AggregatedMetric,
    confidence_level: f64,
) -> ComparisonResult {
    let control_value = control.aggregated_value();
    let treatment_value = treatment.aggregated_value();
    let difference = treatment_value - control_value;

    let statistical_significance = significance(&control, &treatment);
    let practical_significance = practical_significance(definition, difference);
    let improvement = relative_change(control_value, treatment_value);

    let recommendation = recommend(
        statistical_significance,
        practical_significance,
        difference,
        definition.direction(),
    );

    ComparisonResult {
        metric_id: definition.id().clone(),
        control,
        treatment,
        statistical_significance,
        practical_significance,
        improvement,
        confidence_level,
        recommendation,
    }
}

/// `1 - p`, with zero pooled error treated as fully separated data
fn significance(control: &AggregatedMetric, treatment: &AggregatedMetric) -> f64 {
    let pooled = pooled_standard_error(control, treatment);

    if pooled == 0.0 {
        return 1.0;
    }

    let z = (treatment.aggregated_value() - control.aggregated_value()).abs() / pooled;
    1.0 - approximate_p_value(z)
}

fn practical_significance(definition: &MetricDefinition, difference: f64) -> f64 {
    let Some(target) = definition.target() else {
        return 0.0;
    };

    let meaningful_effect = (target.value * PRACTICAL_EFFECT_SHARE).abs();

    if meaningful_effect == 0.0 {
        return 0.0;
    }

    (difference.abs() / meaningful_effect).min(1.0)
}

/// Verdict from significance, practical significance and the direction of change
pub fn recommend(
    significance: f64,
    practical: f64,
    difference: f64,
    direction: TargetDirection,
) -> ComparisonRecommendation {
    if significance > DEPLOY_SIGNIFICANCE && practical > DEPLOY_PRACTICAL {
        return if direction.matches_change(difference) {
            ComparisonRecommendation::Deploy
        } else {
            ComparisonRecommendation::Stop
        };
    }

    if significance > CONTINUE_SIGNIFICANCE || practical > CONTINUE_PRACTICAL {
        ComparisonRecommendation::Continue
    } else {
        ComparisonRecommendation::Stop
    }
}
