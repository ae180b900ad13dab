//! Auto-end evaluation
//!
//! Conditions are checked in descending priority. At equal priority safety
//! conditions go first so a simultaneously satisfied growth condition can
//! never mask a safety violation; remaining ties keep declaration order.

use crate::domain::analysis::{AutoEndCondition, AutoEndDecision, AutoEndRule, ExperimentResults};

/// Evaluates auto-end conditions against a synthesized report
#[derive(Debug, Clone, Copy)]
pub struct AutoEndEvaluator {
    default_confidence: f64,
}

impl AutoEndEvaluator {
    pub fn new(default_confidence: f64) -> Self {
        Self { default_confidence }
    }

    /// Conditions in evaluation order
    pub fn ordered(conditions: &[AutoEndCondition]) -> Vec<&AutoEndCondition> {
        let mut ordered: Vec<_> = conditions.iter().collect();
        // Stable sort keeps declaration order within equal keys
        ordered.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(b.is_safety().cmp(&a.is_safety()))
        });
        ordered
    }

    /// First satisfied condition wins; otherwise the experiment keeps running
    pub fn evaluate(
        &self,
        conditions: &[AutoEndCondition],
        results: &ExperimentResults,
        elapsed_days: f64,
    ) -> AutoEndDecision {
        Self::ordered(conditions)
            .into_iter()
            .find_map(|condition| {
                self.check(&condition.rule, results, elapsed_days)
                    .map(|reason| AutoEndDecision::end(reason, condition.clone()))
            })
            .unwrap_or_else(AutoEndDecision::keep_running)
    }

    /// Reason when the rule's predicate holds
    fn check(&self, rule: &AutoEndRule, results: &ExperimentResults, elapsed_days: f64) -> Option<String> {
        match rule {
            AutoEndRule::Time { max_days } => (elapsed_days >= *max_days).then(|| {
                format!(
                    "Maximum duration of {} days reached ({:.1} days elapsed)",
                    max_days, elapsed_days
                )
            }),

            AutoEndRule::SampleSize { target } => {
                let total = results.summary.total_participants;
                (total >= *target).then(|| {
                    format!(
                        "Sample size target of {} reached ({} participants)",
                        target, total
                    )
                })
            }

            AutoEndRule::StatisticalSignificance {
                target_confidence,
                metric_id,
            } => {
                let target = target_confidence.unwrap_or(self.default_confidence);
                let metric_id = metric_id
                    .as_ref()
                    .or(results.summary.primary_metric.as_ref())?;
                let significance = results.metric(metric_id)?.significance;

                (significance >= target).then(|| {
                    format!(
                        "Metric {} reached {:.1}% significance (target {:.1}%)",
                        metric_id,
                        significance * 100.0,
                        target * 100.0
                    )
                })
            }

            AutoEndRule::MetricThreshold {
                metric_id,
                threshold,
                direction,
            } => {
                let value = results.winner_value(metric_id)?;

                direction.has_crossed(value, *threshold).then(|| {
                    format!(
                        "Metric {} reached {} (threshold {})",
                        metric_id, value, threshold
                    )
                })
            }

            AutoEndRule::Safety {
                metric_ids,
                minimum,
            } => metric_ids.iter().find_map(|metric_id| {
                let value = results.winner_value(metric_id)?;

                (value < *minimum).then(|| {
                    format!(
                        "Safety metric {} fell to {} below minimum {}",
                        metric_id, value, minimum
                    )
                })
            }),
        }
    }
}
