//! Report-level recommendations

use crate::domain::analysis::{
    AutoEndDecision, ComparisonRecommendation, ExperimentResults, MetricResults, Recommendation,
    RecommendationAction, RecommendationPriority,
};

/// Significance above which a secondary metric moving the wrong way is flagged
const REGRESSION_SIGNIFICANCE: f64 = 0.95;

/// Recommendations derived from a synthesized report, most urgent first
pub fn generate_recommendations(
    results: &ExperimentResults,
    minimum_sample_size: u64,
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if !results.has_data() {
        recommendations.push(Recommendation::new(
            RecommendationAction::Investigate,
            RecommendationPriority::Medium,
            "No data collected",
            "No events have been aggregated for this experiment; check the event integration",
            1.0,
        ));
        return recommendations;
    }

    let sample_size = results.statistical_analysis.sample_size;

    if sample_size < minimum_sample_size {
        recommendations.push(Recommendation::new(
            RecommendationAction::Continue,
            RecommendationPriority::Medium,
            "Collect more data",
            format!(
                "Smallest variant has {} observations; at least {} are needed before acting",
                sample_size, minimum_sample_size
            ),
            sample_size as f64 / minimum_sample_size.max(1) as f64,
        ));
    } else if let Some(primary) = results.primary_metric_results() {
        recommendations.extend(primary_recommendation(primary));
    }

    for metric in &results.metrics {
        if Some(&metric.metric_id) == results.summary.primary_metric.as_ref() {
            continue;
        }
        if let Some(regression) = regression_warning(metric) {
            recommendations.push(regression);
        }
    }

    recommendations.sort_by(|a, b| b.priority.cmp(&a.priority));
    recommendations
}

fn primary_recommendation(metric: &MetricResults) -> Option<Recommendation> {
    let best = metric.best_comparison()?;
    let treatment = best.treatment_variant_id();

    let recommendation = match best.recommendation {
        ComparisonRecommendation::Deploy => Recommendation::new(
            RecommendationAction::Deploy,
            RecommendationPriority::High,
            format!("Deploy {}", treatment),
            format!(
                "{} improved {} by {:.1}% with {:.0}% significance",
                treatment,
                metric.name,
                best.improvement,
                best.statistical_significance * 100.0
            ),
            best.statistical_significance,
        ),
        ComparisonRecommendation::Continue => Recommendation::new(
            RecommendationAction::Continue,
            RecommendationPriority::Low,
            "Continue experiment",
            format!(
                "{} shows a {:.1}% change that is not yet conclusive",
                metric.name, best.improvement
            ),
            best.statistical_significance,
        ),
        ComparisonRecommendation::Stop if best.practical_significance > 0.8 => {
            Recommendation::new(
                RecommendationAction::Stop,
                RecommendationPriority::High,
                format!("Stop {}", treatment),
                format!(
                    "{} moved {} the wrong way by {:.1}%",
                    treatment, metric.name, best.improvement
                ),
                best.statistical_significance,
            )
        }
        ComparisonRecommendation::Stop => Recommendation::new(
            RecommendationAction::Stop,
            RecommendationPriority::Medium,
            "No meaningful effect",
            format!("{} shows no meaningful difference between variants", metric.name),
            1.0 - best.statistical_significance,
        ),
    };

    Some(recommendation)
}

fn regression_warning(metric: &MetricResults) -> Option<Recommendation> {
    let regressed = metric.comparisons.iter().find(|c| {
        c.statistical_significance > REGRESSION_SIGNIFICANCE
            && c.practical_significance > 0.0
            && !metric.direction.matches_change(c.difference())
    })?;

    Some(Recommendation::new(
        RecommendationAction::Investigate,
        RecommendationPriority::Medium,
        format!("Check {}", metric.name),
        format!(
            "{} changed {} by {:.1}% against its target direction",
            regressed.treatment_variant_id(),
            metric.name,
            regressed.improvement
        ),
        regressed.statistical_significance,
    ))
}

/// Rollback recommendation for an experiment ended by a safety condition
pub fn safety_rollback(decision: &AutoEndDecision) -> Option<Recommendation> {
    if !decision.is_safety_stop() {
        return None;
    }

    Some(Recommendation::new(
        RecommendationAction::Rollback,
        RecommendationPriority::Critical,
        "Roll back experiment",
        decision
            .reason
            .clone()
            .unwrap_or_else(|| "Safety condition triggered".to_string()),
        1.0,
    ))
}
