//! Running per-(metric, variant) statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::experiment::{ExperimentId, VariantId};
use crate::domain::metric::{AggregationKind, MetricId};

/// Critical value used once a sample has more than `LARGE_SAMPLE_THRESHOLD` observations
pub const CRITICAL_VALUE_LARGE_SAMPLE: f64 = 1.96;

/// Conservative critical value for small samples (stands in for a t quantile)
pub const CRITICAL_VALUE_SMALL_SAMPLE: f64 = 2.576;

/// Sample size above which the normal critical value is used
pub const LARGE_SAMPLE_THRESHOLD: u64 = 30;

// ============================================================================
// AggregateKey
// ============================================================================

/// Identity of one aggregate: a metric observed within one variant of one experiment
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AggregateKey {
    pub experiment_id: ExperimentId,
    pub metric_id: MetricId,
    pub variant_id: VariantId,
}

impl AggregateKey {
    pub fn new(experiment_id: ExperimentId, metric_id: MetricId, variant_id: VariantId) -> Self {
        Self {
            experiment_id,
            metric_id,
            variant_id,
        }
    }
}

impl fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.experiment_id, self.metric_id, self.variant_id
        )
    }
}

// ============================================================================
// ConfidenceInterval
// ============================================================================

/// Two-sided interval around an aggregate's value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

impl ConfidenceInterval {
    /// Degenerate interval collapsed onto a single value
    pub fn point(value: f64) -> Self {
        Self {
            lower: value,
            upper: value,
        }
    }

    /// Symmetric interval `center ± half_width`
    pub fn around(center: f64, half_width: f64) -> Self {
        Self {
            lower: center - half_width,
            upper: center + half_width,
        }
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

// ============================================================================
// AggregatedMetric
// ============================================================================

/// Running statistic for one `AggregateKey`.
///
/// The meaning of `aggregated_value` depends on the aggregation kind: a
/// running total for `sum`, the event count for `count`/`unique_count`, and a
/// running mean for `average`, `median` and `rate`. `variance` is the
/// population variance of folded values and stays zero for non-mean kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetric {
    key: AggregateKey,
    aggregation: AggregationKind,
    aggregated_value: f64,
    count: u64,
    variance: f64,
    confidence_interval: ConfidenceInterval,
    last_updated: DateTime<Utc>,
}

impl AggregatedMetric {
    /// Create an empty aggregate
    pub fn new(key: AggregateKey, aggregation: AggregationKind, created_at: DateTime<Utc>) -> Self {
        Self {
            key,
            aggregation,
            aggregated_value: 0.0,
            count: 0,
            variance: 0.0,
            confidence_interval: ConfidenceInterval::point(0.0),
            last_updated: created_at,
        }
    }

    /// Fold one observation into the running statistic.
    ///
    /// Non-finite values are rejected and leave the aggregate untouched;
    /// returns whether the value was folded.
    pub fn fold(&mut self, value: f64, observed_at: DateTime<Utc>) -> bool {
        if !value.is_finite() {
            return false;
        }

        self.count += 1;

        match self.aggregation {
            AggregationKind::Sum => {
                self.aggregated_value += value;
            }
            AggregationKind::Count | AggregationKind::UniqueCount => {
                // Unique values are not tracked; every event counts once
                self.aggregated_value = self.count as f64;
            }
            AggregationKind::Average | AggregationKind::Median | AggregationKind::Rate => {
                self.welford_update(value);
            }
        }

        if observed_at > self.last_updated {
            self.last_updated = observed_at;
        }
        self.confidence_interval = self.compute_interval();

        true
    }

    /// Single-pass mean/variance update; `count` already includes `value`
    fn welford_update(&mut self, value: f64) {
        let n = self.count as f64;
        let delta = value - self.aggregated_value;
        self.aggregated_value += delta / n;
        let delta2 = value - self.aggregated_value;

        self.variance = if self.count < 2 {
            0.0
        } else {
            (((n - 1.0) * self.variance + delta * delta2) / n).max(0.0)
        };
    }

    fn compute_interval(&self) -> ConfidenceInterval {
        if self.count < 2 {
            return ConfidenceInterval::point(self.aggregated_value);
        }

        ConfidenceInterval::around(
            self.aggregated_value,
            critical_value(self.count) * self.standard_error(),
        )
    }

    pub fn key(&self) -> &AggregateKey {
        &self.key
    }

    pub fn experiment_id(&self) -> &ExperimentId {
        &self.key.experiment_id
    }

    pub fn metric_id(&self) -> &MetricId {
        &self.key.metric_id
    }

    pub fn variant_id(&self) -> &VariantId {
        &self.key.variant_id
    }

    pub fn aggregation(&self) -> AggregationKind {
        self.aggregation
    }

    pub fn aggregated_value(&self) -> f64 {
        self.aggregated_value
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    /// `sqrt(variance / count)`, zero for an empty aggregate
    pub fn standard_error(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        (self.variance / self.count as f64).sqrt()
    }

    pub fn confidence_interval(&self) -> ConfidenceInterval {
        self.confidence_interval
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }
}

/// Fixed 95% critical value by sample size
pub fn critical_value(count: u64) -> f64 {
    if count > LARGE_SAMPLE_THRESHOLD {
        CRITICAL_VALUE_LARGE_SAMPLE
    } else {
        CRITICAL_VALUE_SMALL_SAMPLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key(metric: &str) -> AggregateKey {
        AggregateKey::new(
            ExperimentId::new("exp-1").unwrap(),
            MetricId::new(metric).unwrap(),
            VariantId::new("control").unwrap(),
        )
    }

    fn aggregate(kind: AggregationKind) -> AggregatedMetric {
        AggregatedMetric::new(key("metric"), kind, Utc::now())
    }

    fn fold_all(kind: AggregationKind, values: &[f64]) -> AggregatedMetric {
        let mut agg = aggregate(kind);
        for v in values {
            agg.fold(*v, Utc::now());
        }
        agg
    }

    #[test]
    fn test_sum_accumulates() {
        let agg = fold_all(AggregationKind::Sum, &[10.0, 5.5, 4.5]);

        assert_eq!(agg.count(), 3);
        assert_eq!(agg.aggregated_value(), 20.0);
        assert_eq!(agg.variance(), 0.0);
    }

    #[test]
    fn test_count_ignores_values() {
        let agg = fold_all(AggregationKind::Count, &[100.0, -3.0, 0.0, 7.0]);
        assert_eq!(agg.aggregated_value(), 4.0);

        let agg = fold_all(AggregationKind::UniqueCount, &[1.0, 1.0]);
        assert_eq!(agg.aggregated_value(), 2.0);
    }

    #[test]
    fn test_average_mean_and_population_variance() {
        let agg = fold_all(
            AggregationKind::Average,
            &[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0],
        );

        assert!((agg.aggregated_value() - 5.0).abs() < 1e-12);
        assert!((agg.variance() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_median_and_rate_use_running_mean() {
        let median = fold_all(AggregationKind::Median, &[1.0, 2.0, 100.0]);
        assert!((median.aggregated_value() - 103.0 / 3.0).abs() < 1e-12);

        let rate = fold_all(AggregationKind::Rate, &[1.0, 0.0, 0.0, 1.0]);
        assert!((rate.aggregated_value() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_single_observation_interval_is_point() {
        let agg = fold_all(AggregationKind::Average, &[42.0]);

        assert_eq!(agg.variance(), 0.0);
        assert_eq!(agg.confidence_interval(), ConfidenceInterval::point(42.0));
    }

    #[test]
    fn test_interval_uses_small_sample_critical_value() {
        let agg = fold_all(AggregationKind::Average, &[1.0, 3.0]);

        // mean 2, population variance 1, se = sqrt(1/2)
        let half = CRITICAL_VALUE_SMALL_SAMPLE * (0.5f64).sqrt();
        let ci = agg.confidence_interval();
        assert!((ci.lower - (2.0 - half)).abs() < 1e-12);
        assert!((ci.upper - (2.0 + half)).abs() < 1e-12);
    }

    #[test]
    fn test_interval_switches_to_normal_critical_value() {
        let values: Vec<f64> = (0..31).map(|i| (i % 2) as f64).collect();
        let agg = fold_all(AggregationKind::Average, &values);

        let half = CRITICAL_VALUE_LARGE_SAMPLE * agg.standard_error();
        assert!((agg.confidence_interval().width() - 2.0 * half).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let mut agg = fold_all(AggregationKind::Average, &[1.0, 2.0]);
        let before = agg.clone();

        assert!(!agg.fold(f64::NAN, Utc::now()));
        assert!(!agg.fold(f64::INFINITY, Utc::now()));
        assert_eq!(agg, before);
    }

    #[test]
    fn test_last_updated_never_moves_backwards() {
        let mut agg = aggregate(AggregationKind::Sum);
        let later = Utc::now() + chrono::Duration::minutes(5);
        let earlier = later - chrono::Duration::minutes(10);

        agg.fold(1.0, later);
        agg.fold(1.0, earlier);

        assert_eq!(agg.last_updated(), later);
    }

    #[test]
    fn test_serde_round_trip_is_exact() {
        let agg = fold_all(AggregationKind::Rate, &[0.1, 0.7, 0.3, 0.9, 0.2]);

        let json = serde_json::to_string(&agg).unwrap();
        let restored: AggregatedMetric = serde_json::from_str(&json).unwrap();

        assert_eq!(agg, restored);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property: identical values give mean = v and zero variance
        #[test]
        fn prop_identical_values_have_zero_variance(
            v in -1.0e6f64..1.0e6,
            n in 1usize..200
        ) {
            let agg = fold_all(AggregationKind::Average, &vec![v; n]);

            prop_assert_eq!(agg.aggregated_value(), v);
            prop_assert_eq!(agg.variance(), 0.0);
            prop_assert_eq!(agg.confidence_interval(), ConfidenceInterval::point(v));
        }

        /// Property: count equals the number of folds and never decreases
        #[test]
        fn prop_count_is_monotonic(
            values in proptest::collection::vec(-1000.0f64..1000.0, 0..100),
            kind in prop_oneof![
                Just(AggregationKind::Sum),
                Just(AggregationKind::Average),
                Just(AggregationKind::Count),
                Just(AggregationKind::UniqueCount),
                Just(AggregationKind::Median),
                Just(AggregationKind::Rate),
            ]
        ) {
            let mut agg = aggregate(kind);
            let mut previous = 0;

            for v in &values {
                agg.fold(*v, Utc::now());
                prop_assert!(agg.count() >= previous);
                previous = agg.count();
            }

            prop_assert_eq!(agg.count(), values.len() as u64);
        }

        /// Property: below two observations the interval is a point on the value
        #[test]
        fn prop_interval_collapses_below_two(v in -1.0e3f64..1.0e3) {
            let agg = fold_all(AggregationKind::Average, &[v]);
            let ci = agg.confidence_interval();

            prop_assert_eq!(ci.lower, agg.aggregated_value());
            prop_assert_eq!(ci.upper, agg.aggregated_value());
        }

        /// Property: variance is never negative and the mean stays within range
        #[test]
        fn prop_welford_bounds(
            values in proptest::collection::vec(-1000.0f64..1000.0, 1..100)
        ) {
            let agg = fold_all(AggregationKind::Average, &values);
            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

            prop_assert!(agg.variance() >= 0.0);
            prop_assert!(agg.aggregated_value() >= min - 1e-9);
            prop_assert!(agg.aggregated_value() <= max + 1e-9);
        }
    }
}
