//! Statistical helpers for experiment analysis
//!
//! These are deliberately simplified: fixed z breakpoints stand in for a
//! p-value computation and power uses the normal approximation. They are not
//! a general-purpose statistics library.

use crate::domain::aggregate::AggregatedMetric;

/// Two-sided z for 99% confidence
pub const Z_99: f64 = 2.576;

/// Two-sided z for 95% confidence
pub const Z_95: f64 = 1.96;

/// One-sided z for 80% power
pub const Z_POWER_80: f64 = 0.84;

/// Approximate two-sided p-value from a z statistic using fixed breakpoints
pub fn approximate_p_value(z: f64) -> f64 {
    if z >= Z_99 {
        0.01
    } else if z >= Z_95 {
        0.05
    } else {
        0.5
    }
}

/// `sqrt(var_c / n_c + var_t / n_t)`; empty aggregates contribute nothing
pub fn pooled_standard_error(control: &AggregatedMetric, treatment: &AggregatedMetric) -> f64 {
    (variance_of_mean(control) + variance_of_mean(treatment)).sqrt()
}

fn variance_of_mean(aggregate: &AggregatedMetric) -> f64 {
    if aggregate.count() == 0 {
        return 0.0;
    }
    aggregate.variance() / aggregate.count() as f64
}

/// Relative change from control to treatment in percent; zero control yields 0
pub fn relative_change(control: f64, treatment: f64) -> f64 {
    if control != 0.0 {
        (treatment - control) / control * 100.0
    } else {
        0.0
    }
}

/// Per-variant sample size needed to detect `effect` at 95% confidence and
/// 80% power: `2 (z_a + z_b)^2 sigma^2 / effect^2`.
///
/// Returns `None` when variance or effect is zero.
pub fn required_sample_size(variance: f64, effect: f64) -> Option<u64> {
    if variance <= 0.0 || effect == 0.0 || !variance.is_finite() || !effect.is_finite() {
        return None;
    }

    let z = Z_95 + Z_POWER_80;
    let n = 2.0 * z * z * variance / (effect * effect);

    Some(n.ceil() as u64)
}

/// Approximate power `Phi(|effect| / se - z_a)` for a two-sample comparison
/// with `per_variant` observations per arm
pub fn statistical_power(variance: f64, effect: f64, per_variant: u64) -> f64 {
    if per_variant == 0 {
        return 0.0;
    }

    let standard_error = (2.0 * variance.max(0.0) / per_variant as f64).sqrt();

    if standard_error == 0.0 {
        return if effect != 0.0 { 1.0 } else { 0.0 };
    }

    normal_cdf(effect.abs() / standard_error - Z_95).clamp(0.0, 1.0)
}

/// Polynomial weights of the upper-tail approximation, lowest power first
const TAIL_WEIGHTS: [f64; 5] = [
    0.319_381_530,
    -0.356_563_782,
    1.781_477_937,
    -1.821_255_978,
    1.330_274_429,
];

/// Standard normal cumulative distribution function
///
/// The upper tail is the density times a quintic in `1 / (1 + 0.2316419 |x|)`;
/// absolute error stays below 1e-7.
pub fn normal_cdf(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.231_641_9 * z);
    let density = (-0.5 * z * z).exp() / (2.0 * std::f64::consts::PI).sqrt();

    let polynomial = TAIL_WEIGHTS.iter().rev().fold(0.0, |acc, w| (acc + w) * t);
    let upper_tail = density * polynomial;

    if x >= 0.0 {
        1.0 - upper_tail
    } else {
        upper_tail
    }
}
