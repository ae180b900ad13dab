//! Analysis domain module
//!
//! Comparison results, synthesized reports and auto-end rules.

mod auto_end;
mod comparison;
mod results;

pub use auto_end::{AutoEndCondition, AutoEndDecision, AutoEndRule};
pub use comparison::{ComparisonRecommendation, ComparisonResult};
pub use results::{
    ExperimentResults, MetricResults, Recommendation, RecommendationAction,
    RecommendationPriority, ResultsSummary, StatisticalAnalysis, VariantMetricValue,
    VariantResults,
};
