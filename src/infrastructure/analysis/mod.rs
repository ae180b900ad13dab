//! Analysis infrastructure - comparison, synthesis and auto-end evaluation

mod auto_end;
mod comparator;
mod recommendations;
mod statistical;
mod synthesizer;

pub use auto_end::AutoEndEvaluator;
pub use comparator::{compare_aggregates, recommend, Comparator};
pub use recommendations::{generate_recommendations, safety_rollback};
pub use statistical::{
    approximate_p_value, normal_cdf, pooled_standard_error, relative_change,
    required_sample_size, statistical_power,
};
pub use synthesizer::ResultsSynthesizer;
