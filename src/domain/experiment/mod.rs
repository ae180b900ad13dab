//! Experiment domain module
//!
//! Experiment configuration as supplied by the external registry: variants,
//! tracked metrics, auto-end conditions, start date and status.

mod entity;
mod source;
mod validation;

pub use entity::{
    ExperimentConfig, ExperimentId, ExperimentStatus, VariantDefinition, VariantId,
};
pub use source::ExperimentConfigSource;
pub use validation::{validate_experiment_id, validate_variant_id, ExperimentValidationError};

#[cfg(test)]
pub use source::MockExperimentConfigSource;
