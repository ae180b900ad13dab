//! Identifier validation for experiments and variants

use thiserror::Error;

/// Maximum length for experiment IDs
pub const MAX_EXPERIMENT_ID_LENGTH: usize = 64;

/// Maximum length for variant IDs
pub const MAX_VARIANT_ID_LENGTH: usize = 50;

/// Validation errors for experiments and variants
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExperimentValidationError {
    #[error("Experiment ID cannot be empty")]
    EmptyId,

    #[error("Experiment ID exceeds maximum length of {0} characters")]
    IdTooLong(usize),

    #[error("Experiment ID must start and end with a letter or number")]
    InvalidIdBoundary,

    #[error("Experiment ID contains invalid character: '{0}'")]
    InvalidIdCharacter(char),

    #[error("Experiment ID cannot contain consecutive separators")]
    ConsecutiveSeparators,

    #[error("Variant ID cannot be empty")]
    EmptyVariantId,

    #[error("Variant ID exceeds maximum length of {0} characters")]
    VariantIdTooLong(usize),

    #[error("Variant ID must start and end with a letter or number")]
    InvalidVariantIdBoundary,

    #[error("Variant ID contains invalid character: '{0}'")]
    InvalidVariantIdCharacter(char),

    #[error("Variant ID cannot contain consecutive separators")]
    VariantIdConsecutiveSeparators,

    #[error("Experiment must have at least 2 variants")]
    InsufficientVariants,

    #[error("Duplicate variant ID: '{0}'")]
    DuplicateVariantId(String),

    #[error("Experiment declares {0} control variants, at most one is allowed")]
    MultipleControls(usize),
}

/// Shape problems shared by experiment and variant identifiers
enum IdShapeError {
    Empty,
    TooLong,
    Boundary,
    Character(char),
    ConsecutiveSeparators,
}

fn is_separator(ch: char) -> bool {
    ch == '-' || ch == '_'
}

fn check_id_shape(id: &str, max_len: usize) -> Result<(), IdShapeError> {
    let (Some(first), Some(last)) = (id.chars().next(), id.chars().last()) else {
        return Err(IdShapeError::Empty);
    };

    if id.len() > max_len {
        return Err(IdShapeError::TooLong);
    }

    if !first.is_ascii_alphanumeric() || !last.is_ascii_alphanumeric() {
        return Err(IdShapeError::Boundary);
    }

    let mut prev_was_separator = false;

    for ch in id.chars() {
        if is_separator(ch) {
            if prev_was_separator {
                return Err(IdShapeError::ConsecutiveSeparators);
            }
            prev_was_separator = true;
        } else if ch.is_ascii_alphanumeric() {
            prev_was_separator = false;
        } else {
            return Err(IdShapeError::Character(ch));
        }
    }

    Ok(())
}

/// Validate an experiment ID
pub fn validate_experiment_id(id: &str) -> Result<(), ExperimentValidationError> {
    check_id_shape(id, MAX_EXPERIMENT_ID_LENGTH).map_err(|e| match e {
        IdShapeError::Empty => ExperimentValidationError::EmptyId,
        IdShapeError::TooLong => ExperimentValidationError::IdTooLong(MAX_EXPERIMENT_ID_LENGTH),
        IdShapeError::Boundary => ExperimentValidationError::InvalidIdBoundary,
        IdShapeError::Character(ch) => ExperimentValidationError::InvalidIdCharacter(ch),
        IdShapeError::ConsecutiveSeparators => ExperimentValidationError::ConsecutiveSeparators,
    })
}

/// Validate a variant ID
pub fn validate_variant_id(id: &str) -> Result<(), ExperimentValidationError> {
    check_id_shape(id, MAX_VARIANT_ID_LENGTH).map_err(|e| match e {
        IdShapeError::Empty => ExperimentValidationError::EmptyVariantId,
        IdShapeError::TooLong => ExperimentValidationError::VariantIdTooLong(MAX_VARIANT_ID_LENGTH),
        IdShapeError::Boundary => ExperimentValidationError::InvalidVariantIdBoundary,
        IdShapeError::Character(ch) => ExperimentValidationError::InvalidVariantIdCharacter(ch),
        IdShapeError::ConsecutiveSeparators => {
            ExperimentValidationError::VariantIdConsecutiveSeparators
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    mod experiment_id_validation {
        use super::*;

        #[test]
        fn test_valid_experiment_ids() {
            assert!(validate_experiment_id("exp-1").is_ok());
            assert!(validate_experiment_id("checkout_flow_v2").is_ok());
            assert!(validate_experiment_id("a").is_ok());
            assert!(validate_experiment_id("experiment-2024-01").is_ok());
        }

        #[test]
        fn test_empty_id() {
            assert_eq!(
                validate_experiment_id(""),
                Err(ExperimentValidationError::EmptyId)
            );
        }

        #[test]
        fn test_id_too_long() {
            let long_id = "a".repeat(MAX_EXPERIMENT_ID_LENGTH + 1);
            assert_eq!(
                validate_experiment_id(&long_id),
                Err(ExperimentValidationError::IdTooLong(MAX_EXPERIMENT_ID_LENGTH))
            );
        }

        #[test]
        fn test_invalid_boundary() {
            assert_eq!(
                validate_experiment_id("-abc"),
                Err(ExperimentValidationError::InvalidIdBoundary)
            );
            assert_eq!(
                validate_experiment_id("abc_"),
                Err(ExperimentValidationError::InvalidIdBoundary)
            );
        }

        #[test]
        fn test_invalid_character() {
            assert_eq!(
                validate_experiment_id("abc.def"),
                Err(ExperimentValidationError::InvalidIdCharacter('.'))
            );
            assert_eq!(
                validate_experiment_id("abc def"),
                Err(ExperimentValidationError::InvalidIdCharacter(' '))
            );
        }

        #[test]
        fn test_consecutive_separators() {
            assert_eq!(
                validate_experiment_id("abc-_def"),
                Err(ExperimentValidationError::ConsecutiveSeparators)
            );
        }
    }

    mod variant_id_validation {
        use super::*;

        #[test]
        fn test_valid_variant_ids() {
            assert!(validate_variant_id("control").is_ok());
            assert!(validate_variant_id("variant-a").is_ok());
            assert!(validate_variant_id("treatment_1").is_ok());
        }

        #[test]
        fn test_empty_variant_id() {
            assert_eq!(
                validate_variant_id(""),
                Err(ExperimentValidationError::EmptyVariantId)
            );
        }

        #[test]
        fn test_variant_id_too_long() {
            let long_id = "v".repeat(51);
            assert_eq!(
                validate_variant_id(&long_id),
                Err(ExperimentValidationError::VariantIdTooLong(50))
            );
        }

        #[test]
        fn test_variant_consecutive_separators() {
            assert_eq!(
                validate_variant_id("variant--a"),
                Err(ExperimentValidationError::VariantIdConsecutiveSeparators)
            );
        }
    }
}
