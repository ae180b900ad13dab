//! Metric identifier validation

use thiserror::Error;

/// Maximum length for metric IDs
pub const MAX_METRIC_ID_LENGTH: usize = 64;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MetricValidationError {
    #[error("Metric ID cannot be empty")]
    EmptyId,

    #[error("Metric ID exceeds maximum length of {0} characters")]
    IdTooLong(usize),

    #[error("Metric ID must start with a lowercase letter")]
    InvalidIdStart,

    #[error("Metric ID contains invalid character: '{0}'")]
    InvalidIdCharacter(char),

    #[error("Metric name cannot be empty")]
    EmptyName,

    #[error("Metric target must be a finite number, got {0}")]
    InvalidTarget(f64),
}

/// Validate a metric ID.
///
/// Metric ids are snake_case style keys such as `conversion_rate`.
pub fn validate_metric_id(id: &str) -> Result<(), MetricValidationError> {
    let Some(first) = id.chars().next() else {
        return Err(MetricValidationError::EmptyId);
    };

    if id.len() > MAX_METRIC_ID_LENGTH {
        return Err(MetricValidationError::IdTooLong(MAX_METRIC_ID_LENGTH));
    }

    if !first.is_ascii_lowercase() {
        return Err(MetricValidationError::InvalidIdStart);
    }

    if let Some(ch) = id
        .chars()
        .find(|ch| !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || *ch == '_' || *ch == '-'))
    {
        return Err(MetricValidationError::InvalidIdCharacter(ch));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_metric_ids() {
        assert!(validate_metric_id("conversion_rate").is_ok());
        assert!(validate_metric_id("p95-latency").is_ok());
        assert!(validate_metric_id("revenue").is_ok());
    }

    #[test]
    fn test_invalid_metric_ids() {
        assert_eq!(validate_metric_id(""), Err(MetricValidationError::EmptyId));
        assert_eq!(
            validate_metric_id("1rate"),
            Err(MetricValidationError::InvalidIdStart)
        );
        assert_eq!(
            validate_metric_id("Conversion"),
            Err(MetricValidationError::InvalidIdStart)
        );
        assert_eq!(
            validate_metric_id("conversion rate"),
            Err(MetricValidationError::InvalidIdCharacter(' '))
        );
        assert_eq!(
            validate_metric_id(&"m".repeat(65)),
            Err(MetricValidationError::IdTooLong(64))
        );
    }
}
