//! Time expression error types

use thiserror::Error;

/// Errors raised while resolving a time expression
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeError {
    /// The expression does not match the date-math grammar
    #[error("Invalid time expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    /// The expression parsed but its arithmetic leaves the representable range
    #[error("Time expression '{expression}' is out of range")]
    OutOfRange { expression: String },
}

impl TimeError {
    pub(crate) fn invalid(expression: &str, reason: impl Into<String>) -> Self {
        TimeError::InvalidExpression {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for time resolution
pub type TimeResult<T> = Result<T, TimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TimeError::invalid("now-1x", "unknown unit");
        assert_eq!(
            err.to_string(),
            "Invalid time expression 'now-1x': unknown unit"
        );
    }
}
