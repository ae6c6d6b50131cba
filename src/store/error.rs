//! Store error types

use thiserror::Error;

use crate::alerts::AlertError;
use crate::config::ConfigError;
use crate::registry::RegistryError;
use crate::time::TimeError;

/// Errors surfaced by store operations
///
/// Fetch failures never appear here: they settle the affected handle as
/// rejected instead.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A time expression did not parse or evaluate
    #[error(transparent)]
    Time(#[from] TimeError),

    /// Registration completed with a malformed descriptor
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Alert(#[from] AlertError),

    /// Store settings could not be turned into a resolver
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let err: StoreError = AlertError::IndexOutOfRange { index: 2, len: 0 }.into();
        assert!(matches!(err, StoreError::Alert(_)));
        assert_eq!(
            err.to_string(),
            "Alert index 2 out of range (queue holds 0)"
        );
    }
}
