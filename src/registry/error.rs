//! Registry error types

use thiserror::Error;

/// Errors reported by data-source registration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A metric group whose metrics could not be keyed by name.
    /// The source is still registered with its metrics left as provided.
    #[error("Malformed metric group '{name}': {reason}")]
    MalformedDescriptor { name: String, reason: String },
}

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;
