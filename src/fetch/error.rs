//! Fetch error types
//!
//! Fetch failures are never raised across the store API. They settle the
//! corresponding [`FetchHandle`](super::FetchHandle) as rejected, so the
//! error has to be cheap to clone and compare.

use thiserror::Error;

/// Reasons a fetch handle can be rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Transport-level failure
    #[error("Request failed: {0}")]
    Request(String),

    /// Server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Transport timeout expired
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Server could not be reached
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// URL could not be turned into a request target
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Body was not valid for the requested representation
    #[error("Decode error: {0}")]
    Decode(String),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Client(String),

    /// The fetch task ended without settling its handle
    #[error("Fetch aborted before settling")]
    Aborted,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        let target = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| err.to_string());

        if err.is_timeout() {
            FetchError::Timeout(target)
        } else if err.is_connect() {
            FetchError::Unavailable(target)
        } else if let Some(status) = err.status() {
            FetchError::Status {
                status: status.as_u16(),
                url: target,
            }
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else if err.is_builder() {
            FetchError::InvalidUrl(err.to_string())
        } else {
            FetchError::Request(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}

/// Result type for fetch operations
pub type FetchResult<T> = Result<T, FetchError>;
