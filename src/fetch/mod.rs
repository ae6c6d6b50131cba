//! Fetching
//!
//! - **transport**: the outbound request seam and its reqwest implementation
//! - **handle**: pending/resolved/rejected result of one request
//! - **error**: Error types
//!
//! # Example
//!
//! ```rust,no_run
//! use dashboard_store::config::HttpConfig;
//! use dashboard_store::fetch::{FetchHandle, HttpTransport, Transport};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = Arc::new(HttpTransport::new(&HttpConfig::default())?);
//!
//!     let url = "/metrics/server/1/".to_string();
//!     let handle = FetchHandle::spawn(1, url.clone(), async move {
//!         transport.fetch_text(&url).await
//!     });
//!
//!     println!("{}", handle.settled().await.label());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod handle;
pub mod transport;

pub use error::{FetchError, FetchResult};
pub use handle::{FetchHandle, FetchState};
pub use transport::{HttpTransport, Transport};
