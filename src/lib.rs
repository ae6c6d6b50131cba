//! # Dashboard Store
//!
//! Client-side reactive state store for metrics dashboards.
//!
//! ## Features
//!
//! - **Time range**: relative (`now-1h`, `now/d`) and absolute expressions,
//!   resolved with floor/ceiling rounding
//! - **URL state**: the range round-trips through the query string and the
//!   navigation history, back/forward included
//! - **Fetch orchestration**: one async request per data source on every
//!   range change, observable through fetch handles
//! - **Alerts**: an ordered queue of transient user messages
//!
//! ## Modules
//!
//! - [`time`]: Time expression resolver and range
//! - [`url`]: Query-string serializer and navigation history
//! - [`registry`]: Data sources and the changes timeline
//! - [`fetch`]: Transport seam and fetch handles
//! - [`alerts`]: Alert queue
//! - [`store`]: The store itself and its history synchronizer
//! - [`dashboard`]: Page payload bootstrap and collector reload
//! - [`config`]: TOML configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dashboard_store::config::Config;
//! use dashboard_store::dashboard::{Dashboard, PagePayloads};
//! use dashboard_store::fetch::HttpTransport;
//! use dashboard_store::store::Store;
//! use dashboard_store::url::MemoryHistory;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     let transport = Arc::new(HttpTransport::new(&config.http)?);
//!     let history = Arc::new(MemoryHistory::new("/server/1?from=now-6h&to=now"));
//!     let store = Store::new(&config.store, transport, history)?;
//!
//!     let payloads = PagePayloads::from_json(
//!         r#"{"datasources": [{"name": "db", "type": "grid", "data_url": "/server/1/db/"}]}"#,
//!     )?;
//!     let (dashboard, report) = Dashboard::bootstrap(store, payloads).await?;
//!     println!("registered {} sources", report.registered);
//!
//!     // Every source now has a handle for the current range
//!     for source in dashboard.store().data_sources().await {
//!         if let Some(handle) = source.handle() {
//!             println!("{}: {}", source.name, handle.settled().await.label());
//!         }
//!     }
//!
//!     dashboard.store().set_from_to("now-24h", "now", false).await?;
//!     Ok(())
//! }
//! ```

pub mod alerts;
pub mod config;
pub mod dashboard;
pub mod fetch;
pub mod registry;
pub mod store;
pub mod time;
pub mod url;

pub use alerts::{AlertLevel, AlertMessage};
pub use config::Config;
pub use dashboard::{Dashboard, PagePayloads};
pub use store::{Store, StoreError, StoreEvent};
pub use time::{TimeRange, TimeResolver};
