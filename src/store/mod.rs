//! Dashboard Store
//!
//! The store owns the selected time range, the data-source registry and
//! the alert queue. It is explicitly constructed and cheap to clone; every
//! clone shares the same state.
//!
//! - **error**: Error types
//! - **events**: change notifications broadcast to subscribers
//! - **sync**: applies back/forward navigation to the range
//!
//! State sits behind a tokio `RwLock` that is never held across a fetch:
//! [`Store::load_data`] spawns one task per request and returns as soon as
//! every handle is installed.

pub mod error;
pub mod events;
pub mod sync;

pub use error::{StoreError, StoreResult};
pub use events::StoreEvent;
pub use sync::HistorySync;

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::alerts::{AlertLevel, AlertMessage, AlertQueue, AlertResult};
use crate::config::StoreConfig;
use crate::fetch::{FetchHandle, Transport};
use crate::registry::{ChangesTimeline, DataSource, DataSourceDescriptor, Registry};
use crate::time::{TimeRange, TimeResolver};
use crate::url::{encode_query_data, query_string, range_from_query, with_query, History};

/// Shared dashboard state handle
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    state: RwLock<StoreState>,
    transport: Arc<dyn Transport>,
    history: Arc<dyn History>,
    resolver: TimeResolver,
    timestamp_format: String,
    events: broadcast::Sender<StoreEvent>,
    seq: AtomicU64,
}

struct StoreState {
    range: TimeRange,
    registry: Registry,
    alerts: AlertQueue,
}

impl Store {
    /// Create a store seeded from the history's current location
    ///
    /// Missing or empty `from`/`to` fall back to the configured defaults. A
    /// location whose range does not parse falls back too, and leaves an
    /// error alert behind.
    pub fn new(
        config: &StoreConfig,
        transport: Arc<dyn Transport>,
        history: Arc<dyn History>,
    ) -> StoreResult<Self> {
        let resolver = config.resolver()?;
        let defaults = config.default_range();
        defaults.validate(&resolver)?;

        let mut alerts = AlertQueue::new();
        let mut range = range_from_query(&history.search(), &defaults);
        if let Err(e) = range.validate(&resolver) {
            tracing::warn!(range = %range, error = %e, "Ignoring time range from URL");
            alerts.push(AlertMessage::new(
                AlertLevel::Error,
                format!("Invalid time range in URL: {}", e),
            ));
            range = defaults;
        }

        tracing::debug!(range = %range, "Store created");

        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Ok(Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(StoreState {
                    range,
                    registry: Registry::new(),
                    alerts,
                }),
                transport,
                history,
                resolver,
                timestamp_format: config.timestamp_format.clone(),
                events,
                seq: AtomicU64::new(0),
            }),
        })
    }

    // ========== Time range ==========

    pub async fn time_range(&self) -> TimeRange {
        self.inner.state.read().await.range.clone()
    }

    /// Apply a new range and reload every source
    ///
    /// Both expressions are checked first; an invalid one leaves the range,
    /// the history and all handles untouched. Unless `silent`, the new range
    /// is pushed onto the history as `<pathname>?from=..&to=..`.
    pub async fn set_from_to(
        &self,
        from: impl Into<String>,
        to: impl Into<String>,
        silent: bool,
    ) -> StoreResult<()> {
        let range = TimeRange::new(from, to);
        range.validate(&self.inner.resolver)?;

        self.inner.state.write().await.range = range.clone();

        if !silent {
            let location = format!(
                "{}?{}",
                self.inner.history.pathname(),
                query_string::serialize(&range)
            );
            self.inner.history.push_state(&location);
        }

        tracing::info!(range = %range, silent, "Time range changed");
        self.emit(StoreEvent::RangeChanged { range, silent });

        self.load_data().await?;
        Ok(())
    }

    /// Reapply the range carried by the current location without a new
    /// history entry
    ///
    /// Returns false when the location has no complete `from`/`to` pair, in
    /// which case nothing changes.
    pub async fn on_pop_state(&self) -> StoreResult<bool> {
        let search = self.inner.history.search();
        match query_string::explicit_range(&search) {
            Some(range) => {
                self.set_from_to(range.from, range.to, true).await?;
                Ok(true)
            }
            None => {
                tracing::debug!(search = %search, "Pop state without a time range");
                Ok(false)
            }
        }
    }

    /// Current range as `from=..&to=..`
    pub async fn serialize(&self) -> String {
        query_string::serialize(&self.time_range().await)
    }

    // ========== Fetching ==========

    /// Issue one request per data source, plus the changes timeline
    ///
    /// Returns the sequence number shared by every handle this call installs.
    pub async fn load_data(&self) -> StoreResult<u64> {
        self.load_data_at(Utc::now()).await
    }

    /// Same as [`load_data`](Self::load_data) with a caller-chosen `now`
    pub async fn load_data_at(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.inner.state.write().await;

        let resolved = state.range.resolve_at(&self.inner.resolver, now)?;
        let query = encode_query_data(&resolved.to_params(&self.inner.timestamp_format));
        let seq = self.inner.seq.fetch_add(1, Ordering::SeqCst) + 1;

        for source in state.registry.sources_mut() {
            let url = with_query(&source.data_url, &query);
            let transport = Arc::clone(&self.inner.transport);
            let request_url = url.clone();
            source.replace_handle(FetchHandle::spawn(seq, url, async move {
                transport.fetch_text(&request_url).await
            }));
        }

        if let Some(changes) = state.registry.changes_mut() {
            let url = with_query(&changes.url, &query);
            let transport = Arc::clone(&self.inner.transport);
            let request_url = url.clone();
            changes.replace_data(FetchHandle::spawn(seq, url, async move {
                transport.fetch_json(&request_url).await
            }));
        }

        state.registry.bump_revision();
        let sources = state.registry.len();
        drop(state);

        tracing::info!(seq, sources, query = %query, "Reloading data");
        self.emit(StoreEvent::DataReloaded { seq, sources });
        Ok(seq)
    }

    /// Sequence number of the most recent reload, 0 before the first
    pub fn last_seq(&self) -> u64 {
        self.inner.seq.load(Ordering::SeqCst)
    }

    // ========== Registry ==========

    /// Register a data source
    ///
    /// A malformed metric group is still registered; the error reports it.
    pub async fn register(&self, descriptor: DataSourceDescriptor) -> StoreResult<()> {
        let name = descriptor.name.clone();
        let outcome = self.inner.state.write().await.registry.register(descriptor);
        self.emit(StoreEvent::SourceRegistered { name });
        outcome.map_err(StoreError::from)
    }

    pub async fn data_source(&self, name: &str) -> Option<DataSource> {
        self.inner.state.read().await.registry.get(name).cloned()
    }

    /// Snapshot of every source, sorted by name
    pub async fn data_sources(&self) -> Vec<DataSource> {
        let state = self.inner.state.read().await;
        let mut sources: Vec<DataSource> = state.registry.iter().cloned().collect();
        sources.sort_by(|a, b| a.name.cmp(&b.name));
        sources
    }

    /// Set the changes-timeline endpoint; an empty URL clears it
    pub async fn set_changes_url(&self, url: impl Into<String>) {
        let url = url.into();
        self.inner.state.write().await.registry.set_changes_url(url.clone());
        self.emit(StoreEvent::ChangesUrlChanged {
            url: (!url.is_empty()).then_some(url),
        });
    }

    pub async fn changes(&self) -> Option<ChangesTimeline> {
        self.inner.state.read().await.registry.changes().cloned()
    }

    /// Registry revision, bumped on every observable registry change
    pub async fn revision(&self) -> u64 {
        self.inner.state.read().await.registry.revision()
    }

    // ========== Alerts ==========

    pub async fn add_alert_message(&self, level: impl Into<AlertLevel>, message: impl Into<String>) {
        let alert = AlertMessage::new(level, message);
        tracing::debug!(level = %alert.level, message = %alert.message, "Alert queued");

        let count = {
            let mut state = self.inner.state.write().await;
            state.alerts.push(alert);
            state.alerts.len()
        };
        self.emit(StoreEvent::AlertsChanged { count });
    }

    pub async fn remove_alert_message(&self, index: usize) -> AlertResult<AlertMessage> {
        let (removed, count) = {
            let mut state = self.inner.state.write().await;
            let removed = state.alerts.remove(index)?;
            (removed, state.alerts.len())
        };
        self.emit(StoreEvent::AlertsChanged { count });
        Ok(removed)
    }

    pub async fn alert_messages(&self) -> Vec<AlertMessage> {
        self.inner.state.read().await.alerts.to_vec()
    }

    // ========== Wiring ==========

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.events.subscribe()
    }

    pub fn history(&self) -> &Arc<dyn History> {
        &self.inner.history
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    pub fn resolver(&self) -> TimeResolver {
        self.inner.resolver
    }

    fn emit(&self, event: StoreEvent) {
        tracing::trace!(event = event.name(), "Store event");
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("timestamp_format", &self.inner.timestamp_format)
            .field("last_seq", &self.last_seq())
            .finish_non_exhaustive()
    }
}
