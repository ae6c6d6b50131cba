//! Store Events
//!
//! Broadcast to every subscriber whenever observable store state changes.
//! Receivers that fall behind see `Lagged` and should re-read the store.

use serde::Serialize;

use crate::time::TimeRange;

/// Observable store change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    /// The time range was replaced
    RangeChanged {
        range: TimeRange,
        /// True when applied without a new history entry
        silent: bool,
    },
    /// Every source got a fresh fetch handle
    DataReloaded {
        seq: u64,
        /// Number of data sources fetched
        sources: usize,
    },
    SourceRegistered {
        name: String,
    },
    /// The changes-timeline endpoint was set; `None` when cleared
    ChangesUrlChanged {
        url: Option<String>,
    },
    AlertsChanged {
        count: usize,
    },
}

impl StoreEvent {
    /// Event name as used in logs
    pub fn name(&self) -> &'static str {
        match self {
            StoreEvent::RangeChanged { .. } => "range_changed",
            StoreEvent::DataReloaded { .. } => "data_reloaded",
            StoreEvent::SourceRegistered { .. } => "source_registered",
            StoreEvent::ChangesUrlChanged { .. } => "changes_url_changed",
            StoreEvent::AlertsChanged { .. } => "alerts_changed",
        }
    }
}
