//! Dashboard Bootstrap
//!
//! The hosting page delivers its initial state as JSON blobs, each tagged
//! with a script type (`text/datasources`, `text/messages`, ...). This module
//! collects those blobs, feeds them into a [`Store`] and wires the history
//! synchronizer, then performs the first reload.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::path::Path;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::alerts::AlertLevel;
use crate::config::HttpConfig;
use crate::registry::DataSourceDescriptor;
use crate::store::{HistorySync, Store, StoreError};

/// Default collector reload endpoint
pub const DEFAULT_RELOAD_PATH: &str = "/reload_collector/";

/// Kind of page payload, keyed by script type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Breadcrumb,
    DataSources,
    Dashboard,
    Messages,
    DataSourceTimeline,
}

impl PayloadKind {
    pub fn from_script_type(script_type: &str) -> Option<Self> {
        match script_type {
            "text/breadcrumb" => Some(PayloadKind::Breadcrumb),
            "text/datasources" => Some(PayloadKind::DataSources),
            "text/dashboard" => Some(PayloadKind::Dashboard),
            "text/messages" => Some(PayloadKind::Messages),
            "text/datasource_timeline" => Some(PayloadKind::DataSourceTimeline),
            _ => None,
        }
    }

    pub fn script_type(&self) -> &'static str {
        match self {
            PayloadKind::Breadcrumb => "text/breadcrumb",
            PayloadKind::DataSources => "text/datasources",
            PayloadKind::Dashboard => "text/dashboard",
            PayloadKind::Messages => "text/messages",
            PayloadKind::DataSourceTimeline => "text/datasource_timeline",
        }
    }
}

/// Bootstrap errors
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// A payload blob is not valid JSON of the expected shape
    #[error("Invalid {kind} payload: {error}")]
    Payload { kind: &'static str, error: String },

    #[error("Unknown payload script type: {0}")]
    UnknownScriptType(String),

    #[error("Failed to read payloads: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type BootstrapResult<T> = Result<T, BootstrapError>;

/// Everything the hosting page delivers at load time
///
/// Deserializes from one combined document whose keys are the script types
/// without their `text/` prefix.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PagePayloads {
    /// Navigation trail, kept opaque
    #[serde(default)]
    pub breadcrumb: Option<Value>,

    /// Data-source descriptors; each is decoded separately at bootstrap
    #[serde(default)]
    pub datasources: Vec<Value>,

    /// Dashboard layout, kept opaque
    #[serde(default)]
    pub dashboard: Option<Value>,

    /// Server messages by category, in page order
    #[serde(default)]
    pub messages: ServerMessages,

    /// Changes-timeline endpoint
    #[serde(default)]
    pub datasource_timeline: Option<String>,
}

impl PagePayloads {
    /// Parse a combined payload document
    pub fn from_json(doc: &str) -> BootstrapResult<Self> {
        serde_json::from_str(doc).map_err(|e| BootstrapError::Payload {
            kind: "page",
            error: e.to_string(),
        })
    }

    /// Read a combined payload document from disk
    pub fn from_file(path: &Path) -> BootstrapResult<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Add one script blob
    ///
    /// Data sources and messages accumulate across blobs; the other kinds
    /// keep the last blob seen.
    pub fn with_blob(&mut self, script_type: &str, blob: &str) -> BootstrapResult<()> {
        let kind = PayloadKind::from_script_type(script_type)
            .ok_or_else(|| BootstrapError::UnknownScriptType(script_type.to_string()))?;
        let payload_err = |e: serde_json::Error| BootstrapError::Payload {
            kind: kind.script_type(),
            error: e.to_string(),
        };

        match kind {
            PayloadKind::Breadcrumb => {
                self.breadcrumb = Some(serde_json::from_str(blob).map_err(payload_err)?);
            }
            PayloadKind::DataSources => {
                let sources: Vec<Value> = serde_json::from_str(blob).map_err(payload_err)?;
                self.datasources.extend(sources);
            }
            PayloadKind::Dashboard => {
                self.dashboard = Some(serde_json::from_str(blob).map_err(payload_err)?);
            }
            PayloadKind::Messages => {
                let messages: ServerMessages = serde_json::from_str(blob).map_err(payload_err)?;
                self.messages.merge(messages);
            }
            PayloadKind::DataSourceTimeline => {
                self.datasource_timeline = Some(serde_json::from_str(blob).map_err(payload_err)?);
            }
        }

        Ok(())
    }
}

/// Server messages grouped by category
///
/// Categories keep the order the page lists them in, so alerts are queued
/// in the same order the page would show them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerMessages(Vec<(String, Vec<String>)>);

impl ServerMessages {
    pub fn get(&self, category: &str) -> Option<&Vec<String>> {
        self.0
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, list)| list)
    }

    /// Category names in order
    pub fn categories(&self) -> Vec<&str> {
        self.0.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Append `other`; known categories grow in place, new ones go last
    pub fn merge(&mut self, other: ServerMessages) {
        for (category, list) in other.0 {
            match self.0.iter_mut().find(|(name, _)| *name == category) {
                Some((_, existing)) => existing.extend(list),
                None => self.0.push((category, list)),
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for ServerMessages {
    type Item = (String, Vec<String>);
    type IntoIter = std::vec::IntoIter<(String, Vec<String>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'de> Deserialize<'de> for ServerMessages {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // serde_json's preserve_order keeps the document order of the keys
        let map = Map::<String, Value>::deserialize(deserializer)?;
        map.into_iter()
            .map(|(category, list)| match serde_json::from_value(list) {
                Ok(list) => Ok((category, list)),
                Err(e) => Err(serde::de::Error::custom(format!(
                    "category '{}': {}",
                    category, e
                ))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(ServerMessages)
    }
}

/// What bootstrap did, and what it had to skip
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BootstrapReport {
    /// Sources registered, malformed metric groups included
    pub registered: usize,
    /// Server messages queued as alerts
    pub alerts: usize,
    /// One line per skipped or malformed descriptor
    pub problems: Vec<String>,
    /// Sequence number of the initial reload
    pub seq: u64,
}

impl BootstrapReport {
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}

/// A bootstrapped dashboard: the store plus the page's opaque layout data
#[derive(Debug)]
pub struct Dashboard {
    store: Store,
    breadcrumb: Option<Value>,
    layout: Option<Value>,
    reload_path: String,
    sync: JoinHandle<()>,
}

impl Dashboard {
    /// Load the page payloads into `store` and start it
    ///
    /// The collector reload endpoint is [`DEFAULT_RELOAD_PATH`]; use
    /// [`bootstrap_with_config`](Self::bootstrap_with_config) to honor
    /// `http.reload_path`.
    pub async fn bootstrap(
        store: Store,
        payloads: PagePayloads,
    ) -> BootstrapResult<(Self, BootstrapReport)> {
        let PagePayloads {
            breadcrumb,
            datasources,
            dashboard,
            messages,
            datasource_timeline,
        } = payloads;
        let mut report = BootstrapReport::default();

        for (idx, raw) in datasources.into_iter().enumerate() {
            let descriptor: DataSourceDescriptor = match serde_json::from_value(raw) {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    tracing::warn!(index = idx, error = %e, "Skipping undecodable data source");
                    report.problems.push(format!("data source #{}: {}", idx, e));
                    continue;
                }
            };

            match store.register(descriptor).await {
                Ok(()) => report.registered += 1,
                Err(StoreError::Registry(e)) => {
                    report.registered += 1;
                    report.problems.push(e.to_string());
                }
                Err(e) => return Err(e.into()),
            }
        }

        for (category, list) in messages {
            let level = AlertLevel::from(category);
            for message in list {
                store.add_alert_message(level.clone(), message).await;
                report.alerts += 1;
            }
        }

        if let Some(url) = datasource_timeline {
            store.set_changes_url(url).await;
        }

        let sync = HistorySync::spawn(store.clone());
        report.seq = store.load_data().await?;

        tracing::info!(
            registered = report.registered,
            alerts = report.alerts,
            problems = report.problems.len(),
            "Dashboard bootstrapped"
        );

        let dashboard = Self {
            store,
            breadcrumb,
            layout: dashboard,
            reload_path: DEFAULT_RELOAD_PATH.to_string(),
            sync,
        };
        Ok((dashboard, report))
    }

    /// Same as [`bootstrap`](Self::bootstrap), taking the reload endpoint
    /// from the HTTP configuration
    pub async fn bootstrap_with_config(
        store: Store,
        payloads: PagePayloads,
        http: &HttpConfig,
    ) -> BootstrapResult<(Self, BootstrapReport)> {
        let (dashboard, report) = Self::bootstrap(store, payloads).await?;
        Ok((dashboard.with_reload_path(&http.reload_path), report))
    }

    /// Builder: use another collector reload endpoint
    pub fn with_reload_path(mut self, path: impl Into<String>) -> Self {
        self.reload_path = path.into();
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn breadcrumb(&self) -> Option<&Value> {
        self.breadcrumb.as_ref()
    }

    pub fn layout(&self) -> Option<&Value> {
        self.layout.as_ref()
    }

    /// Ask the backend to reload its collector and queue the outcome as an
    /// alert; returns the queued level
    pub async fn reload_collector(&self) -> AlertLevel {
        let (level, message) = match self.store.transport().fetch_text(&self.reload_path).await {
            Ok(body) if !body.is_empty() => (AlertLevel::Success, "Collector successfully reloaded!"),
            Ok(_) => (AlertLevel::Error, "Could not reload collector"),
            Err(e) => {
                tracing::warn!(error = %e, "Collector reload failed");
                (AlertLevel::Error, "Error while trying to reload the collector.")
            }
        };

        self.store.add_alert_message(level.clone(), message).await;
        level
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.sync.abort();
    }
}
