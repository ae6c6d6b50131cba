//! Data Source Registry
//!
//! Maps data-source names to their descriptors and latest fetch handles,
//! and holds the optional changes timeline.
//!
//! Every observable change (registration, changes URL update, reload) bumps
//! the registry revision, so observers can detect updates by comparing a
//! single counter instead of diffing entries.

mod error;
mod types;

pub use error::{RegistryError, RegistryResult};
pub use types::{
    key_metrics, ChangesTimeline, DataSource, DataSourceDescriptor, Metrics, SourceKind,
};

use std::collections::HashMap;

/// Name-keyed data sources plus the changes timeline
#[derive(Debug, Default)]
pub struct Registry {
    sources: HashMap<String, DataSource>,
    changes: Option<ChangesTimeline>,
    revision: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source, replacing any source with the same name
    ///
    /// Metric groups have their metric list keyed by name. When that fails
    /// the source is still registered with the metrics as provided and
    /// `MalformedDescriptor` is returned for the caller to act on.
    pub fn register(&mut self, descriptor: DataSourceDescriptor) -> RegistryResult<()> {
        let DataSourceDescriptor {
            name,
            kind,
            data_url,
            metrics,
            extra,
        } = descriptor;

        let (metrics, outcome) = if kind == SourceKind::MetricGroup {
            match key_metrics(metrics.as_ref()) {
                Ok(keyed) => (Some(Metrics::Keyed(keyed)), Ok(())),
                Err(reason) => {
                    tracing::warn!(
                        source = %name,
                        reason = %reason,
                        "Could not key metric group, keeping metrics as provided"
                    );
                    let err = RegistryError::MalformedDescriptor {
                        name: name.clone(),
                        reason,
                    };
                    (metrics.map(Metrics::Raw), Err(err))
                }
            }
        } else {
            (metrics.map(Metrics::Raw), Ok(()))
        };

        let source = DataSource::new(name.clone(), kind, data_url, metrics, extra);
        if self.sources.insert(name.clone(), source).is_some() {
            tracing::debug!(source = %name, "Replaced data source");
        } else {
            tracing::debug!(source = %name, "Registered data source");
        }

        self.bump_revision();
        outcome
    }

    pub fn get(&self, name: &str) -> Option<&DataSource> {
        self.sources.get(name)
    }

    /// Set the changes-timeline endpoint; an empty URL removes it
    pub fn set_changes_url(&mut self, url: impl Into<String>) {
        let url = url.into();
        self.changes = if url.is_empty() {
            None
        } else {
            Some(ChangesTimeline::new(url))
        };
        self.bump_revision();
    }

    pub fn changes(&self) -> Option<&ChangesTimeline> {
        self.changes.as_ref()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Sorted source names
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sources.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataSource> {
        self.sources.values()
    }

    /// Counter bumped on every observable change
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn sources_mut(&mut self) -> impl Iterator<Item = &mut DataSource> {
        self.sources.values_mut()
    }

    pub(crate) fn changes_mut(&mut self) -> Option<&mut ChangesTimeline> {
        self.changes.as_mut()
    }

    pub(crate) fn bump_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metric_group(name: &str, metrics: serde_json::Value) -> DataSourceDescriptor {
        DataSourceDescriptor::new(name, SourceKind::MetricGroup, format!("/metrics/{}/", name))
            .metrics(metrics)
    }

    #[test]
    fn test_register_metric_group_keys_metrics() {
        let mut registry = Registry::new();
        registry
            .register(metric_group(
                "bgwriter",
                json!([{"name": "a", "type": "number"}, {"name": "b", "type": "size"}]),
            ))
            .unwrap();

        let source = registry.get("bgwriter").unwrap();
        assert!(source.is_metric_group());
        let metrics = source.metrics.as_ref().unwrap();
        assert_eq!(metrics.names(), vec!["a", "b"]);
        assert_eq!(metrics.get("b").unwrap()["type"], "size");
        assert!(source.handle().is_none());
    }

    #[test]
    fn test_register_malformed_metric_group_still_registers() {
        let mut registry = Registry::new();
        let raw = json!([{"name": "a"}, {"label": "missing name"}]);

        let result = registry.register(metric_group("broken", raw.clone()));
        assert!(matches!(
            result,
            Err(RegistryError::MalformedDescriptor { ref name, .. }) if name == "broken"
        ));

        let source = registry.get("broken").unwrap();
        assert_eq!(source.metrics, Some(Metrics::Raw(raw)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_other_kind_keeps_raw_metrics() {
        let mut registry = Registry::new();
        let raw = json!({"anything": true});
        registry
            .register(
                DataSourceDescriptor::new("content", SourceKind::from("content"), "/content/")
                    .metrics(raw.clone()),
            )
            .unwrap();

        assert_eq!(
            registry.get("content").unwrap().metrics,
            Some(Metrics::Raw(raw))
        );
    }

    #[test]
    fn test_register_overwrites_same_name() {
        let mut registry = Registry::new();
        registry
            .register(DataSourceDescriptor::new("s", SourceKind::from("grid"), "/old/"))
            .unwrap();
        registry
            .register(DataSourceDescriptor::new("s", SourceKind::from("grid"), "/new/"))
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("s").unwrap().data_url, "/new/");
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_changes_url() {
        let mut registry = Registry::new();
        assert!(registry.changes().is_none());

        registry.set_changes_url("/server/1/timeline/");
        registry.set_changes_url("/server/2/timeline/");
        let changes = registry.changes().unwrap();
        assert_eq!(changes.url, "/server/2/timeline/");
        assert!(changes.data().is_none());

        registry.set_changes_url("");
        assert!(registry.changes().is_none());
    }

    #[test]
    fn test_revision_increments() {
        let mut registry = Registry::new();
        assert_eq!(registry.revision(), 0);
        registry
            .register(DataSourceDescriptor::new("a", SourceKind::from("grid"), "/a/"))
            .unwrap();
        registry.set_changes_url("/t/");
        assert_eq!(registry.revision(), 2);
        assert_eq!(registry.names(), vec!["a"]);
    }
}
