//! Data source types
//!
//! - `DataSourceDescriptor`: what the hosting page declares
//! - `DataSource`: a registered descriptor plus its latest fetch handle
//! - `ChangesTimeline`: the optional changes endpoint
//! - `SourceKind` and `Metrics`: classification and metric definitions

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::fetch::FetchHandle;

/// Kind of data source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceKind {
    /// A group of metrics served by one endpoint; metrics are keyed by name
    MetricGroup,
    /// Any other kind, kept verbatim
    Other(String),
}

impl SourceKind {
    pub fn as_str(&self) -> &str {
        match self {
            SourceKind::MetricGroup => "metric_group",
            SourceKind::Other(kind) => kind,
        }
    }
}

impl From<String> for SourceKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "metric_group" => SourceKind::MetricGroup,
            _ => SourceKind::Other(kind),
        }
    }
}

impl From<&str> for SourceKind {
    fn from(kind: &str) -> Self {
        SourceKind::from(kind.to_string())
    }
}

impl From<SourceKind> for String {
    fn from(kind: SourceKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data source as declared by the hosting page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceDescriptor {
    /// Unique key
    pub name: String,

    #[serde(rename = "type")]
    pub kind: SourceKind,

    /// Endpoint fetched with `?from=..&to=..` on every reload
    pub data_url: String,

    /// Raw metric definitions; a list of `{name, ..}` objects for metric groups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Value>,

    /// Fields the store does not use, kept for the presentation layer
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DataSourceDescriptor {
    pub fn new(name: impl Into<String>, kind: SourceKind, data_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            data_url: data_url.into(),
            metrics: None,
            extra: Map::new(),
        }
    }

    /// Builder: set raw metrics
    pub fn metrics(mut self, metrics: Value) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// Metric definitions of a registered source
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Metrics {
    /// Metric-group definitions keyed by metric name
    Keyed(HashMap<String, Value>),
    /// Definitions as provided (non metric groups, or malformed groups)
    Raw(Value),
}

impl Metrics {
    /// Look up a keyed metric by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Metrics::Keyed(map) => map.get(name),
            Metrics::Raw(_) => None,
        }
    }

    pub fn is_keyed(&self) -> bool {
        matches!(self, Metrics::Keyed(_))
    }

    /// Sorted metric names (keyed metrics only)
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = match self {
            Metrics::Keyed(map) => map.keys().map(String::as_str).collect(),
            Metrics::Raw(_) => Vec::new(),
        };
        names.sort_unstable();
        names
    }
}

/// Key a metric list by each element's `name`
///
/// A missing list keys to an empty map; anything that is not a list of
/// objects with a string `name` is rejected with a reason.
pub fn key_metrics(raw: Option<&Value>) -> Result<HashMap<String, Value>, String> {
    let items = match raw {
        None | Some(Value::Null) => return Ok(HashMap::new()),
        Some(Value::Array(items)) => items,
        Some(other) => return Err(format!("metrics must be a list, got {}", json_kind(other))),
    };

    items
        .iter()
        .enumerate()
        .map(|(idx, metric)| {
            metric
                .get("name")
                .and_then(Value::as_str)
                .map(|name| (name.to_string(), metric.clone()))
                .ok_or_else(|| format!("metric #{} has no string 'name'", idx))
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// A registered data source
#[derive(Debug, Clone)]
pub struct DataSource {
    pub name: String,
    pub kind: SourceKind,
    pub data_url: String,
    pub metrics: Option<Metrics>,
    pub extra: Map<String, Value>,
    handle: Option<FetchHandle<String>>,
}

impl DataSource {
    pub(crate) fn new(
        name: String,
        kind: SourceKind,
        data_url: String,
        metrics: Option<Metrics>,
        extra: Map<String, Value>,
    ) -> Self {
        Self {
            name,
            kind,
            data_url,
            metrics,
            extra,
            handle: None,
        }
    }

    pub fn is_metric_group(&self) -> bool {
        self.kind == SourceKind::MetricGroup
    }

    /// Handle of the most recent request, absent before the first reload
    pub fn handle(&self) -> Option<&FetchHandle<String>> {
        self.handle.as_ref()
    }

    /// Install a new handle, returning the superseded one
    pub(crate) fn replace_handle(
        &mut self,
        handle: FetchHandle<String>,
    ) -> Option<FetchHandle<String>> {
        self.handle.replace(handle)
    }
}

/// Optional changes-timeline endpoint, fetched as JSON on every reload
#[derive(Debug, Clone)]
pub struct ChangesTimeline {
    pub url: String,
    data: Option<FetchHandle<Value>>,
}

impl ChangesTimeline {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            data: None,
        }
    }

    pub fn data(&self) -> Option<&FetchHandle<Value>> {
        self.data.as_ref()
    }

    pub(crate) fn replace_data(&mut self, handle: FetchHandle<Value>) -> Option<FetchHandle<Value>> {
        self.data.replace(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_source_kind_serde() {
        let kind: SourceKind = serde_json::from_value(json!("metric_group")).unwrap();
        assert_eq!(kind, SourceKind::MetricGroup);

        let kind: SourceKind = serde_json::from_value(json!("content")).unwrap();
        assert_eq!(kind, SourceKind::Other("content".to_string()));
        assert_eq!(serde_json::to_value(&kind).unwrap(), json!("content"));
    }

    #[test]
    fn test_descriptor_keeps_extra_fields() {
        let descriptor: DataSourceDescriptor = serde_json::from_value(json!({
            "name": "BgwriterMetricGroup",
            "type": "metric_group",
            "data_url": "/server/1/metrics/bgwriter/",
            "metrics": [{"name": "buffers_clean", "label": "Cleaned"}],
            "xaxis": "ts"
        }))
        .unwrap();

        assert_eq!(descriptor.kind, SourceKind::MetricGroup);
        assert_eq!(descriptor.extra["xaxis"], "ts");
        assert!(descriptor.metrics.is_some());
    }

    #[test]
    fn test_key_metrics() {
        let keyed = key_metrics(Some(&json!([
            {"name": "a", "label": "A"},
            {"name": "b", "label": "B"}
        ])))
        .unwrap();
        let mut keys: Vec<_> = keyed.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(keyed["b"]["label"], "B");

        assert!(key_metrics(None).unwrap().is_empty());
    }

    #[test]
    fn test_key_metrics_rejects_bad_shapes() {
        let err = key_metrics(Some(&json!([{"label": "no name"}]))).unwrap_err();
        assert_eq!(err, "metric #0 has no string 'name'");

        let err = key_metrics(Some(&json!({"a": 1}))).unwrap_err();
        assert_eq!(err, "metrics must be a list, got an object");

        assert!(key_metrics(Some(&json!([{"name": 3}]))).is_err());
    }

    #[test]
    fn test_metrics_lookup() {
        let metrics = Metrics::Keyed(key_metrics(Some(&json!([{"name": "x"}]))).unwrap());
        assert!(metrics.is_keyed());
        assert!(metrics.get("x").is_some());
        assert_eq!(metrics.names(), vec!["x"]);

        let raw = Metrics::Raw(json!([{"label": "y"}]));
        assert!(raw.get("y").is_none());
        assert!(raw.names().is_empty());
    }
}
