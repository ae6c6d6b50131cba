//! Alert Queue
//!
//! Ordered, transient messages shown to the user (reload results, server
//! messages delivered with the page). Entries are removed by position.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Severity of an alert
///
/// Unknown levels are kept verbatim, since server-side message categories
/// are used as levels directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AlertLevel {
    Success,
    Info,
    Warning,
    Error,
    Message,
    Other(String),
}

impl AlertLevel {
    pub fn as_str(&self) -> &str {
        match self {
            AlertLevel::Success => "success",
            AlertLevel::Info => "info",
            AlertLevel::Warning => "warning",
            AlertLevel::Error => "error",
            AlertLevel::Message => "message",
            AlertLevel::Other(level) => level,
        }
    }
}

impl From<&str> for AlertLevel {
    fn from(level: &str) -> Self {
        match level {
            "success" => AlertLevel::Success,
            "info" => AlertLevel::Info,
            "warning" => AlertLevel::Warning,
            "error" => AlertLevel::Error,
            "message" => AlertLevel::Message,
            other => AlertLevel::Other(other.to_string()),
        }
    }
}

impl From<String> for AlertLevel {
    fn from(level: String) -> Self {
        AlertLevel::from(level.as_str())
    }
}

impl From<AlertLevel> for String {
    fn from(level: AlertLevel) -> Self {
        level.as_str().to_string()
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One queued alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertMessage {
    pub level: AlertLevel,
    pub message: String,
}

impl AlertMessage {
    pub fn new(level: impl Into<AlertLevel>, message: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            message: message.into(),
        }
    }
}

/// Alert queue errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlertError {
    #[error("Alert index {index} out of range (queue holds {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

pub type AlertResult<T> = Result<T, AlertError>;

/// Alerts in arrival order
#[derive(Debug, Clone, Default)]
pub struct AlertQueue {
    messages: Vec<AlertMessage>,
}

impl AlertQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, alert: AlertMessage) {
        self.messages.push(alert);
    }

    /// Remove the alert at `index`; the queue is left untouched on error
    pub fn remove(&mut self, index: usize) -> AlertResult<AlertMessage> {
        if index >= self.messages.len() {
            return Err(AlertError::IndexOutOfRange {
                index,
                len: self.messages.len(),
            });
        }
        Ok(self.messages.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &AlertMessage> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn to_vec(&self) -> Vec<AlertMessage> {
        self.messages.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_conversions() {
        assert_eq!(AlertLevel::from("success"), AlertLevel::Success);
        assert_eq!(AlertLevel::from("error"), AlertLevel::Error);
        assert_eq!(
            AlertLevel::from("debug"),
            AlertLevel::Other("debug".to_string())
        );
        assert_eq!(AlertLevel::Other("debug".to_string()).to_string(), "debug");

        let json = serde_json::to_string(&AlertMessage::new("warning", "disk")).unwrap();
        assert_eq!(json, r#"{"level":"warning","message":"disk"}"#);
    }

    #[test]
    fn test_add_then_remove_empties_queue() {
        let mut queue = AlertQueue::new();
        queue.push(AlertMessage::new(AlertLevel::Success, "ok"));
        assert_eq!(queue.len(), 1);

        let removed = queue.remove(0).unwrap();
        assert_eq!(removed.message, "ok");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut queue = AlertQueue::new();
        for msg in ["a", "b", "c"] {
            queue.push(AlertMessage::new(AlertLevel::Info, msg));
        }

        queue.remove(1).unwrap();
        let left: Vec<_> = queue.iter().map(|a| a.message.as_str()).collect();
        assert_eq!(left, vec!["a", "c"]);
    }

    #[test]
    fn test_remove_out_of_range() {
        let mut queue = AlertQueue::new();
        queue.push(AlertMessage::new(AlertLevel::Error, "x"));

        let err = queue.remove(3).unwrap_err();
        assert_eq!(err, AlertError::IndexOutOfRange { index: 3, len: 1 });
        assert_eq!(queue.len(), 1);
    }
}
