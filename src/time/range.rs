//! Dashboard time range
//!
//! A pair of time expressions. `from` resolves with floor rounding and `to`
//! with ceiling rounding, both against the same instant.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use super::error::TimeResult;
use super::resolver::{format_timestamp, TimeResolver};

/// Selected time range, as typed by the user or carried in the URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: String,
    pub to: String,
}

impl TimeRange {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Check that both ends parse and evaluate at the current instant
    ///
    /// Expressions that parse but overflow (`now+9999999y`) are rejected
    /// here rather than on the next reload.
    pub fn validate(&self, resolver: &TimeResolver) -> TimeResult<()> {
        self.resolve_at(resolver, Utc::now()).map(|_| ())
    }

    /// Resolve both ends against one instant
    pub fn resolve_at(&self, resolver: &TimeResolver, now: DateTime<Utc>) -> TimeResult<ResolvedRange> {
        let from = resolver.resolve_at(&self.from, false, now)?;
        let to = resolver.resolve_at(&self.to, true, now)?;
        Ok(ResolvedRange { from, to })
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.from, self.to)
    }
}

/// Absolute bounds of a [`TimeRange`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub from: DateTime<FixedOffset>,
    pub to: DateTime<FixedOffset>,
}

impl ResolvedRange {
    /// Query parameters sent with every fetch, in `from`, `to` order
    pub fn to_params(&self, format: &str) -> Vec<(&'static str, String)> {
        vec![
            ("from", format_timestamp(&self.from, format)),
            ("to", format_timestamp(&self.to, format)),
        ]
    }
}
