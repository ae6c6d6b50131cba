//! Time Expressions
//!
//! Relative and absolute time expressions used by the dashboard time range:
//!
//! - **resolver**: date-math grammar (`now-1h`, `now/d`, absolute timestamps)
//!   and evaluation with floor/ceiling rounding
//! - **range**: the `from`/`to` pair and its resolved bounds
//! - **error**: Error types
//!
//! # Example
//!
//! ```rust
//! use dashboard_store::time::TimeResolver;
//!
//! let resolver = TimeResolver::utc();
//! let from = resolver.resolve("now-1h", false).unwrap();
//! let to = resolver.resolve("now", true).unwrap();
//! assert!(from < to);
//! ```

pub mod error;
pub mod range;
pub mod resolver;

pub use error::{TimeError, TimeResult};
pub use range::{ResolvedRange, TimeRange};
pub use resolver::{
    format_timestamp, is_valid_timestamp_format, parse_utc_offset, Anchor, DateMathOp,
    TimeExpression, TimeResolver, TimeUnit, DEFAULT_TIMESTAMP_FORMAT,
};
