//! URL State
//!
//! - **query_string**: time range ↔ query string, fetch URL building
//! - **history**: navigation history seam and its in-memory implementation

pub mod history;
pub mod query_string;

pub use history::{split_location, History, MemoryHistory, PopState};
pub use query_string::{
    encode_query_data, explicit_range, parse_query, range_from_query, serialize, with_query,
};
