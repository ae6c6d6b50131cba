//! Query Serializer
//!
//! Maps the time range to and from the URL query string. `from` and `to`
//! are the only state the dashboard persists in its URL, so a deep link is
//! just `<path>?from=<expr>&to=<expr>`.

use std::collections::HashMap;

use crate::time::TimeRange;

/// Render the range as `from=<enc>&to=<enc>`
pub fn serialize(range: &TimeRange) -> String {
    encode_query_data(&[("from", range.from.as_str()), ("to", range.to.as_str())])
}

/// Percent-encode key/value pairs into `k=v&k=v`, keeping their order
pub fn encode_query_data<K, V>(pairs: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    pairs
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                urlencoding::encode(key.as_ref()),
                urlencoding::encode(value.as_ref())
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Parse a query string into a key/value map
///
/// A leading `?` is ignored, a key without `=` maps to an empty string,
/// `+` is kept literally and repeated keys keep their last value. The value
/// is everything after the first `=`, so `a=b=c` yields `b=c` rather than
/// stopping at the second `=`.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    let query = query.strip_prefix('?').unwrap_or(query);

    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

/// Build a range from a query string, falling back to `defaults` for
/// missing or empty values
pub fn range_from_query(query: &str, defaults: &TimeRange) -> TimeRange {
    let mut params = parse_query(query);
    let mut take = |key: &str, default: &str| {
        params
            .remove(key)
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| default.to_string())
    };

    let from = take("from", &defaults.from);
    let to = take("to", &defaults.to);
    TimeRange { from, to }
}

/// Read `from` and `to` when both are present and non-empty
pub fn explicit_range(query: &str) -> Option<TimeRange> {
    let mut params = parse_query(query);
    let from = params.remove("from").filter(|v| !v.is_empty())?;
    let to = params.remove("to").filter(|v| !v.is_empty())?;
    Some(TimeRange { from, to })
}

/// Append an encoded query to a URL, joining with `&` if it already has one
///
/// Unlike a literal `url + "?" + query`, a URL that already carries a query
/// keeps it intact: `/b?limit=10` becomes `/b?limit=10&from=..`.
pub fn with_query(url: &str, query: &str) -> String {
    if query.is_empty() {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, separator, query)
}

fn decode_component(component: &str) -> String {
    match urlencoding::decode(component) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => String::from_utf8_lossy(&urlencoding::decode_binary(component.as_bytes()))
            .into_owned(),
    }
}
