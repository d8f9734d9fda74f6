//! Redaction filters for headers, querystrings, and URIs
//!
//! Filtering runs twice systemwide: once before a transaction is persisted,
//! and once more when a live request is compared against a recording that
//! was itself filtered. A live request carrying the original secret value
//! therefore still matches the redacted recording.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::transaction::{Headers, QueryString, QueryValue};

/// Replacement policy for one filtered field
#[derive(Clone)]
pub enum Replacement {
    /// Remove the field entirely
    Delete,
    /// Substitute a fixed value
    Literal(String),
    /// Substitute a value computed from the original, evaluated at
    /// filter-application time
    Computed(Arc<dyn Fn(&str) -> String + Send + Sync>),
}

impl Replacement {
    /// Computed replacement from a closure
    pub fn computed(f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Replacement::Computed(Arc::new(f))
    }
}

impl fmt::Debug for Replacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Replacement::Delete => f.write_str("Delete"),
            Replacement::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Replacement::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl From<&str> for Replacement {
    fn from(value: &str) -> Self {
        Replacement::Literal(value.to_string())
    }
}

impl From<String> for Replacement {
    fn from(value: String) -> Self {
        Replacement::Literal(value)
    }
}

/// Declarative redaction rules, keyed by field name or URI substring
pub type FilterSpec = BTreeMap<String, Replacement>;

/// Filter a header map by exact key membership
#[must_use]
pub fn filter_headers(headers: &Headers, spec: &FilterSpec) -> Headers {
    let mut filtered = headers.clone();

    for (key, replacement) in spec {
        if !filtered.contains_key(key) {
            continue;
        }

        match replacement {
            Replacement::Delete => {
                filtered.remove(key);
            }
            Replacement::Literal(value) => {
                filtered.insert(key.clone(), Some(value.clone()));
            }
            Replacement::Computed(f) => {
                let original = filtered
                    .get(key)
                    .and_then(Clone::clone)
                    .unwrap_or_default();
                filtered.insert(key.clone(), Some(f(&original)));
            }
        }
    }

    filtered
}

/// Filter a querystring map by exact key membership
///
/// `Literal` stores a scalar; `Computed` applies elementwise to list values.
#[must_use]
pub fn filter_querystring(query: &QueryString, spec: &FilterSpec) -> QueryString {
    let mut filtered = query.clone();

    for (key, replacement) in spec {
        if !filtered.contains_key(key) {
            continue;
        }

        match replacement {
            Replacement::Delete => {
                filtered.remove(key);
            }
            Replacement::Literal(value) => {
                filtered.insert(key.clone(), QueryValue::One(value.clone()));
            }
            Replacement::Computed(f) => {
                let replaced = match &filtered[key] {
                    QueryValue::One(value) => QueryValue::One(f(value)),
                    QueryValue::Many(values) => {
                        QueryValue::Many(values.iter().map(|v| f(v)).collect())
                    }
                };
                filtered.insert(key.clone(), replaced);
            }
        }
    }

    filtered
}

/// Filter a URI by substring replacement, querystring removed first
#[must_use]
pub fn filter_uri(uri: &str, spec: &FilterSpec) -> String {
    let mut uri = strip_querystring(uri);

    for (needle, replacement) in spec {
        if !uri.contains(needle.as_str()) {
            continue;
        }

        match replacement {
            Replacement::Delete => uri = uri.replace(needle.as_str(), ""),
            Replacement::Literal(value) => uri = uri.replace(needle.as_str(), value),
            Replacement::Computed(f) => uri = uri.replace(needle.as_str(), &f(needle)),
        }
    }

    normalize_bare_host(&uri)
}

/// Remove the querystring from a URI, keeping any fragment
#[must_use]
pub fn strip_querystring(uri: &str) -> String {
    let end = uri.find('#').unwrap_or(uri.len());
    match uri[..end].find('?') {
        Some(q) => format!("{}{}", &uri[..q], &uri[end..]),
        None => uri.to_string(),
    }
}

/// The raw querystring of a URI, without `?` and fragment
#[must_use]
pub fn querystring_of(uri: &str) -> &str {
    let end = uri.find('#').unwrap_or(uri.len());
    match uri[..end].find('?') {
        Some(q) => &uri[q + 1..end],
        None => "",
    }
}

/// Parse a raw querystring into decoded parameter lists
///
/// Parameters with a blank value are dropped, `+` decodes as space.
#[must_use]
pub fn parse_querystring(raw: &str) -> QueryString {
    let mut parsed: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for pair in raw.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if value.is_empty() {
            continue;
        }
        parsed
            .entry(decode_component(key))
            .or_default()
            .push(decode_component(value));
    }

    parsed
        .into_iter()
        .map(|(key, values)| (key, QueryValue::Many(values)))
        .collect()
}

/// Serialize a querystring map in canonical, doseq form
#[must_use]
pub fn encode_querystring(query: &QueryString) -> String {
    let mut parts = Vec::new();

    for (key, value) in query {
        match value {
            QueryValue::One(v) => parts.push(encode_pair(key, v)),
            QueryValue::Many(values) => {
                parts.extend(values.iter().map(|v| encode_pair(key, v)));
            }
        }
    }

    parts.join("&")
}

/// Append a trailing slash to a bare `scheme://host[.tld][:port]` URI
#[must_use]
pub fn normalize_bare_host(uri: &str) -> String {
    static BARE_HOST: OnceLock<Regex> = OnceLock::new();
    let pattern = BARE_HOST.get_or_init(|| {
        Regex::new(r"^\w+://[^/]+[.]\w{2,}(:[0-9]+)?$").expect("bare-host pattern is valid")
    });

    if pattern.is_match(uri) {
        format!("{uri}/")
    } else {
        uri.to_string()
    }
}

fn decode_component(raw: &str) -> String {
    let unplussed = raw.replace('+', " ");
    urlencoding::decode(&unplussed).map_or_else(|_| unplussed.clone(), Cow::into_owned)
}

fn encode_pair(key: &str, value: &str) -> String {
    format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
}
