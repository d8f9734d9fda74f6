//! Request-to-recording matching

use std::time::Duration;

use tracing::debug;

use crate::filter::{self, FilterSpec};
use crate::transaction::{Method, QueryString, ResponseRecord};

/// A live outbound request captured by the interception layer
#[derive(Debug, Clone)]
pub struct LiveRequest {
    /// HTTP method
    pub method: Method,
    /// Full URL including any querystring
    pub url: String,
    /// Request headers in wire order
    pub headers: Vec<(String, String)>,
    /// Raw request body
    pub body: Vec<u8>,
    /// Caller-supplied timeout for the passthrough call
    pub timeout: Option<Duration>,
}

impl LiveRequest {
    /// Request with no headers, body, or timeout
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: Vec::new(),
            timeout: None,
        }
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Set the timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// URI pattern a matcher is registered under
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UriPattern {
    /// Literal URI compared with filter-aware equality
    Exact(String),
    /// Matches any URI (the universal record-mode interceptor)
    Any,
}

/// Predicate deciding whether a live request is served from a recording
#[derive(Debug, Clone)]
pub struct RequestMatcher {
    method: Method,
    pattern: UriPattern,
    match_querystring: bool,
    stored_base: String,
    stored_query: QueryString,
}

impl RequestMatcher {
    /// Matcher for a literal URI
    ///
    /// The base URI and querystring are split at construction; the base is
    /// trailing-slash normalized so `https://example.com` registers as
    /// `https://example.com/`.
    #[must_use]
    pub fn exact(method: Method, uri: &str, match_querystring: bool) -> Self {
        let stored_base = filter::normalize_bare_host(&filter::strip_querystring(uri));
        let stored_query = filter::parse_querystring(filter::querystring_of(uri));

        Self {
            method,
            pattern: UriPattern::Exact(uri.to_string()),
            match_querystring,
            stored_base,
            stored_query,
        }
    }

    /// Matcher accepting every URI for the given method
    #[must_use]
    pub fn any(method: Method) -> Self {
        Self {
            method,
            pattern: UriPattern::Any,
            match_querystring: false,
            stored_base: String::new(),
            stored_query: QueryString::new(),
        }
    }

    /// Method this matcher was registered for
    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    /// Catalog key; colliding keys merge their response lists
    #[must_use]
    pub fn key(&self) -> String {
        let pattern = match &self.pattern {
            UriPattern::Exact(uri) => uri.as_str(),
            UriPattern::Any => "<any>",
        };
        format!(
            "{} {pattern} qs={}",
            self.method.as_str(),
            self.match_querystring
        )
    }

    /// Whether a live request matches this matcher
    ///
    /// Base URIs are compared after querystring removal, filtering, and
    /// trailing-slash normalization; when `match_querystring` is set, both
    /// sides' filtered querystrings must encode identically.
    #[must_use]
    pub fn matches(
        &self,
        request: &LiveRequest,
        uri_spec: &FilterSpec,
        querystring_spec: &FilterSpec,
    ) -> bool {
        if request.method != self.method {
            return false;
        }

        match &self.pattern {
            UriPattern::Any => true,
            UriPattern::Exact(_) => {
                self.base_matches(&request.url, uri_spec)
                    && self.query_matches(&request.url, querystring_spec)
            }
        }
    }

    fn base_matches(&self, url: &str, uri_spec: &FilterSpec) -> bool {
        // The stored side was filtered when recorded; re-filtering is
        // idempotent, so both sides go through the same pipeline.
        let live = filter::filter_uri(url, uri_spec);
        let stored = filter::filter_uri(&self.stored_base, uri_spec);
        live == stored
    }

    fn query_matches(&self, url: &str, querystring_spec: &FilterSpec) -> bool {
        if !self.match_querystring {
            return true;
        }

        let live_query = filter::parse_querystring(filter::querystring_of(url));
        let live = filter::encode_querystring(&filter::filter_querystring(
            &live_query,
            querystring_spec,
        ));
        let stored = filter::encode_querystring(&filter::filter_querystring(
            &self.stored_query,
            querystring_spec,
        ));
        live == stored
    }
}

/// How a matched request is answered
#[derive(Debug, Clone)]
pub enum Responder {
    /// Serve recorded responses in order, repeating the last when exhausted
    Canned(Vec<ResponseRecord>),
    /// Delegate to the record handler (network passthrough)
    Passthrough,
}

/// Dispatch outcome for a live request
#[derive(Debug, Clone)]
pub enum Matched {
    /// Serve this recorded response
    Canned(ResponseRecord),
    /// Forward to the record handler
    Passthrough,
}

struct CatalogEntry {
    matcher: RequestMatcher,
    responder: Responder,
    cursor: usize,
}

/// Keyed, insertion-ordered catalog of matchers
///
/// First matching entry wins. Registering a matcher whose key collides with
/// an existing one merges the new responses onto the front, so the most
/// recently registered response takes precedence and older responses remain
/// as fallbacks for repeated calls.
#[derive(Default)]
pub struct MatcherCatalog {
    entries: Vec<CatalogEntry>,
}

impl MatcherCatalog {
    /// Empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered matchers
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all registered matchers
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Register a matcher with its responder
    pub fn register(&mut self, matcher: RequestMatcher, responder: Responder) {
        let key = matcher.key();

        let responder = match self.entries.iter().position(|e| e.matcher.key() == key) {
            Some(pos) => {
                let existing = self.entries.remove(pos);
                debug!(key = %key, "merging matcher with existing registration");
                match (responder, existing.responder) {
                    (Responder::Canned(mut new), Responder::Canned(old)) => {
                        new.extend(old);
                        Responder::Canned(new)
                    }
                    (new, _) => new,
                }
            }
            None => responder,
        };

        self.entries.push(CatalogEntry {
            matcher,
            responder,
            cursor: 0,
        });
    }

    /// Find the responder for a live request
    ///
    /// Canned entries advance their cursor so repeated calls to one key walk
    /// the merged response list, sticking on the final entry.
    pub fn dispatch(
        &mut self,
        request: &LiveRequest,
        uri_spec: &FilterSpec,
        querystring_spec: &FilterSpec,
    ) -> Option<Matched> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.matcher.matches(request, uri_spec, querystring_spec))?;

        match &entry.responder {
            Responder::Passthrough => Some(Matched::Passthrough),
            Responder::Canned(responses) => {
                let index = entry.cursor.min(responses.len().saturating_sub(1));
                let response = responses.get(index)?.clone();
                if entry.cursor + 1 < responses.len() {
                    entry.cursor += 1;
                }
                Some(Matched::Canned(response))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Replacement;
    use crate::transaction::{Body, Headers};

    fn response(status: u16, body: &str) -> ResponseRecord {
        ResponseRecord {
            status,
            body: Body::Text(body.to_string()),
            headers: Headers::new(),
        }
    }

    fn no_filters() -> (FilterSpec, FilterSpec) {
        (FilterSpec::new(), FilterSpec::new())
    }

    #[test]
    fn test_exact_match_base_uri() {
        let matcher = RequestMatcher::exact(Method::Get, "https://example.com/users", false);
        let (uri_spec, qs_spec) = no_filters();

        let hit = LiveRequest::new(Method::Get, "https://example.com/users");
        assert!(matcher.matches(&hit, &uri_spec, &qs_spec));

        let miss = LiveRequest::new(Method::Get, "https://example.com/orders");
        assert!(!matcher.matches(&miss, &uri_spec, &qs_spec));
    }

    #[test]
    fn test_method_mismatch() {
        let matcher = RequestMatcher::exact(Method::Get, "https://example.com/users", false);
        let (uri_spec, qs_spec) = no_filters();

        let request = LiveRequest::new(Method::Post, "https://example.com/users");
        assert!(!matcher.matches(&request, &uri_spec, &qs_spec));
    }

    #[test]
    fn test_trailing_slash_normalization() {
        let matcher = RequestMatcher::exact(Method::Get, "https://example.com", false);
        let (uri_spec, qs_spec) = no_filters();

        let request = LiveRequest::new(Method::Get, "https://example.com/");
        assert!(matcher.matches(&request, &uri_spec, &qs_spec));
    }

    #[test]
    fn test_querystring_ignored_when_disabled() {
        let matcher = RequestMatcher::exact(Method::Get, "https://example.com/users?page=1", false);
        let (uri_spec, qs_spec) = no_filters();

        let request = LiveRequest::new(Method::Get, "https://example.com/users?page=99");
        assert!(matcher.matches(&request, &uri_spec, &qs_spec));
    }

    #[test]
    fn test_querystring_exact_when_enabled() {
        let matcher = RequestMatcher::exact(Method::Get, "https://example.com/users?page=1", true);
        let (uri_spec, qs_spec) = no_filters();

        let hit = LiveRequest::new(Method::Get, "https://example.com/users?page=1");
        assert!(matcher.matches(&hit, &uri_spec, &qs_spec));

        let miss = LiveRequest::new(Method::Get, "https://example.com/users?page=2");
        assert!(!matcher.matches(&miss, &uri_spec, &qs_spec));
    }

    #[test]
    fn test_querystring_order_canonicalized() {
        let matcher =
            RequestMatcher::exact(Method::Get, "https://example.com/users?b=2&a=1", true);
        let (uri_spec, qs_spec) = no_filters();

        let request = LiveRequest::new(Method::Get, "https://example.com/users?a=1&b=2");
        assert!(matcher.matches(&request, &uri_spec, &qs_spec));
    }

    #[test]
    fn test_filtered_secret_still_matches() {
        // Recording was stored with the token redacted; a live request
        // carrying the original secret must still match.
        let qs_spec = FilterSpec::from([("token".to_string(), Replacement::Literal(
            "REDACTED".to_string(),
        ))]);
        let uri_spec = FilterSpec::new();

        let matcher = RequestMatcher::exact(
            Method::Get,
            "https://example.com/users?token=REDACTED",
            true,
        );
        let request = LiveRequest::new(Method::Get, "https://example.com/users?token=opensesame");
        assert!(matcher.matches(&request, &uri_spec, &qs_spec));
    }

    #[test]
    fn test_uri_filter_applies_to_both_sides() {
        let uri_spec = FilterSpec::from([("tenant-42".to_string(), Replacement::Literal(
            "tenant-x".to_string(),
        ))]);
        let qs_spec = FilterSpec::new();

        let matcher =
            RequestMatcher::exact(Method::Get, "https://example.com/tenant-x/users", false);
        let request = LiveRequest::new(Method::Get, "https://example.com/tenant-42/users");
        assert!(matcher.matches(&request, &uri_spec, &qs_spec));
    }

    #[test]
    fn test_any_matcher() {
        let matcher = RequestMatcher::any(Method::Post);
        let (uri_spec, qs_spec) = no_filters();

        let request = LiveRequest::new(Method::Post, "https://anything.example/x?y=z");
        assert!(matcher.matches(&request, &uri_spec, &qs_spec));

        let wrong_method = LiveRequest::new(Method::Get, "https://anything.example/x");
        assert!(!matcher.matches(&wrong_method, &uri_spec, &qs_spec));
    }

    #[test]
    fn test_catalog_collision_newest_first() {
        let mut catalog = MatcherCatalog::new();
        let (uri_spec, qs_spec) = no_filters();
        let uri = "https://example.com/items?page=1";

        catalog.register(
            RequestMatcher::exact(Method::Get, uri, true),
            Responder::Canned(vec![response(200, "{\"page\":1}")]),
        );
        catalog.register(
            RequestMatcher::exact(Method::Get, uri, true),
            Responder::Canned(vec![response(200, "{\"page\":2}")]),
        );
        assert_eq!(catalog.len(), 1);

        let request = LiveRequest::new(Method::Get, uri);

        // Newest registration first, older as fallback, last one repeats.
        for expected in ["{\"page\":2}", "{\"page\":1}", "{\"page\":1}"] {
            match catalog.dispatch(&request, &uri_spec, &qs_spec) {
                Some(Matched::Canned(r)) => {
                    assert_eq!(r.body, Body::Text(expected.to_string()));
                }
                other => panic!("expected canned response, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_catalog_no_match() {
        let mut catalog = MatcherCatalog::new();
        let (uri_spec, qs_spec) = no_filters();

        catalog.register(
            RequestMatcher::exact(Method::Get, "https://example.com/a", false),
            Responder::Canned(vec![response(200, "a")]),
        );

        let request = LiveRequest::new(Method::Get, "https://example.com/b");
        assert!(catalog.dispatch(&request, &uri_spec, &qs_spec).is_none());
    }

    #[test]
    fn test_catalog_passthrough_entry() {
        let mut catalog = MatcherCatalog::new();
        let (uri_spec, qs_spec) = no_filters();

        catalog.register(RequestMatcher::any(Method::Get), Responder::Passthrough);

        let request = LiveRequest::new(Method::Get, "https://example.com/whatever");
        assert!(matches!(
            catalog.dispatch(&request, &uri_spec, &qs_spec),
            Some(Matched::Passthrough)
        ));
    }

    #[test]
    fn test_canned_wins_over_passthrough_when_registered_first() {
        let mut catalog = MatcherCatalog::new();
        let (uri_spec, qs_spec) = no_filters();

        catalog.register(
            RequestMatcher::exact(Method::Get, "https://example.com/a", true),
            Responder::Canned(vec![response(200, "recorded")]),
        );
        catalog.register(RequestMatcher::any(Method::Get), Responder::Passthrough);

        let recorded = LiveRequest::new(Method::Get, "https://example.com/a");
        assert!(matches!(
            catalog.dispatch(&recorded, &uri_spec, &qs_spec),
            Some(Matched::Canned(_))
        ));

        let fresh = LiveRequest::new(Method::Get, "https://example.com/b");
        assert!(matches!(
            catalog.dispatch(&fresh, &uri_spec, &qs_spec),
            Some(Matched::Passthrough)
        ));
    }
}
