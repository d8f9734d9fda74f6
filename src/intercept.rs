//! In-process interception registry
//!
//! The explicit handle standing in for a process-wide mocking layer: it owns
//! the matcher catalog plus the enabled/passthrough flags, and the manager
//! composes it rather than inheriting from it. The model is exclusive
//! interception of a process's outbound HTTP calls, so only one registry
//! should be live at a time; nesting two active sessions is unsupported.

use std::time::Duration;

use crate::filter::FilterSpec;
use crate::matcher::{LiveRequest, Matched, MatcherCatalog, RequestMatcher, Responder};
use crate::transaction::Method;

/// Socket timeout applied when a live request carries none
pub const DEFAULT_SOCKET_TIMEOUT: Duration = Duration::from_secs(30);

/// Interception substrate handle
#[derive(Default)]
pub struct InterceptRegistry {
    enabled: bool,
    allow_network: bool,
    catalog: MatcherCatalog,
}

impl InterceptRegistry {
    /// Disabled registry with an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate interception; `allow_network` selects passthrough recording
    pub fn enable(&mut self, allow_network: bool) {
        self.enabled = true;
        self.allow_network = allow_network;
    }

    /// Deactivate interception; idempotent
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Deactivate and drop every registered matcher
    pub fn reset(&mut self) {
        self.enabled = false;
        self.allow_network = false;
        self.catalog.clear();
    }

    /// Whether interception is active
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether passthrough to the real network is permitted
    #[must_use]
    pub fn network_allowed(&self) -> bool {
        self.allow_network
    }

    /// Number of registered matchers
    #[must_use]
    pub fn matcher_count(&self) -> usize {
        self.catalog.len()
    }

    /// Register a matcher with its responder
    pub fn register(&mut self, matcher: RequestMatcher, responder: Responder) {
        self.catalog.register(matcher, responder);
    }

    /// Register the universal record-mode interceptor for every method
    pub fn register_passthrough_all(&mut self) {
        for method in Method::ALL {
            self.catalog
                .register(RequestMatcher::any(method), Responder::Passthrough);
        }
    }

    /// Find the responder for a live request; `None` when interception is
    /// disabled or nothing matches
    pub fn dispatch(
        &mut self,
        request: &LiveRequest,
        uri_spec: &FilterSpec,
        querystring_spec: &FilterSpec,
    ) -> Option<Matched> {
        if !self.enabled {
            return None;
        }
        self.catalog.dispatch(request, uri_spec, querystring_spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enable_disable() {
        let mut registry = InterceptRegistry::new();
        assert!(!registry.is_enabled());

        registry.enable(true);
        assert!(registry.is_enabled());
        assert!(registry.network_allowed());

        registry.disable();
        registry.disable();
        assert!(!registry.is_enabled());
    }

    #[test]
    fn test_dispatch_disabled_registry() {
        let mut registry = InterceptRegistry::new();
        registry.register_passthrough_all();

        let request = LiveRequest::new(Method::Get, "https://example.com/");
        let spec = FilterSpec::new();
        assert!(registry.dispatch(&request, &spec, &spec).is_none());
    }

    #[test]
    fn test_universal_registration_covers_all_methods() {
        let mut registry = InterceptRegistry::new();
        registry.enable(true);
        registry.register_passthrough_all();
        assert_eq!(registry.matcher_count(), Method::ALL.len());

        let spec = FilterSpec::new();
        for method in Method::ALL {
            let request = LiveRequest::new(method, "https://example.com/x");
            assert!(matches!(
                registry.dispatch(&request, &spec, &spec),
                Some(Matched::Passthrough)
            ));
        }
    }

    #[test]
    fn test_reset_clears_catalog() {
        let mut registry = InterceptRegistry::new();
        registry.enable(false);
        registry.register_passthrough_all();

        registry.reset();
        assert!(!registry.is_enabled());
        assert_eq!(registry.matcher_count(), 0);
    }
}
