//! Cacheable handler markers.
//!
//! Handlers opt into response caching at registration time. A marker is
//! attached to one handler (route pattern + method) or to every handler of a
//! resource (route pattern alone); the interceptor looks markers up by the
//! matched route, never by inspecting the handler itself.

use std::collections::HashMap;

use axum::http::Method;
use parking_lot::RwLock;

use crate::backend::Timeout;

/// Caching options of a marked handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheableMarker {
    /// TTL of stored responses; None falls back to the configured default
    pub timeout: Option<Timeout>,
}

impl CacheableMarker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marker caching for `secs` seconds.
    pub fn with_timeout(secs: u64) -> Self {
        Self {
            timeout: Some(Timeout::from(secs)),
        }
    }
}

/// Registration-time side table of markers.
#[derive(Debug, Default)]
pub struct MarkerRegistry {
    handlers: RwLock<HashMap<(String, Method), CacheableMarker>>,
    resources: RwLock<HashMap<String, CacheableMarker>>,
}

impl MarkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the handler for `method` on `resource`. Re-registering replaces
    /// the previous marker.
    pub fn mark(&self, resource: impl Into<String>, method: Method, marker: CacheableMarker) {
        self.handlers.write().insert((resource.into(), method), marker);
    }

    /// Marks every handler of `resource`.
    pub fn mark_resource(&self, resource: impl Into<String>, marker: CacheableMarker) {
        self.resources.write().insert(resource.into(), marker);
    }

    /// Handler markers win over resource markers.
    pub fn lookup(&self, resource: &str, method: &Method) -> Option<CacheableMarker> {
        if let Some(marker) = self
            .handlers
            .read()
            .get(&(resource.to_string(), method.clone()))
        {
            return Some(*marker);
        }
        self.resources.read().get(resource).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_marker() {
        let registry = MarkerRegistry::new();
        registry.mark("/things", Method::GET, CacheableMarker::with_timeout(60));

        assert_eq!(
            registry.lookup("/things", &Method::GET),
            Some(CacheableMarker::with_timeout(60))
        );
        assert_eq!(registry.lookup("/things", &Method::POST), None);
        assert_eq!(registry.lookup("/other", &Method::GET), None);
    }

    #[test]
    fn test_resource_marker_covers_all_methods() {
        let registry = MarkerRegistry::new();
        registry.mark_resource("/things/:id", CacheableMarker::new());

        assert!(registry.lookup("/things/:id", &Method::GET).is_some());
        assert!(registry.lookup("/things/:id", &Method::DELETE).is_some());
    }

    #[test]
    fn test_handler_marker_overrides_resource_marker() {
        let registry = MarkerRegistry::new();
        registry.mark_resource("/things", CacheableMarker::with_timeout(10));
        registry.mark("/things", Method::GET, CacheableMarker::with_timeout(99));

        assert_eq!(
            registry.lookup("/things", &Method::GET).unwrap().timeout,
            Some(Timeout::Seconds(99))
        );
        assert_eq!(
            registry.lookup("/things", &Method::PUT).unwrap().timeout,
            Some(Timeout::Seconds(10))
        );
    }
}
