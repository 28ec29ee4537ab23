//! Lifecycle Interceptor
//!
//! axum middleware wrapping marked routes: serves stored responses before the
//! handler runs, stores fresh `200 OK` responses afterwards and invalidates
//! a resource's cached reads when a mutating request reaches it.
//!
//! Install with `axum::middleware::from_fn_with_state(cache, intercept::<JsonCodec>)`
//! via `Router::layer` so that [`MatchedPath`] is available.

use std::sync::Arc;

use axum::{
    body::{Body, HttpBody},
    extract::{MatchedPath, Request, State},
    http::{header::CONTENT_TYPE, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::backend::Timeout;
use crate::cache::Cache;
use crate::codec::Codec;
use crate::error::{CacheError, Result};
use crate::keys::response_key;
use crate::marker::CacheableMarker;
use crate::record::ResponseRecord;

/// Response header telling clients whether the body came from the cache.
pub const CACHE_STATUS_HEADER: &str = "x-cache-status";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }

    fn header_value(&self) -> HeaderValue {
        HeaderValue::from_static(self.as_str())
    }
}

/// Middleware entry point. Backend failures become error responses through
/// [`CacheError`]'s `IntoResponse`.
pub async fn intercept<C: Codec>(
    State(cache): State<Arc<Cache<C>>>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let decision = cache.strategy().decide(&method);
    let marker = request
        .extensions()
        .get::<MatchedPath>()
        .and_then(|matched| cache.marker_for(matched.as_str(), marker_method(&method)));
    let key = response_key(&method, &path);

    if decision.may_serve_from_cache && marker.is_some() {
        if let Some(response) = lookup(&cache, &key).await? {
            debug!(key = %key, "cache hit");
            return Ok(response);
        }
    }

    let response = next.run(request).await;

    let response = match marker {
        Some(marker)
            if decision.should_store_after_response && response.status() == StatusCode::OK =>
        {
            store(&cache, &key, marker, response).await?
        }
        _ => response,
    };

    if decision.should_invalidate {
        let get_key = response_key(&Method::GET, &path);
        let head_key = response_key(&Method::HEAD, &path);
        debug!(path = %path, "invalidating cached reads");
        cache
            .delete_many(&[get_key.as_str(), head_key.as_str()])
            .await?;
    }

    Ok(response)
}

/// axum answers HEAD with the GET handler, so HEAD shares its marker.
fn marker_method(method: &Method) -> &Method {
    if *method == Method::HEAD {
        &Method::GET
    } else {
        method
    }
}

async fn lookup<C: Codec>(cache: &Cache<C>, key: &str) -> Result<Option<Response>> {
    let Some(raw) = cache.get(key).await? else {
        debug!(key, "cache miss");
        return Ok(None);
    };

    match ResponseRecord::decode(raw) {
        Ok(record) => Ok(Some(replay(record))),
        Err(err) => {
            warn!(key, error = %err, "Ignoring malformed cached response");
            Ok(None)
        }
    }
}

fn replay(record: ResponseRecord) -> Response {
    let mut response = Response::new(Body::from(record.body));
    let headers = response.headers_mut();
    if let Some(content_type) = record
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
    {
        headers.insert(CONTENT_TYPE, content_type);
    }
    headers.insert(CACHE_STATUS_HEADER, CacheStatus::Hit.header_value());
    response
}

async fn store<C: Codec>(
    cache: &Cache<C>,
    key: &str,
    marker: CacheableMarker,
    response: Response,
) -> Result<Response> {
    // Streaming bodies have no upper bound and pass through unstored.
    let limit = cache.config().max_body_size;
    match response.body().size_hint().upper() {
        Some(upper) if upper <= limit as u64 => {}
        _ => {
            debug!(key, limit, "response body exceeds cacheable size, not stored");
            return Ok(response);
        }
    }

    let (mut parts, body) = response.into_parts();
    let body = axum::body::to_bytes(body, limit)
        .await
        .map_err(|err| CacheError::Codec(format!("failed to buffer response body: {}", err)))?;

    let content_type = if cache.config().store_content_type {
        parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    } else {
        None
    };

    let timeout = if cache.strategy().applies_ttl() {
        marker.timeout.unwrap_or(Timeout::Default)
    } else {
        Timeout::Never
    };

    let record = ResponseRecord::new(body.clone(), content_type);
    cache.set(key, record.encode(), timeout).await?;
    debug!(key, bytes = body.len(), "stored response");

    parts
        .headers
        .insert(CACHE_STATUS_HEADER, CacheStatus::Miss.header_value());
    Ok(Response::from_parts(parts, Body::from(body)))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{middleware, routing::get, Router};
    use tower::ServiceExt;

    use crate::backend::{Backend, NullBackend};
    use crate::config::Config;
    use crate::strategy::EvictionStrategy;

    fn app(cache: Arc<Cache>) -> Router {
        Router::new()
            .route("/plain", get(|| async { "plain" }))
            .route(
                "/marked",
                get(|| async { ([(CONTENT_TYPE, "text/plain")], "fresh") }).post(|| async { "posted" }),
            )
            .route(
                "/missing",
                get(|| async { (StatusCode::NOT_FOUND, "nope") }),
            )
            .route("/large", get(|| async { "x".repeat(64) }))
            .layer(middleware::from_fn_with_state(cache, intercept::<crate::codec::JsonCodec>))
    }

    fn marked_cache(strategy: EvictionStrategy) -> Arc<Cache> {
        let config = Config {
            strategy,
            ..Config::default()
        };
        let cache = Cache::new(config).unwrap();
        cache.mark("/marked", Method::GET, CacheableMarker::new());
        cache.mark("/missing", Method::GET, CacheableMarker::new());
        Arc::new(cache)
    }

    fn request(method: Method, uri: &str) -> Request {
        axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn status_of(response: &Response) -> Option<&str> {
        response
            .headers()
            .get(CACHE_STATUS_HEADER)
            .and_then(|value| value.to_str().ok())
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = marked_cache(EvictionStrategy::TimeBased);
        let app = app(cache.clone());

        let first = app.clone().oneshot(request(Method::GET, "/marked")).await.unwrap();
        assert_eq!(status_of(&first), Some("MISS"));

        let second = app.oneshot(request(Method::GET, "/marked")).await.unwrap();
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(status_of(&second), Some("HIT"));
        assert_eq!(second.headers()[CONTENT_TYPE], "text/plain");
        let body = axum::body::to_bytes(second.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"fresh");
    }

    #[tokio::test]
    async fn test_unmarked_route_is_not_cached() {
        let cache = marked_cache(EvictionStrategy::TimeBased);
        let response = app(cache.clone())
            .oneshot(request(Method::GET, "/plain"))
            .await
            .unwrap();

        assert_eq!(status_of(&response), None);
        assert!(!cache.has("GET:/plain").await.unwrap());
    }

    #[tokio::test]
    async fn test_error_status_is_not_cached() {
        let cache = marked_cache(EvictionStrategy::TimeBased);
        let response = app(cache.clone())
            .oneshot(request(Method::GET, "/missing"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(!cache.has("GET:/missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_rest_based_responses_never_expire() {
        let backend = Arc::new(crate::backend::SimpleBackend::new(10, 1));
        let config = Config {
            strategy: EvictionStrategy::RestBased,
            ..Config::default()
        };
        let cache: Cache = Cache::with_backend(config, backend.clone());
        cache.mark("/marked", Method::GET, CacheableMarker::with_timeout(1));

        app(Arc::new(cache))
            .oneshot(request(Method::GET, "/marked"))
            .await
            .unwrap();

        let ttl = backend.ttl_remaining_ms("route_cache_GET:/marked");
        assert_eq!(ttl, Some(None));
    }

    #[tokio::test]
    async fn test_mutation_invalidates_under_rest_strategy() {
        let cache = marked_cache(EvictionStrategy::RestAndTimeBased);
        let app = app(cache.clone());

        app.clone().oneshot(request(Method::GET, "/marked")).await.unwrap();
        assert!(cache.has("GET:/marked").await.unwrap());

        let posted = app.oneshot(request(Method::POST, "/marked")).await.unwrap();
        assert_eq!(posted.status(), StatusCode::OK);
        assert!(!cache.has("GET:/marked").await.unwrap());
    }

    #[tokio::test]
    async fn test_null_backend_always_misses() {
        let cache: Cache = Cache::with_backend(Config::default(), Arc::new(NullBackend));
        cache.mark("/marked", Method::GET, CacheableMarker::new());
        let app = app(Arc::new(cache));

        for _ in 0..2 {
            let response = app.clone().oneshot(request(Method::GET, "/marked")).await.unwrap();
            assert_eq!(status_of(&response), Some("MISS"));
        }
        assert_eq!(NullBackend.name(), "null");
    }

    async fn expires_after_marker_timeout(strategy: EvictionStrategy) {
        let config = Config {
            strategy,
            ..Config::default()
        };
        let cache = Cache::new(config).unwrap();
        cache.mark("/marked", Method::GET, CacheableMarker::with_timeout(1));
        let app = app(Arc::new(cache));

        let first = app.clone().oneshot(request(Method::GET, "/marked")).await.unwrap();
        assert_eq!(status_of(&first), Some("MISS"));
        let second = app.clone().oneshot(request(Method::GET, "/marked")).await.unwrap();
        assert_eq!(status_of(&second), Some("HIT"));

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

        let third = app.oneshot(request(Method::GET, "/marked")).await.unwrap();
        assert_eq!(status_of(&third), Some("MISS"), "{} entry outlived its timeout", strategy);
    }

    #[tokio::test]
    async fn test_marker_timeout_expires_under_time_based() {
        expires_after_marker_timeout(EvictionStrategy::TimeBased).await;
    }

    #[tokio::test]
    async fn test_marker_timeout_expires_under_rest_and_time_based() {
        expires_after_marker_timeout(EvictionStrategy::RestAndTimeBased).await;
    }

    #[tokio::test]
    async fn test_head_is_cached_separately_and_invalidated() {
        let cache = marked_cache(EvictionStrategy::RestBased);
        let app = app(cache.clone());

        let first = app.clone().oneshot(request(Method::HEAD, "/marked")).await.unwrap();
        assert_eq!(status_of(&first), Some("MISS"));
        assert!(cache.has("HEAD:/marked").await.unwrap());
        assert!(!cache.has("GET:/marked").await.unwrap());

        let second = app.clone().oneshot(request(Method::HEAD, "/marked")).await.unwrap();
        assert_eq!(status_of(&second), Some("HIT"));

        app.clone().oneshot(request(Method::GET, "/marked")).await.unwrap();
        app.oneshot(request(Method::POST, "/marked")).await.unwrap();

        assert!(!cache.has("HEAD:/marked").await.unwrap());
        assert!(!cache.has("GET:/marked").await.unwrap());
    }

    #[tokio::test]
    async fn test_oversized_body_passes_through_unstored() {
        let config = Config {
            max_body_size: 16,
            ..Config::default()
        };
        let cache = Cache::new(config).unwrap();
        cache.mark("/large", Method::GET, CacheableMarker::new());
        let cache = Arc::new(cache);

        let response = app(cache.clone())
            .oneshot(request(Method::GET, "/large"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(status_of(&response), None);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.len(), 64);
        assert!(!cache.has("GET:/large").await.unwrap());
    }
}
