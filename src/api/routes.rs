//! API Routes
//!
//! Configures the axum router of the demo server and marks its cacheable
//! handlers.

use axum::{
    http::Method,
    middleware,
    routing::get,
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    create_thing, get_thing, health_handler, list_things, stats_handler, AppState,
};
use crate::codec::JsonCodec;
use crate::marker::CacheableMarker;
use crate::middleware::intercept;

/// Creates the main router with all endpoints configured.
///
/// `GET /things` and `GET /things/:id` are marked cacheable on the state's
/// cache. The interceptor sits inside CORS and tracing, so hits are still
/// traced and carry CORS headers.
pub fn create_router(state: AppState) -> Router {
    state
        .cache
        .mark("/things", Method::GET, CacheableMarker::new());
    state
        .cache
        .mark("/things/:id", Method::GET, CacheableMarker::new());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/things", get(list_things).post(create_thing))
        .route("/things/:id", get(get_thing))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(middleware::from_fn_with_state(
            state.cache.clone(),
            intercept::<JsonCodec>,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
