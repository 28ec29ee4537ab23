//! route_cache - response caching and memoization for axum services
//!
//! Stores handler responses and function results in a pluggable key-value
//! backend, with TTL expiry and REST-aware invalidation.

pub mod api;
pub mod backend;
pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod keys;
pub mod marker;
pub mod memoize;
pub mod middleware;
pub mod models;
pub mod record;
pub mod strategy;
pub mod tasks;

pub use api::AppState;
pub use backend::{Backend, BackendRegistry, FileSystemBackend, NullBackend, SimpleBackend, Timeout};
pub use cache::Cache;
pub use codec::{Codec, JsonCodec};
pub use config::Config;
pub use error::{CacheError, Result};
pub use keys::{CallableId, MemoArgs};
pub use marker::CacheableMarker;
pub use memoize::MemoizeOptions;
pub use middleware::{intercept, CacheStatus, CACHE_STATUS_HEADER};
pub use strategy::{Decision, EvictionStrategy};
pub use tasks::spawn_sweep_task;
