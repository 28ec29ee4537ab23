//! API Handlers
//!
//! HTTP request handlers of the demo server.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tokio::sync::RwLock;
use tracing::debug;

use crate::backend::SimpleBackend;
use crate::cache::Cache;
use crate::error::{CacheError, Result};
use crate::models::{CreateThing, ErrorResponse, HealthResponse, StatsResponse, Thing};

/// In-memory collection served under `/things`.
#[derive(Debug, Default)]
pub struct ThingStore {
    things: Vec<Thing>,
    next_id: u64,
}

impl ThingStore {
    pub fn insert(&mut self, name: impl Into<String>) -> Thing {
        self.next_id += 1;
        let thing = Thing::new(self.next_id, name);
        self.things.push(thing.clone());
        thing
    }

    pub fn get(&self, id: u64) -> Option<&Thing> {
        self.things.iter().find(|thing| thing.id == id)
    }

    pub fn all(&self) -> &[Thing] {
        &self.things
    }
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<Cache>,
    pub things: Arc<RwLock<ThingStore>>,
    /// Set when the cache runs on the in-process store, for `/stats`
    pub store: Option<Arc<SimpleBackend>>,
}

impl AppState {
    pub fn new(cache: Arc<Cache>, store: Option<Arc<SimpleBackend>>) -> Self {
        Self {
            cache,
            things: Arc::new(RwLock::new(ThingStore::default())),
            store,
        }
    }
}

/// Handler for GET /things
pub async fn list_things(State(state): State<AppState>) -> Json<Vec<Thing>> {
    let things = state.things.read().await;
    debug!(count = things.all().len(), "listing things");
    Json(things.all().to_vec())
}

/// Handler for POST /things
pub async fn create_thing(
    State(state): State<AppState>,
    Json(req): Json<CreateThing>,
) -> Result<(StatusCode, Json<Thing>)> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidInput(error_msg));
    }

    let thing = state.things.write().await.insert(req.name);
    Ok((StatusCode::CREATED, Json(thing)))
}

/// Handler for GET /things/:id
pub async fn get_thing(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> std::result::Result<Json<Thing>, Response> {
    let things = state.things.read().await;
    match things.get(id) {
        Some(thing) => Ok(Json(thing.clone())),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!("Thing {} not found", id))),
        )
            .into_response()),
    }
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.store.as_ref().map(|store| store.stats());
    Json(StatsResponse::new(
        state.cache.backend().name(),
        state.cache.strategy().as_str(),
        stats.as_ref(),
    ))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
