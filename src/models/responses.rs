//! Response DTOs for the demo API

use serde::Serialize;

use crate::backend::CacheStats;

/// A stored demo resource.
#[derive(Debug, Clone, Serialize)]
pub struct Thing {
    pub id: u64,
    pub name: String,
    /// Creation time in RFC 3339 format
    pub created_at: String,
}

impl Thing {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Response body for `GET /stats`
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Active backend name
    pub backend: String,
    /// Active eviction strategy
    pub strategy: String,
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of capacity evictions
    pub evictions: u64,
    /// Current number of entries in the store
    pub total_entries: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl StatsResponse {
    /// Backends without counters report zeros.
    pub fn new(backend: impl Into<String>, strategy: impl Into<String>, stats: Option<&CacheStats>) -> Self {
        let stats = stats.cloned().unwrap_or_default();
        Self {
            backend: backend.into(),
            strategy: strategy.into(),
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            total_entries: stats.total_entries,
            hit_rate: stats.hit_rate(),
        }
    }
}

/// Response body for `GET /health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
