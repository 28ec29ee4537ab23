//! Error types for the caching layer
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for backends, the cache facade and the interceptor.
///
/// A conditional `add` on an existing key is not an error: it is reported as
/// `Ok(false)` by [`crate::backend::Backend::add`].
#[derive(Error, Debug)]
pub enum CacheError {
    /// Bad timeout, unrepresentable key or malformed stored value
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The store could not be reached or failed while serving the request
    #[error("Backend unreachable: {0}")]
    BackendUnreachable(String),

    /// The backend has no native support for the requested operation
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Encoding or decoding a structured payload failed
    #[error("Codec error: {0}")]
    Codec(String),

    /// Unknown backend name or unusable configuration value
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::BackendUnreachable(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Codec(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            CacheError::BackendUnreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            CacheError::Codec(_) | CacheError::Configuration(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the caching layer.
pub type Result<T> = std::result::Result<T, CacheError>;
