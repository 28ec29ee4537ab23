//! Configuration Module
//!
//! Loads the cache settings (and the demo server's port) from environment variables.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

use crate::strategy::EvictionStrategy;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend identifier looked up in the [`crate::backend::BackendRegistry`]
    pub backend: String,
    /// Eviction strategy applied to cached responses
    pub strategy: EvictionStrategy,
    /// Default TTL in seconds (0 = entries never expire)
    pub default_timeout: u64,
    /// Maximum number of entries for bounded backends (0 = unlimited)
    pub threshold: usize,
    /// Prefix applied to every key written through the cache facade
    pub key_prefix: String,
    /// Keep going when deleting a key fails, logging the failure instead
    pub ignore_errors: bool,
    /// Directory used by the filesystem backend
    pub cache_dir: Option<PathBuf>,
    /// Store the response content type next to the body
    pub store_content_type: bool,
    /// Largest response body, in bytes, the interceptor will store
    pub max_body_size: usize,
    /// Backend-specific parameters passed through to the backend constructor
    pub options: HashMap<String, String>,
    /// HTTP server port of the demo binary
    pub server_port: u16,
    /// Interval in seconds of the expired-entry sweep (0 = disabled)
    pub cleanup_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_TYPE` - Backend name (default: simple)
    /// - `CACHE_EVICTION_STRATEGY` - time-based, rest-based or rest-and-time-based (default: time-based)
    /// - `CACHE_DEFAULT_TIMEOUT` - Default TTL in seconds (default: 300)
    /// - `CACHE_THRESHOLD` - Maximum entries (default: 500)
    /// - `CACHE_KEY_PREFIX` - Key prefix (default: route_cache_)
    /// - `CACHE_IGNORE_ERRORS` - Suppress deletion errors (default: false)
    /// - `CACHE_DIR` - Filesystem backend directory (default: unset)
    /// - `CACHE_STORE_CONTENT_TYPE` - Keep response content types (default: true)
    /// - `CACHE_MAX_BODY_SIZE` - Largest cacheable response body in bytes (default: 1048576)
    /// - `CACHE_OPTIONS` - Comma separated `key=value` backend options (default: empty)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Sweep frequency in seconds (default: 0)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backend: env::var("CACHE_TYPE").unwrap_or(defaults.backend),
            strategy: parse_var("CACHE_EVICTION_STRATEGY").unwrap_or(defaults.strategy),
            default_timeout: parse_var("CACHE_DEFAULT_TIMEOUT").unwrap_or(defaults.default_timeout),
            threshold: parse_var("CACHE_THRESHOLD").unwrap_or(defaults.threshold),
            key_prefix: env::var("CACHE_KEY_PREFIX").unwrap_or(defaults.key_prefix),
            ignore_errors: parse_var("CACHE_IGNORE_ERRORS").unwrap_or(defaults.ignore_errors),
            cache_dir: env::var("CACHE_DIR").ok().map(PathBuf::from),
            store_content_type: parse_var("CACHE_STORE_CONTENT_TYPE")
                .unwrap_or(defaults.store_content_type),
            max_body_size: parse_var("CACHE_MAX_BODY_SIZE").unwrap_or(defaults.max_body_size),
            options: env::var("CACHE_OPTIONS")
                .map(|raw| parse_options(&raw))
                .unwrap_or_default(),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            cleanup_interval: parse_var("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: "simple".to_string(),
            strategy: EvictionStrategy::TimeBased,
            default_timeout: 300,
            threshold: 500,
            key_prefix: "route_cache_".to_string(),
            ignore_errors: false,
            cache_dir: None,
            store_content_type: true,
            max_body_size: 1024 * 1024,
            options: HashMap::new(),
            server_port: 3000,
            cleanup_interval: 0,
        }
    }
}

/// Parses an environment variable, warning when it is set but unusable.
fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparseable {}={:?}", name, raw);
            None
        }
    }
}

/// Parses `key=value,key=value`. Entries without `=` are skipped.
fn parse_options(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.backend, "simple");
        assert_eq!(config.strategy, EvictionStrategy::TimeBased);
        assert_eq!(config.default_timeout, 300);
        assert_eq!(config.threshold, 500);
        assert_eq!(config.key_prefix, "route_cache_");
        assert!(!config.ignore_errors);
        assert!(config.store_content_type);
        assert_eq!(config.max_body_size, 1_048_576);
        assert_eq!(config.server_port, 3000);
    }

    #[test]
    fn test_config_from_env() {
        // Single test touching the environment so parallel tests don't race.
        for name in [
            "CACHE_TYPE",
            "CACHE_EVICTION_STRATEGY",
            "CACHE_DEFAULT_TIMEOUT",
            "CACHE_THRESHOLD",
            "CACHE_OPTIONS",
        ] {
            env::remove_var(name);
        }

        let config = Config::from_env();
        assert_eq!(config.backend, "simple");
        assert_eq!(config.default_timeout, 300);

        env::set_var("CACHE_EVICTION_STRATEGY", "rest-and-time-based");
        env::set_var("CACHE_THRESHOLD", "not-a-number");
        env::set_var("CACHE_OPTIONS", "host=localhost, port=6379,broken");

        let config = Config::from_env();
        assert_eq!(config.strategy, EvictionStrategy::RestAndTimeBased);
        assert_eq!(config.threshold, 500);
        assert_eq!(config.options.get("host").map(String::as_str), Some("localhost"));
        assert_eq!(config.options.get("port").map(String::as_str), Some("6379"));
        assert_eq!(config.options.len(), 2);

        env::remove_var("CACHE_EVICTION_STRATEGY");
        env::remove_var("CACHE_THRESHOLD");
        env::remove_var("CACHE_OPTIONS");
    }

    #[test]
    fn test_parse_options_empty() {
        assert!(parse_options("").is_empty());
    }
}
