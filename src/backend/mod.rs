//! Backend Module
//!
//! The uniform key-value contract every store implements, plus the built-in
//! stores and the registry used to select one by name.

mod entry;
mod filesystem;
mod null;
mod order;
mod registry;
mod simple;
mod stats;


use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::error::{CacheError, Result};

// Re-export public types
pub use entry::{current_timestamp_ms, expiry_after, CacheEntry};
pub use filesystem::FileSystemBackend;
pub use null::NullBackend;
pub use order::InsertionOrder;
pub use registry::{BackendConstructor, BackendRegistry};
pub use simple::SimpleBackend;
pub use stats::CacheStats;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 250;

// == Timeout ==
/// Expiry requested for a write.
///
/// `Default` and `Seconds(0)` fall back to the backend's default TTL, and a
/// default TTL of zero stores without expiry. Negative seconds are rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Timeout {
    #[default]
    Default,
    Never,
    Seconds(i64),
}

impl Timeout {
    /// Rejects negative timeouts.
    pub fn validate(self) -> Result<Self> {
        match self {
            Timeout::Seconds(secs) if secs < 0 => Err(CacheError::InvalidInput(format!(
                "timeout must not be negative, got {}",
                secs
            ))),
            other => Ok(other),
        }
    }

    /// Resolves to the TTL to store with, None meaning no expiry.
    pub fn resolve(self, default_ttl: u64) -> Result<Option<Duration>> {
        let default = (default_ttl > 0).then(|| Duration::from_secs(default_ttl));
        Ok(match self.validate()? {
            Timeout::Default | Timeout::Seconds(0) => default,
            Timeout::Never => None,
            Timeout::Seconds(secs) => Some(Duration::from_secs(secs as u64)),
        })
    }
}

impl From<u64> for Timeout {
    fn from(secs: u64) -> Self {
        Timeout::Seconds(secs.min(i64::MAX as u64) as i64)
    }
}

impl From<i64> for Timeout {
    fn from(secs: i64) -> Self {
        Timeout::Seconds(secs)
    }
}

// == Key Validation ==
/// Fails with `InvalidInput` for keys a store cannot represent as-is.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidInput("key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidInput(format!(
            "key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    if key.chars().any(char::is_control) {
        return Err(CacheError::InvalidInput(
            "key contains control characters".to_string(),
        ));
    }
    Ok(())
}

// == Backend Trait ==
/// Key-value storage with TTL support, operating on raw bytes.
///
/// Structured payloads are encoded by the caller (see [`crate::codec`]).
/// Implementations must be safe to call from any number of tasks at once.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Returns the value, None if never set, expired or evicted.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Stores the value, overwriting any existing entry.
    async fn set(&self, key: &str, value: Bytes, timeout: Timeout) -> Result<()>;

    /// Stores the value only if the key is absent. `Ok(false)` means "not stored".
    async fn add(&self, key: &str, value: Bytes, timeout: Timeout) -> Result<bool>;

    /// Removes the entry. Deleting a missing key is not an error; the result
    /// reports whether something was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    async fn has(&self, key: &str) -> Result<bool>;

    /// Removes every entry owned by this backend.
    async fn clear(&self) -> Result<()>;

    /// Values in the same order as `keys`.
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<Bytes>>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.get(key).await?);
        }
        Ok(values)
    }

    /// Stores every entry and returns the keys that could not be stored.
    async fn set_many(&self, entries: Vec<(String, Bytes)>, timeout: Timeout) -> Result<Vec<String>> {
        let timeout = timeout.validate()?;
        let mut failed = Vec::new();
        for (key, value) in entries {
            if let Err(err) = self.set(&key, value, timeout).await {
                debug!(backend = self.name(), key = %key, error = %err, "set_many entry failed");
                failed.push(key);
            }
        }
        Ok(failed)
    }

    /// Deletes every key, stopping at the first error. Returns whether all
    /// keys were present.
    async fn delete_many(&self, keys: &[String]) -> Result<bool> {
        let mut all_deleted = true;
        for key in keys {
            all_deleted &= self.delete(key).await?;
        }
        Ok(all_deleted)
    }

    /// Atomically adds `delta`, initialising a missing key to `delta`.
    async fn inc(&self, key: &str, delta: i64) -> Result<i64> {
        let _ = (key, delta);
        Err(CacheError::Unsupported(format!(
            "{} backend has no atomic increment",
            self.name()
        )))
    }

    /// Atomically subtracts `delta`, initialising a missing key to `-delta`.
    async fn dec(&self, key: &str, delta: i64) -> Result<i64> {
        let _ = (key, delta);
        Err(CacheError::Unsupported(format!(
            "{} backend has no atomic decrement",
            self.name()
        )))
    }
}
