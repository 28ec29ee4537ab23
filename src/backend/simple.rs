//! Simple Backend Module
//!
//! Bounded in-process store combining a HashMap with first-observed
//! eviction and lazy TTL expiration.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tracing::debug;

use super::{validate_key, Backend, CacheEntry, CacheStats, InsertionOrder, Timeout};
use crate::backend::current_timestamp_ms;
use crate::error::{CacheError, Result};

// == Store State ==
/// Everything guarded by the backend's mutex.
#[derive(Debug, Default)]
struct StoreState {
    entries: HashMap<String, CacheEntry>,
    order: InsertionOrder,
    stats: CacheStats,
}

impl StoreState {
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.order.remove(key);
        }
        removed
    }

    /// Returns the live entry for `key`, dropping it first if it has expired.
    fn live(&mut self, key: &str) -> Option<&CacheEntry> {
        if self.entries.get(key).is_some_and(CacheEntry::is_expired) {
            self.remove(key);
        }
        self.entries.get(key)
    }

    fn purge_expired(&mut self) -> usize {
        let now = current_timestamp_ms();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    /// Inserts `entry`, evicting old entries first if a new key would push the
    /// store past `threshold`. Runs entirely under the caller's lock.
    fn insert(&mut self, key: &str, entry: CacheEntry, threshold: usize) {
        let is_overwrite = self.entries.contains_key(key);

        if !is_overwrite && threshold > 0 && self.entries.len() >= threshold {
            self.purge_expired();
            while self.entries.len() >= threshold {
                let Some(oldest) = self.order.pop_oldest() else {
                    break;
                };
                if self.entries.remove(&oldest).is_some() {
                    self.stats.record_eviction();
                    debug!(key = %oldest, "evicted entry to respect capacity");
                }
            }
        }

        self.entries.insert(key.to_string(), entry);
        self.order.observe(key);
        self.stats.set_total_entries(self.entries.len());
    }
}

// == Simple Backend ==
/// Default in-process backend.
///
/// When a write would grow the store past `threshold` (0 = unlimited), expired
/// entries are dropped and then the oldest stored entries are evicted. This
/// bounds the size but is not LRU: reads never change eviction order.
#[derive(Debug)]
pub struct SimpleBackend {
    state: Mutex<StoreState>,
    threshold: usize,
    default_ttl: u64,
}

impl SimpleBackend {
    // == Constructor ==
    /// Creates a store holding at most `threshold` entries (0 = unlimited),
    /// expiring entries after `default_ttl` seconds unless told otherwise.
    pub fn new(threshold: usize, default_ttl: u64) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            threshold,
            default_ttl,
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    fn entry(&self, value: Bytes, timeout: Timeout) -> Result<CacheEntry> {
        Ok(CacheEntry::new(value, timeout.resolve(self.default_ttl)?))
    }

    fn adjust(&self, key: &str, delta: i64) -> Result<i64> {
        validate_key(key)?;
        let mut state = self.state.lock();

        let (current, expires_at) = match state.live(key) {
            Some(entry) => {
                let text = std::str::from_utf8(&entry.value).map_err(|_| {
                    CacheError::InvalidInput(format!("value of '{}' is not numeric", key))
                })?;
                let current: i64 = text.trim().parse().map_err(|_| {
                    CacheError::InvalidInput(format!("value of '{}' is not numeric", key))
                })?;
                (current, Some(entry.expires_at))
            }
            None => (0, None),
        };

        let updated = current.checked_add(delta).ok_or_else(|| {
            CacheError::InvalidInput(format!("counter '{}' would overflow", key))
        })?;
        let value = Bytes::from(updated.to_string());

        let entry = match expires_at {
            Some(expires_at) => CacheEntry { value, expires_at },
            None => self.entry(value, Timeout::Default)?,
        };
        state.insert(key, entry, self.threshold);
        Ok(updated)
    }

    // == Stats ==
    /// Returns a snapshot of the store statistics.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        let mut stats = state.stats.clone();
        stats.set_total_entries(state.entries.len());
        stats
    }

    // == Cleanup Expired ==
    /// Removes all expired entries and returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut state = self.state.lock();
        let removed = state.purge_expired();
        let len = state.entries.len();
        state.stats.set_total_entries(len);
        removed
    }

    /// Number of stored entries, expired-but-unswept ones included.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }
}

impl Default for SimpleBackend {
    fn default() -> Self {
        Self::new(500, 300)
    }
}

#[async_trait]
impl Backend for SimpleBackend {
    fn name(&self) -> &str {
        "simple"
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        validate_key(key)?;
        let mut state = self.state.lock();
        let value = state.live(key).map(|entry| entry.value.clone());
        match value {
            Some(_) => state.stats.record_hit(),
            None => state.stats.record_miss(),
        }
        let len = state.entries.len();
        state.stats.set_total_entries(len);
        Ok(value)
    }

    async fn set(&self, key: &str, value: Bytes, timeout: Timeout) -> Result<()> {
        validate_key(key)?;
        let entry = self.entry(value, timeout)?;
        self.state.lock().insert(key, entry, self.threshold);
        Ok(())
    }

    async fn add(&self, key: &str, value: Bytes, timeout: Timeout) -> Result<bool> {
        validate_key(key)?;
        let entry = self.entry(value, timeout)?;
        let mut state = self.state.lock();
        if state.live(key).is_some() {
            return Ok(false);
        }
        state.insert(key, entry, self.threshold);
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let mut state = self.state.lock();
        let removed = state
            .remove(key)
            .is_some_and(|entry| !entry.is_expired());
        let len = state.entries.len();
        state.stats.set_total_entries(len);
        Ok(removed)
    }

    async fn has(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.state.lock().live(key).is_some())
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.entries.clear();
        state.order.clear();
        state.stats.set_total_entries(0);
        Ok(())
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<Bytes>>> {
        for key in keys {
            validate_key(key)?;
        }
        let mut state = self.state.lock();
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            let value = state.live(key).map(|entry| entry.value.clone());
            match value {
                Some(_) => state.stats.record_hit(),
                None => state.stats.record_miss(),
            }
            values.push(value);
        }
        Ok(values)
    }

    async fn inc(&self, key: &str, delta: i64) -> Result<i64> {
        self.adjust(key, delta)
    }

    async fn dec(&self, key: &str, delta: i64) -> Result<i64> {
        let delta = delta.checked_neg().ok_or_else(|| {
            CacheError::InvalidInput("decrement delta out of range".to_string())
        })?;
        self.adjust(key, delta)
    }
}

// Used by tests to write entries with sub-second lifetimes.
#[cfg(test)]
impl SimpleBackend {
    pub(crate) fn set_with_ttl(&self, key: &str, value: Bytes, ttl: std::time::Duration) {
        self.state
            .lock()
            .insert(key, CacheEntry::new(value, Some(ttl)), self.threshold);
    }

    /// Remaining lifetime of a stored entry; the inner `None` means no expiry.
    pub(crate) fn ttl_remaining_ms(&self, key: &str) -> Option<Option<u64>> {
        self.state.lock().entries.get(key).map(CacheEntry::ttl_remaining_ms)
    }
}
