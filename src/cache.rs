//! Cache Facade
//!
//! Ties the configured backend, key builder, strategy and handler markers
//! together, and provides memoization of arbitrary async computations.

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use axum::http::Method;
use bytes::Bytes;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::backend::{Backend, BackendRegistry, Timeout};
use crate::codec::{Codec, JsonCodec};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::keys::{memoize_key, CallableId, MemoArgs};
use crate::marker::{CacheableMarker, MarkerRegistry};
use crate::memoize::{MemoIndex, MemoizeOptions};
use crate::strategy::EvictionStrategy;

// == Cache ==
/// The public caching API.
///
/// One `Cache` owns one backend; share it between request handlers as
/// `Arc<Cache>`. Every key passes through the configured prefix.
pub struct Cache<C: Codec = JsonCodec> {
    backend: Arc<dyn Backend>,
    config: Config,
    markers: MarkerRegistry,
    memo_index: Mutex<MemoIndex>,
    _codec: PhantomData<fn() -> C>,
}

impl Cache<JsonCodec> {
    /// Builds the backend named in `config` from the built-in registry.
    pub fn new(config: Config) -> Result<Self> {
        Self::from_registry(config, &BackendRegistry::new())
    }
}

impl<C: Codec> Cache<C> {
    // == Constructors ==
    pub fn from_registry(config: Config, registry: &BackendRegistry) -> Result<Self> {
        let backend = registry.build(&config)?;
        Ok(Self::with_backend(config, backend))
    }

    /// Uses an already constructed backend, e.g. a client for a remote store.
    pub fn with_backend(config: Config, backend: Arc<dyn Backend>) -> Self {
        info!(
            backend = backend.name(),
            strategy = %config.strategy,
            prefix = %config.key_prefix,
            "Cache initialized"
        );
        let memo_index = Mutex::new(MemoIndex::new(config.threshold));
        Self {
            backend,
            config,
            markers: MarkerRegistry::new(),
            memo_index,
            _codec: PhantomData,
        }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn strategy(&self) -> EvictionStrategy {
        self.config.strategy
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    fn suppressible(&self, err: &CacheError) -> bool {
        self.config.ignore_errors && matches!(err, CacheError::BackendUnreachable(_))
    }

    // == Handler Marking ==
    /// Marks the handler serving `method` on the route pattern `resource`.
    pub fn mark(&self, resource: impl Into<String>, method: Method, marker: CacheableMarker) {
        self.markers.mark(resource, method, marker);
    }

    /// Marks every handler of the route pattern `resource`.
    pub fn mark_resource(&self, resource: impl Into<String>, marker: CacheableMarker) {
        self.markers.mark_resource(resource, marker);
    }

    pub fn marker_for(&self, resource: &str, method: &Method) -> Option<CacheableMarker> {
        self.markers.lookup(resource, method)
    }

    // == Backend Proxies ==
    pub async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        self.backend.get(&self.key(key)).await
    }

    pub async fn set(&self, key: &str, value: impl Into<Bytes>, timeout: Timeout) -> Result<()> {
        self.backend.set(&self.key(key), value.into(), timeout).await
    }

    /// Returns `Ok(false)` when the key already holds a value.
    pub async fn add(&self, key: &str, value: impl Into<Bytes>, timeout: Timeout) -> Result<bool> {
        self.backend.add(&self.key(key), value.into(), timeout).await
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        match self.backend.delete(&self.key(key)).await {
            Err(err) if self.suppressible(&err) => {
                warn!(key, error = %err, "Ignoring failed cache delete");
                Ok(false)
            }
            other => other,
        }
    }

    pub async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<Bytes>>> {
        let keys: Vec<String> = keys.iter().map(|key| self.key(key)).collect();
        self.backend.get_many(&keys).await
    }

    /// Like [`Cache::get_many`], keyed by the (unprefixed) requested keys.
    pub async fn get_dict(&self, keys: &[&str]) -> Result<HashMap<String, Option<Bytes>>> {
        let values = self.get_many(keys).await?;
        Ok(keys
            .iter()
            .map(|key| key.to_string())
            .zip(values)
            .collect())
    }

    /// Returns the (unprefixed) keys that could not be stored.
    pub async fn set_many<K, V, I>(&self, entries: I, timeout: Timeout) -> Result<Vec<String>>
    where
        K: AsRef<str>,
        V: Into<Bytes>,
        I: IntoIterator<Item = (K, V)>,
    {
        let entries: Vec<(String, Bytes)> = entries
            .into_iter()
            .map(|(key, value)| (self.key(key.as_ref()), value.into()))
            .collect();
        let failed = self.backend.set_many(entries, timeout).await?;
        Ok(failed
            .iter()
            .map(|key| {
                key.strip_prefix(self.config.key_prefix.as_str())
                    .unwrap_or(key.as_str())
                    .to_string()
            })
            .collect())
    }

    /// Deletes every key. With `ignore_errors` set, unreachable-backend
    /// failures are logged and the remaining keys are still processed.
    pub async fn delete_many(&self, keys: &[&str]) -> Result<bool> {
        let prefixed: Vec<String> = keys.iter().map(|key| self.key(key)).collect();
        if !self.config.ignore_errors {
            return self.backend.delete_many(&prefixed).await;
        }

        let mut all_deleted = true;
        for key in &prefixed {
            match self.backend.delete(key).await {
                Ok(deleted) => all_deleted &= deleted,
                Err(err) if self.suppressible(&err) => {
                    warn!(key = %key, error = %err, "Ignoring failed cache delete");
                    all_deleted = false;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(all_deleted)
    }

    pub async fn has(&self, key: &str) -> Result<bool> {
        self.backend.has(&self.key(key)).await
    }

    pub async fn inc(&self, key: &str, delta: i64) -> Result<i64> {
        self.backend.inc(&self.key(key), delta).await
    }

    pub async fn dec(&self, key: &str, delta: i64) -> Result<i64> {
        self.backend.dec(&self.key(key), delta).await
    }

    /// Removes everything the backend holds for this cache. High impact:
    /// every cached response and memoized result is lost.
    pub async fn clear(&self) -> Result<()> {
        warn!(backend = self.backend.name(), "Clearing cache");
        self.memo_index.lock().clear();
        self.backend.clear().await
    }

    // == Typed Values ==
    pub async fn get_value<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(bytes) => Ok(Some(C::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn set_value<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        timeout: Timeout,
    ) -> Result<()> {
        self.set(key, C::encode(value)?, timeout).await
    }

    // == Memoization ==
    /// Returns the stored result of `callable(args)`, computing and storing it
    /// with `f` on a miss.
    ///
    /// Concurrent misses for the same call may both run `f`; the last write
    /// wins.
    pub async fn memoize<T, F, Fut>(
        &self,
        callable: &CallableId,
        args: &MemoArgs,
        timeout: Timeout,
        f: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let options = MemoizeOptions::new().timeout(timeout);
        self.memoize_with(callable, args, &options, f).await
    }

    /// [`Cache::memoize`] with bypass, forced refresh and result filtering.
    pub async fn memoize_with<T, F, Fut>(
        &self,
        callable: &CallableId,
        args: &MemoArgs,
        options: &MemoizeOptions<T>,
        f: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let timeout = options.timeout.validate()?;
        if options.bypassed() {
            debug!(callable = %callable, "memoize bypassed");
            return Ok(f().await);
        }

        let key = memoize_key(callable, args);
        let none = C::encode(&None::<()>)?;

        if options.forced() {
            debug!(callable = %callable, key = %key, "memoize forced update");
        } else if let Some(bytes) = self.get(&key).await? {
            if !options.cache_none && bytes == none {
                debug!(callable = %callable, key = %key, "memoize ignoring stored none");
            } else {
                match C::decode(&bytes) {
                    Ok(value) => {
                        debug!(callable = %callable, key = %key, "memoize hit");
                        self.memo_index.lock().remember(callable, key);
                        return Ok(value);
                    }
                    Err(err) => {
                        warn!(callable = %callable, error = %err, "Discarding undecodable memoized value");
                    }
                }
            }
        } else {
            debug!(callable = %callable, key = %key, "memoize miss");
        }

        let value = f().await;
        let encoded = C::encode(&value)?;
        if !options.accepts(&value) || (!options.cache_none && encoded == none) {
            debug!(callable = %callable, key = %key, "memoize result not stored");
            return Ok(value);
        }

        self.set(&key, encoded, timeout).await?;
        self.memo_index.lock().remember(callable, key);
        Ok(value)
    }

    /// Forgets memoized results.
    ///
    /// With `args`, only the result of that exact call is removed. Without,
    /// every result observed for the callable is removed; for a callable
    /// bound to a receiver, only that receiver's results.
    pub async fn delete_memoized(&self, callable: &CallableId, args: Option<&MemoArgs>) -> Result<()> {
        let keys = self.take_memo_keys(callable, args);
        if keys.is_empty() {
            return Ok(());
        }

        debug!(callable = %callable, count = keys.len(), "deleting memoized results");
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        self.delete_many(&keys).await?;
        Ok(())
    }

    fn take_memo_keys(&self, callable: &CallableId, args: Option<&MemoArgs>) -> Vec<String> {
        let mut index = self.memo_index.lock();
        match args {
            Some(args) => {
                let key = memoize_key(callable, args);
                index.forget(callable.name(), &key);
                vec![key]
            }
            None => index.take(callable),
        }
    }
}
