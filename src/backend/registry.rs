//! Backend Registry
//!
//! Maps backend identifiers (the `CACHE_TYPE` setting) to constructors.

use std::collections::HashMap;
use std::sync::Arc;

use super::{Backend, FileSystemBackend, NullBackend, SimpleBackend};
use crate::config::Config;
use crate::error::{CacheError, Result};

/// Builds a backend from the cache configuration. Backend-specific
/// connection parameters are read from [`Config::options`].
pub type BackendConstructor = fn(&Config) -> Result<Arc<dyn Backend>>;

/// Fixed table of known backends, populated at startup.
#[derive(Clone)]
pub struct BackendRegistry {
    constructors: HashMap<String, BackendConstructor>,
}

impl BackendRegistry {
    /// Creates a registry holding the built-in backends:
    /// `null`, `simple` and `filesystem`.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("null", null);
        registry.register("simple", simple);
        registry.register("filesystem", filesystem);
        registry
    }

    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Adds or replaces the constructor for `name`.
    pub fn register(&mut self, name: impl Into<String>, constructor: BackendConstructor) {
        self.constructors.insert(name.into(), constructor);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered identifiers, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Constructs the backend named by `config.backend`.
    pub fn build(&self, config: &Config) -> Result<Arc<dyn Backend>> {
        let constructor = self.constructors.get(&config.backend).ok_or_else(|| {
            CacheError::Configuration(format!(
                "'{}' is not a known cache backend (known: {})",
                config.backend,
                self.names().join(", ")
            ))
        })?;
        constructor(config)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn null(_config: &Config) -> Result<Arc<dyn Backend>> {
    Ok(Arc::new(NullBackend::new()))
}

fn simple(config: &Config) -> Result<Arc<dyn Backend>> {
    Ok(Arc::new(SimpleBackend::new(
        config.threshold,
        config.default_timeout,
    )))
}

fn filesystem(config: &Config) -> Result<Arc<dyn Backend>> {
    let dir = config.cache_dir.as_ref().ok_or_else(|| {
        CacheError::Configuration("the filesystem backend requires CACHE_DIR".to_string())
    })?;
    Ok(Arc::new(FileSystemBackend::new(
        dir,
        config.threshold,
        config.default_timeout,
    )?))
}
