//! A backend that stores nothing. Useful to disable caching without
//! touching the interceptor or memoized call sites.

use async_trait::async_trait;
use bytes::Bytes;

use super::{validate_key, Backend, Timeout};
use crate::error::Result;

#[derive(Debug, Default, Clone, Copy)]
pub struct NullBackend;

impl NullBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Backend for NullBackend {
    fn name(&self) -> &str {
        "null"
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        validate_key(key)?;
        Ok(None)
    }

    async fn set(&self, key: &str, _value: Bytes, timeout: Timeout) -> Result<()> {
        validate_key(key)?;
        timeout.validate()?;
        Ok(())
    }

    async fn add(&self, key: &str, _value: Bytes, timeout: Timeout) -> Result<bool> {
        validate_key(key)?;
        timeout.validate()?;
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(false)
    }

    async fn has(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(false)
    }

    async fn clear(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_backend_never_returns_values() {
        let backend = NullBackend::new();

        backend
            .set("k", Bytes::from_static(b"v"), Timeout::Default)
            .await
            .unwrap();

        assert_eq!(backend.get("k").await.unwrap(), None);
        assert!(!backend.has("k").await.unwrap());
        assert!(backend.add("k", Bytes::new(), Timeout::Default).await.unwrap());
    }

    #[tokio::test]
    async fn test_null_backend_still_validates_input() {
        let backend = NullBackend::new();
        assert!(backend.get("").await.is_err());
        assert!(backend
            .set("k", Bytes::new(), Timeout::Seconds(-3))
            .await
            .is_err());
    }
}
