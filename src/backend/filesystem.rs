//! File System Backend Module
//!
//! Stores one file per key. The file name is the SHA-256 hex digest of the
//! key; the content is an 8-byte big-endian expiry timestamp in Unix
//! milliseconds (0 = never) followed by the raw value.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, warn};

use super::{current_timestamp_ms, expiry_after, validate_key, Backend, Timeout};
use crate::error::{CacheError, Result};

const HEADER_LEN: usize = 8;
const CACHE_FILE_NAME_LEN: usize = 64;

/// Directory-backed store shared by every process pointed at the same path.
///
/// Once the directory holds `threshold` cache files, a write first removes
/// expired files and then every third remaining file. The bound is
/// approximate when several processes write concurrently.
#[derive(Debug)]
pub struct FileSystemBackend {
    dir: PathBuf,
    threshold: usize,
    default_ttl: u64,
    tmp_counter: AtomicU64,
}

impl FileSystemBackend {
    // == Constructor ==
    /// Opens (and creates if needed) the cache directory.
    pub fn new(dir: impl Into<PathBuf>, threshold: usize, default_ttl: u64) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|err| {
            CacheError::Configuration(format!(
                "cannot create cache directory {}: {}",
                dir.display(),
                err
            ))
        })?;

        Ok(Self {
            dir,
            threshold,
            default_ttl,
            tmp_counter: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(hex::encode(Sha256::digest(key.as_bytes())))
    }

    fn is_cache_file(name: &str) -> bool {
        name.len() == CACHE_FILE_NAME_LEN && name.bytes().all(|b| b.is_ascii_hexdigit())
    }

    fn expires_at(&self, timeout: Timeout) -> Result<u64> {
        Ok(match timeout.resolve(self.default_ttl)? {
            Some(ttl) => expiry_after(current_timestamp_ms(), ttl),
            None => 0,
        })
    }

    /// Reads a live entry. Expired files are removed on sight.
    async fn read_live(&self, path: &Path) -> Result<Option<Bytes>> {
        let raw = match fs::read(path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        if raw.len() < HEADER_LEN {
            warn!(path = %path.display(), "discarding truncated cache file");
            remove_quietly(path).await?;
            return Ok(None);
        }

        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&raw[..HEADER_LEN]);
        let expires_at = u64::from_be_bytes(header);
        if expires_at != 0 && current_timestamp_ms() >= expires_at {
            remove_quietly(path).await?;
            return Ok(None);
        }

        let mut raw = Bytes::from(raw);
        Ok(Some(raw.split_off(HEADER_LEN)))
    }

    /// Writes through a temporary file and a rename so readers never see a
    /// partially written entry.
    async fn write_file(&self, path: &Path, expires_at: u64, value: &[u8]) -> Result<()> {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + value.len());
        buf.put_u64(expires_at);
        buf.put_slice(value);

        let tmp = self.dir.join(format!(
            ".tmp-{}-{}",
            std::process::id(),
            self.tmp_counter.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp, &buf).await?;
        if let Err(err) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        Ok(())
    }

    async fn cache_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut dir = fs::read_dir(&self.dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            if entry.file_name().to_str().is_some_and(Self::is_cache_file) {
                files.push(entry.path());
            }
        }
        Ok(files)
    }

    async fn prune(&self) -> Result<()> {
        if self.threshold == 0 {
            return Ok(());
        }
        let files = self.cache_files().await?;
        if files.len() < self.threshold {
            return Ok(());
        }

        let mut removed = 0usize;
        for (idx, path) in files.iter().enumerate() {
            let expired = self.read_live(path).await?.is_none();
            if expired {
                removed += 1;
            } else if idx % 3 == 0 {
                remove_quietly(path).await?;
                removed += 1;
            }
        }
        debug!(removed, dir = %self.dir.display(), "pruned cache directory");
        Ok(())
    }
}

async fn remove_quietly(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

#[async_trait]
impl Backend for FileSystemBackend {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        validate_key(key)?;
        self.read_live(&self.path_for(key)).await
    }

    async fn set(&self, key: &str, value: Bytes, timeout: Timeout) -> Result<()> {
        validate_key(key)?;
        let expires_at = self.expires_at(timeout)?;
        self.prune().await?;
        self.write_file(&self.path_for(key), expires_at, &value).await
    }

    async fn add(&self, key: &str, value: Bytes, timeout: Timeout) -> Result<bool> {
        validate_key(key)?;
        let expires_at = self.expires_at(timeout)?;
        let path = self.path_for(key);
        if self.read_live(&path).await?.is_some() {
            return Ok(false);
        }
        self.prune().await?;
        self.write_file(&path, expires_at, &value).await?;
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        remove_quietly(&self.path_for(key)).await
    }

    async fn has(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.read_live(&self.path_for(key)).await?.is_some())
    }

    /// Removes cache files only; unrelated files in the directory are kept.
    async fn clear(&self) -> Result<()> {
        for path in self.cache_files().await? {
            remove_quietly(&path).await?;
        }
        Ok(())
    }
}
