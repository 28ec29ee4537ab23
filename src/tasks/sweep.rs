//! Expiry Sweep Task
//!
//! Expired entries are already dropped lazily on access. The sweep reclaims
//! memory held by entries nobody asks for again.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::backend::SimpleBackend;

/// Spawns a task removing expired entries from `store` every `interval_secs`.
///
/// Returns the task handle; abort it during graceful shutdown.
///
/// # Example
/// ```ignore
/// let store = Arc::new(SimpleBackend::new(500, 300));
/// let sweep = spawn_sweep_task(store.clone(), 60);
/// // Later, during shutdown:
/// sweep.abort();
/// ```
pub fn spawn_sweep_task(store: Arc<SimpleBackend>, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs);

    tokio::spawn(async move {
        info!("Starting expiry sweep with interval of {} seconds", interval_secs);

        loop {
            tokio::time::sleep(interval).await;

            let removed = store.cleanup_expired();
            if removed > 0 {
                info!("Expiry sweep: removed {} expired entries", removed);
            } else {
                debug!("Expiry sweep: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    use crate::backend::{Backend, Timeout};

    #[tokio::test]
    async fn test_sweep_removes_expired_entries() {
        let store = Arc::new(SimpleBackend::new(100, 300));
        store.set_with_ttl("expire_soon", Bytes::from("value"), Duration::from_millis(200));

        let handle = spawn_sweep_task(store.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        // Sweep ran without anyone reading the key.
        assert_eq!(store.len(), 0);
        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_preserves_live_entries() {
        let store = Arc::new(SimpleBackend::new(100, 300));
        store
            .set("long_lived", Bytes::from("value"), Timeout::Seconds(3600))
            .await
            .unwrap();

        let handle = spawn_sweep_task(store.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(
            store.get("long_lived").await.unwrap(),
            Some(Bytes::from("value"))
        );
        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_can_be_aborted() {
        let handle = spawn_sweep_task(Arc::new(SimpleBackend::default()), 1);
        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished());
    }
}
