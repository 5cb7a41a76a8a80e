//! Key-value storage behind the cache and the metrics history.
//!
//! Values are JSON text under namespaced string keys. The backend is chosen
//! once by [`open_store`]; callers never check whether storage exists.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::{MemoryStore, NullStore};

use crate::config::{StorageBackend, StorageConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Errors that can occur when writing to a store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize store contents: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// String-keyed storage with last-write-wins semantics per key.
pub trait KeyValueStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// All keys starting with `prefix`, in no particular order.
    fn keys_with_prefix(&self, prefix: &str) -> Vec<String>;

    /// Write buffered changes to durable storage. Stores without a
    /// backing medium have nothing to do.
    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// False for the disabled store, where every read misses.
    fn is_available(&self) -> bool {
        true
    }
}

/// Open the store described by `config`.
///
/// A file store that cannot be opened is logged and replaced by a
/// [`NullStore`], so the dashboard keeps working without a cache.
pub fn open_store(config: &StorageConfig) -> Arc<dyn KeyValueStore> {
    match config.backend {
        StorageBackend::File => match FileStore::open(&config.path) {
            Ok(store) => {
                tracing::info!(path = %config.path.display(), keys = store.len(), "Opened file store");
                Arc::new(store)
            }
            Err(e) => {
                tracing::error!(
                    path = %config.path.display(),
                    error = %e,
                    "Failed to open file store, caching disabled"
                );
                Arc::new(NullStore)
            }
        },
        StorageBackend::Memory => {
            tracing::debug!("Using in-memory store");
            Arc::new(MemoryStore::new())
        }
        StorageBackend::Disabled => {
            tracing::warn!("Storage disabled, cached stats and trends will not be kept");
            Arc::new(NullStore)
        }
    }
}

/// Flush `store` every `every` until cancelled, then once more.
///
/// Flushing does blocking file I/O, so it runs on the blocking pool and
/// never on a runtime worker.
pub fn spawn_flusher(
    store: Arc<dyn KeyValueStore>,
    every: Duration,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every.max(Duration::from_millis(100)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately and there is nothing to write yet.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    flush_blocking(&store).await;
                    tracing::debug!("Store flusher stopped");
                    break;
                }
                _ = interval.tick() => {
                    flush_blocking(&store).await;
                }
            }
        }
    })
}

async fn flush_blocking(store: &Arc<dyn KeyValueStore>) {
    let store = Arc::clone(store);
    match tokio::task::spawn_blocking(move || store.flush()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "Failed to flush store"),
        Err(e) => tracing::error!(error = %e, "Store flush task failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_flusher_writes_periodically_and_on_cancel() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&path).unwrap());

        let cancel = CancellationToken::new();
        let handle = spawn_flusher(Arc::clone(&store), Duration::from_millis(100), cancel.clone());

        store.set("a", "1".to_string()).unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert!(path.exists(), "periodic flush wrote the file");

        store.set("b", "2".to_string()).unwrap();
        cancel.cancel();
        handle.await.unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("b").as_deref(), Some("2"));
    }

    #[test]
    fn test_open_memory_store() {
        let config = StorageConfig {
            backend: StorageBackend::Memory,
            ..Default::default()
        };
        let store = open_store(&config);
        assert!(store.is_available());
        store.set("k", "1".to_string()).unwrap();
        assert_eq!(store.get("k").as_deref(), Some("1"));
    }

    #[test]
    fn test_open_disabled_store() {
        let config = StorageConfig {
            backend: StorageBackend::Disabled,
            ..Default::default()
        };
        let store = open_store(&config);
        assert!(!store.is_available());
        store.set("k", "1".to_string()).unwrap();
        assert!(store.get("k").is_none());
    }

    #[test]
    fn test_unopenable_file_store_falls_back_to_null() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be cannot be opened as a store.
        let path = dir.path().join("store.json");
        std::fs::create_dir(&path).unwrap();

        let config = StorageConfig {
            backend: StorageBackend::File,
            path,
            ..Default::default()
        };
        let store = open_store(&config);
        assert!(!store.is_available());
    }
}
