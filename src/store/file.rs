use super::{KeyValueStore, StoreError};
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// JSON-file backed store.
///
/// Entries live in memory. Changes only mark the store dirty; [`flush`]
/// rewrites the whole file (temp file + rename), so a crash leaves either
/// the old or the new file. A running server flushes from one background
/// task (see [`super::spawn_flusher`]) and the store flushes once more when
/// dropped.
///
/// [`flush`]: KeyValueStore::flush
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: DashMap<String, String>,
    dirty: AtomicBool,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open (or create) the store at `path`.
    ///
    /// An unparseable file is moved aside to `<path>.corrupt` and the store
    /// starts empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| StoreError::Io {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut entries = DashMap::new();
        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(io_err)?;
            match serde_json::from_str::<HashMap<String, String>>(&content) {
                Ok(map) => entries.extend(map),
                Err(e) => {
                    let aside = corrupt_path(&path);
                    tracing::warn!(
                        path = %path.display(),
                        moved_to = %aside.display(),
                        error = %e,
                        "Store file is corrupt, starting empty"
                    );
                    std::fs::rename(&path, &aside).map_err(io_err)?;
                }
            }
        }

        Ok(Self {
            path,
            entries,
            dirty: AtomicBool::new(false),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when changes are waiting for the next flush.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    fn persist(&self) -> Result<(), StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Cleared before the snapshot so a concurrent change re-marks it.
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        let snapshot: BTreeMap<String, String> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        let result = write_atomically(&self.path, &snapshot);
        if result.is_err() {
            self.dirty.store(true, Ordering::Release);
        }
        result
    }
}

fn write_atomically(path: &Path, snapshot: &BTreeMap<String, String>) -> Result<(), StoreError> {
    let json = serde_json::to_string(snapshot)?;
    let tmp = path.with_extension("tmp");
    let io_err = |source| StoreError::Io {
        path: tmp.display().to_string(),
        source,
    };
    std::fs::write(&tmp, json).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".corrupt");
    PathBuf::from(name)
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        self.dirty.store(true, Ordering::Release);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        if self.entries.remove(key).is_some() {
            self.dirty.store(true, Ordering::Release);
        }
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect()
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.persist()
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        if let Err(e) = self.persist() {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to flush store on close");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("store.json");

        {
            let store = FileStore::open(&path).unwrap();
            store.set("homeboard_cache_tv_sonarr", "{}".into()).unwrap();
            store.set("other", "x".into()).unwrap();
            store.remove("other").unwrap();
            store.flush().unwrap();
        }

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(
            reopened.get("homeboard_cache_tv_sonarr").as_deref(),
            Some("{}")
        );
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_changes_are_written_on_flush_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let store = FileStore::open(&path).unwrap();

        for i in 0..50 {
            store.set(&format!("k{}", i), i.to_string()).unwrap();
        }
        assert!(store.is_dirty());
        assert!(!path.exists(), "no write before flush");

        store.flush().unwrap();
        assert!(!store.is_dirty());
        let written = std::fs::metadata(&path).unwrap().modified().unwrap();

        store.flush().unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), written);
        assert_eq!(FileStore::open(&path).unwrap().len(), 50);
    }

    #[test]
    fn test_drop_flushes_pending_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        {
            let store = FileStore::open(&path).unwrap();
            store.set("k", "v".into()).unwrap();
        }
        assert_eq!(FileStore::open(&path).unwrap().get("k").as_deref(), Some("v"));
    }

    #[test]
    fn test_corrupt_file_is_moved_aside() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = FileStore::open(&path).unwrap();
        assert!(store.is_empty());
        assert!(dir.path().join("store.json.corrupt").exists());

        store.set("k", "v".into()).unwrap();
        store.flush().unwrap();
        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("k").as_deref(), Some("v"));
    }

    #[test]
    fn test_removing_missing_key_does_not_create_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let store = FileStore::open(&path).unwrap();
        store.remove("absent").unwrap();
        store.flush().unwrap();
        assert!(!path.exists());
        assert_eq!(store.path(), path.as_path());
    }
}
