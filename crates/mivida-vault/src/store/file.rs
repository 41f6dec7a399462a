//! JSON file store
//!
//! All keys live in one pretty-printed JSON object. Every mutation rewrites
//! the file atomically (temp file + rename) with owner-only permissions.
//! Change notifications reach subscribers of this handle only; other
//! processes see new values on their next read.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::fs;
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

use super::{Store, StoreChange, CHANGE_CHANNEL_CAPACITY};
use crate::error::{Result, VaultError};

pub struct FileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
    changes: broadcast::Sender<StoreChange>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            changes,
        }
    }

    /// Default location under the user's data directory
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mivida")
            .join("store.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Map<String, Value>> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str(&contents) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(VaultError::StorageFailure(format!(
                "{} does not contain a JSON object",
                self.path.display()
            ))),
            Err(e) => Err(VaultError::StorageFailure(format!(
                "Failed to parse {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn write_all(&self, entries: &Map<String, Value>) -> Result<()> {
        let contents = serde_json::to_string_pretty(entries)?;

        // Ensure directory exists
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write atomically
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, contents.as_bytes()).await?;

        // Set restrictive permissions (Unix only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        fs::rename(&temp_path, &self.path).await?;
        debug!("Wrote {} keys to {}", entries.len(), self.path.display());
        Ok(())
    }

    fn notify(&self, change: StoreChange) {
        let _ = self.changes.send(change);
    }
}

#[async_trait]
impl Store for FileStore {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>> {
        let mut all = self.read_all().await?;
        Ok(keys
            .iter()
            .filter_map(|k| all.remove(*k).map(|v| (k.to_string(), v)))
            .collect())
    }

    async fn set(&self, entries: Map<String, Value>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let change = StoreChange::new(entries.keys().cloned());
        {
            let _guard = self.write_lock.lock().await;
            let mut all = self.read_all().await?;
            all.extend(entries);
            self.write_all(&all).await?;
        }
        self.notify(change);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        {
            let _guard = self.write_lock.lock().await;
            let mut all = self.read_all().await?;
            let before = all.len();
            for key in keys {
                all.remove(*key);
            }
            if all.len() != before {
                self.write_all(&all).await?;
            }
        }
        self.notify(StoreChange::new(keys.iter().copied()));
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let removed: Vec<String> = {
            let _guard = self.write_lock.lock().await;
            let all = self.read_all().await?;
            self.write_all(&Map::new()).await?;
            all.keys().cloned().collect()
        };
        self.notify(StoreChange::new(removed));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn entries(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("store.json"));
        assert!(store.get(&["accounts"]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = FileStore::new(&path);
        store
            .set(entries(json!({"autoLockTime": 900, "accounts": [{"id": "a"}]})))
            .await
            .unwrap();
        drop(store);

        let reopened = FileStore::new(&path);
        let got = reopened.get(&["autoLockTime", "accounts"]).await.unwrap();
        assert_eq!(got["autoLockTime"], 900);
        assert_eq!(got["accounts"][0]["id"], "a");
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("store.json"));
        store.set(entries(json!({"a": 1, "b": 2}))).await.unwrap();

        store.remove(&["a"]).await.unwrap();
        let got = store.get(&["a", "b"]).await.unwrap();
        assert!(!got.contains_key("a"));
        assert_eq!(got["b"], 2);

        let mut changes = store.subscribe();
        store.clear().await.unwrap();
        assert!(store.get(&["b"]).await.unwrap().is_empty());
        assert!(changes.recv().await.unwrap().touches("b"));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_storage_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(
            store.get(&["accounts"]).await,
            Err(VaultError::StorageFailure(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = FileStore::new(&path);
        store.set(entries(json!({"pinHash": "00"}))).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
