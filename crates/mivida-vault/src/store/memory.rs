//! In-memory store
//!
//! Backs tests and embedders that keep state elsewhere. Cloning the handle
//! shares the same entries, so two vaults built over clones behave like two
//! surfaces over one browser profile.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, RwLock};

use super::{Store, StoreChange, CHANGE_CHANNEL_CAPACITY};
use crate::error::Result;

#[derive(Clone)]
pub struct MemoryStore {
    entries: Arc<RwLock<Map<String, Value>>>,
    changes: broadcast::Sender<StoreChange>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            entries: Arc::new(RwLock::new(Map::new())),
            changes,
        }
    }

    /// Copy of everything currently stored
    pub async fn snapshot(&self) -> Map<String, Value> {
        self.entries.read().await.clone()
    }

    fn notify(&self, change: StoreChange) {
        // No subscribers is fine
        let _ = self.changes.send(change);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>> {
        let entries = self.entries.read().await;
        Ok(keys
            .iter()
            .filter_map(|k| entries.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, entries: Map<String, Value>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let change = StoreChange::new(entries.keys().cloned());
        self.entries.write().await.extend(entries);
        self.notify(change);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        {
            let mut entries = self.entries.write().await;
            for key in keys {
                entries.remove(*key);
            }
        }
        self.notify(StoreChange::new(keys.iter().copied()));
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let removed: Vec<String> = {
            let mut entries = self.entries.write().await;
            let keys = entries.keys().cloned().collect();
            entries.clear();
            keys
        };
        self.notify(StoreChange::new(removed));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
