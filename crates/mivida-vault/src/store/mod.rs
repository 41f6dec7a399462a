//! Credential store
//!
//! A flat key/value store of JSON values shared by every surface of the
//! authenticator (popup, page overlay, settings, CLI). There are no
//! multi-key transactions: concurrent writers resolve by last writer wins,
//! but a single [`Store::set`] call applies all of its entries at once.
//!
//! Every mutation is announced to subscribers as a [`StoreChange`], which is
//! how a surface learns that another one unlocked, locked or reset the vault.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::error::Result;

/// Capacity of the change notification channel
pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Well-known store keys
pub mod keys {
    pub const ACCOUNTS: &str = "accounts";
    pub const PIN_HASH: &str = "pinHash";
    pub const PIN_SALT: &str = "pinSalt";
    pub const KEY_SALT: &str = "keySalt";
    pub const PIN_CONFIGURED: &str = "pinConfigured";
    pub const FAILED_ATTEMPTS: &str = "failedAttempts";
    pub const AUTO_LOCK_TIME: &str = "autoLockTime";
    pub const LAST_UNLOCK_TIME: &str = "lastUnlockTime";
    pub const DECOY_MODE_ACTIVATED: &str = "decoyModeActivated";
}

/// Keys written, removed or cleared by one store operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub keys: Vec<String>,
}

impl StoreChange {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `key` was part of this change
    pub fn touches(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    /// Whether any of `keys` was part of this change
    pub fn touches_any(&self, keys: &[&str]) -> bool {
        keys.iter().any(|k| self.touches(k))
    }
}

/// Persistent key/value storage
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch the requested keys; absent keys are simply missing from the map
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>>;

    /// Write every entry in one step
    async fn set(&self, entries: Map<String, Value>) -> Result<()>;

    /// Delete keys; deleting an absent key is not an error
    async fn remove(&self, keys: &[&str]) -> Result<()>;

    /// Delete every key
    async fn clear(&self) -> Result<()>;

    /// Receive a notification after each mutation
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}
