//! Per-surface session state
//!
//! A session is either locked or unlocked. An unlocked session holds the
//! sealing key when this surface verified the PIN itself; sessions adopted
//! from another surface, or opened by decoy activation, hold none.

use super::sealed::VaultKey;

#[derive(Debug, Default)]
pub struct Session {
    unlocked: bool,
    key: Option<VaultKey>,
    /// Stored PIN hash the key was derived under
    pin_hash: Option<String>,
}

impl Session {
    /// A locked session
    pub fn new() -> Self {
        Self::default()
    }

    /// Unlock, replacing any previous key
    pub fn unlock(&mut self, key: Option<VaultKey>, pin_hash: Option<String>) {
        self.unlocked = true;
        self.key = key;
        self.pin_hash = pin_hash;
    }

    /// Lock and drop the key
    pub fn lock(&mut self) {
        self.unlocked = false;
        // VaultKey zeroizes on drop
        self.key = None;
        self.pin_hash = None;
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    pub fn key(&self) -> Option<&VaultKey> {
        self.key.as_ref()
    }

    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    /// Whether the held key still matches the stored PIN hash
    ///
    /// A session without a key is never stale.
    pub fn key_matches(&self, pin_hash: Option<&str>) -> bool {
        self.key.is_none() || self.pin_hash.as_deref() == pin_hash
    }
}
