//! Authentication for the vault
//!
//! - PINs are hashed with PBKDF2-SHA256 under a random 16-byte salt and
//!   compared in constant time
//! - Secrets are sealed with ChaCha20-Poly1305 under a key derived from the
//!   PIN with Argon2id and a separate salt
//! - The failed-attempt policy decides between counting, hard reset and
//!   decoy activation
//! - A [`Session`] holds the sealing key only while unlocked

mod pin;
mod policy;
mod sealed;
mod session;

pub use pin::{
    validate_pin, KdfParams, PinHasher, PinRecord, KEY_SALT_LEN, MAX_PIN_LENGTH, MIN_PIN_LENGTH,
    PBKDF2_ITERATIONS, PIN_SALT_LEN,
};
pub use policy::{FailedAttemptPolicy, PolicyAction};
pub use sealed::{open_secret, plaintext_secret, seal_account, seal_secret, unseal_account, VaultKey};
pub use session::Session;

use serde::{Deserialize, Serialize};

/// Access state of the vault as seen by one surface
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthState {
    /// No PIN; every operation is allowed
    NoPinConfigured,
    /// PIN required
    Locked,
    /// PIN verified, or unlock adopted from another surface
    Unlocked,
}

impl AuthState {
    /// Whether account operations are currently permitted
    pub fn allows_access(&self) -> bool {
        !matches!(self, AuthState::Locked)
    }
}
