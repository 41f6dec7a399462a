//! Mivida Vault - PIN-gated account storage
//!
//! The vault owns everything stateful about the authenticator:
//!
//! - [`store`]: the key/value credential store shared by every surface
//! - [`auth`]: PIN hashing, the failed-attempt policy, sessions and the
//!   sealing of secrets at rest
//! - [`Vault`]: the session state machine that gates every account read and
//!   write behind the PIN
//! - [`BackgroundTasks`]: the code refresh tick, the periodic session check
//!   and cross-surface resynchronization
//!
//! # Security Model
//!
//! - The PIN is hashed with PBKDF2-SHA256 and compared in constant time
//! - Secrets are sealed with ChaCha20-Poly1305 under an Argon2id key derived
//!   from the PIN; the key lives only in memory while unlocked
//! - Failed attempts persist across restarts and can trigger a hard reset
//!   or decoy activation

pub mod auth;
pub mod autolock;
pub mod decoy;
pub mod error;
pub mod store;
pub mod tasks;

mod accounts;
mod backup;
mod vault;

pub use accounts::{AccountCode, CodeError};
pub use auth::{AuthState, KdfParams, VaultKey};
pub use autolock::AutoLockTimer;
pub use decoy::DecoyGenerator;
pub use error::{Result, VaultError};
pub use store::{FileStore, MemoryStore, Store, StoreChange};
pub use tasks::{BackgroundTasks, CodeSnapshot};
pub use vault::{Vault, VaultOptions, VaultStatus};
