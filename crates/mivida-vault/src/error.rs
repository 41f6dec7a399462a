//! Error types for the vault

use thiserror::Error;

pub type Result<T> = std::result::Result<T, VaultError>;

#[derive(Error, Debug)]
pub enum VaultError {
    /// PIN is not 4 to 6 ASCII digits
    #[error("PIN must be {min}-{max} digits")]
    InvalidPinFormat { min: usize, max: usize },

    #[error("PINs do not match")]
    PinMismatch,

    #[error("No PIN is configured")]
    NotConfigured,

    #[error("A PIN is already configured")]
    AlreadyConfigured,

    #[error("Incorrect PIN")]
    IncorrectPin,

    /// Operation needs an unlocked session
    #[error("Vault is locked")]
    Locked,

    /// Session is unlocked but this surface never derived the sealing key
    #[error("Secret is sealed and this session holds no key - unlock with the PIN")]
    KeyUnavailable,

    #[error("Decryption failed - wrong key or corrupted data")]
    DecryptionFailed,

    #[error("Reset on failed attempts and decoy mode cannot both be enabled")]
    ConflictingPolicy,

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Invalid secret: {0}")]
    InvalidSecret(String),

    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    #[error("Invalid backup format: {0}")]
    InvalidBackupFormat(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Crypto error: {0}")]
    Crypto(String),
}

impl From<mivida_core::Error> for VaultError {
    fn from(e: mivida_core::Error) -> Self {
        match e {
            mivida_core::Error::InvalidSecret(msg) => VaultError::InvalidSecret(msg),
            mivida_core::Error::InvalidAccount(msg) => VaultError::InvalidAccount(msg),
            mivida_core::Error::InvalidBackupFormat(msg) => VaultError::InvalidBackupFormat(msg),
            mivida_core::Error::InvalidConfig(msg) => VaultError::InvalidConfig(msg),
        }
    }
}

impl From<std::io::Error> for VaultError {
    fn from(e: std::io::Error) -> Self {
        VaultError::StorageFailure(e.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        VaultError::StorageFailure(format!("Serialization failed: {}", e))
    }
}

impl From<tokio::task::JoinError> for VaultError {
    fn from(e: tokio::task::JoinError) -> Self {
        VaultError::Crypto(format!("Key derivation task failed: {}", e))
    }
}
