//! Error types for the Mivida core library

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Secret is empty or contains characters outside the base32 alphabet
    #[error("Invalid secret: {0}")]
    InvalidSecret(String),

    /// Account record is missing a required field or has a malformed one
    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    /// Backup file failed validation; nothing was applied
    #[error("Invalid backup format: {0}")]
    InvalidBackupFormat(String),

    /// Configuration value out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::InvalidBackupFormat(e.to_string())
    }
}
