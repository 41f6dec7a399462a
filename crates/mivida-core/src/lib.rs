//! Mivida Core - Account model, TOTP engine and page matching
//!
//! This crate holds the synchronous, storage-agnostic half of the Mivida
//! authenticator: RFC 6238 code generation, the persisted account and
//! security-configuration records, the page matcher that decides which
//! accounts to offer on a web page, the decoy catalog and the backup file
//! format. Everything that touches storage, PINs or sessions lives in
//! `mivida-vault`.

pub mod account;
pub mod backup;
pub mod clock;
pub mod config;
pub mod decoy;
pub mod error;
pub mod matcher;
pub mod totp;

pub use account::{Account, AccountDraft, AccountUpdate, FloatingWindowDelay};
pub use backup::{BackupFile, BackupSettings, BACKUP_VERSION};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DecoyBehavior, FailurePolicy, Language, SecurityConfig};
pub use decoy::{synthesize_decoys, DecoyTemplate, DECOY_CATALOG};
pub use error::{Error, Result};
pub use matcher::{match_accounts, matches_page, should_show};
pub use totp::{
    decode_base32, format_code, generate, normalize_secret, time_remaining, validate_secret,
};

/// Seconds per TOTP time step
pub const PERIOD_SECS: u64 = 30;

/// Number of digits in a generated code
pub const CODE_DIGITS: u32 = 6;

/// Auto-lock timeout applied when a PIN is first configured (15 minutes)
pub const DEFAULT_AUTO_LOCK_SECS: u64 = 900;

/// Failed PIN attempts tolerated before the failure policy fires
pub const DEFAULT_MAX_FAILED_ATTEMPTS: u32 = 5;

/// Number of decoy accounts synthesized on activation
pub const DEFAULT_DECOY_COUNT: usize = 30;
