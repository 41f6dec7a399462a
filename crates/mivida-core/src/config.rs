//! Security configuration record
//!
//! The configuration is stored as individual top-level keys next to the
//! account list. [`SecurityConfig::KEYS`] names them so a store can fetch
//! the whole record in one read.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::DEFAULT_MAX_FAILED_ATTEMPTS;

/// Session state after a decoy activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoyBehavior {
    /// Stay on the lock screen with decoys behind it
    #[default]
    Locked,
    /// Open straight onto the decoy list
    Unlocked,
}

impl<'de> Deserialize<'de> for DecoyBehavior {
    /// Only `"unlocked"` opens onto the decoys; any other value stays locked
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match lenient_text(deserializer)?.as_deref() {
            Some("unlocked") => DecoyBehavior::Unlocked,
            _ => DecoyBehavior::Locked,
        })
    }
}

/// UI language preference, stored by the settings surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Es,
    En,
}

/// Unknown languages read as unset; the settings surface owns this key
fn deserialize_language<'de, D>(deserializer: D) -> std::result::Result<Option<Language>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match lenient_text(deserializer)?.as_deref() {
        Some("es") => Some(Language::Es),
        Some("en") => Some(Language::En),
        _ => None,
    })
}

/// The value as a string, or `None` for any other JSON type
fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Other(serde::de::IgnoredAny),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => Some(text),
        Raw::Other(_) => None,
    })
}

/// What happens once failed attempts reach the maximum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Attempts are only counted
    Disabled,
    /// Wipe every stored key
    HardReset,
    /// Replace accounts with decoys
    Decoy(DecoyBehavior),
}

fn default_max_failed_attempts() -> u32 {
    DEFAULT_MAX_FAILED_ATTEMPTS
}

/// Persisted PIN, policy and session settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityConfig {
    /// Hex PBKDF2-SHA256 hash of the PIN
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin_hash: Option<String>,
    /// Hex salt for `pin_hash`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin_salt: Option<String>,
    /// Hex salt for the secret-sealing key (separate from the hash salt)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_salt: Option<String>,
    #[serde(default)]
    pub pin_configured: bool,
    #[serde(default)]
    pub failed_attempts: u32,
    #[serde(default = "default_max_failed_attempts")]
    pub max_failed_attempts: u32,
    #[serde(default)]
    pub reset_on_failed_attempts: bool,
    #[serde(default)]
    pub decoy_mode_enabled: bool,
    #[serde(default)]
    pub decoy_behavior: DecoyBehavior,
    #[serde(default)]
    pub decoy_mode_activated: bool,
    /// Auto-lock timeout in seconds, 0 disables it
    #[serde(default)]
    pub auto_lock_time: u64,
    /// Unix milliseconds of the last unlock or account activity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_unlock_time: Option<i64>,
    /// Read-only here; owned by the settings surface
    #[serde(default, skip_serializing, deserialize_with = "deserialize_language")]
    pub language: Option<Language>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            pin_hash: None,
            pin_salt: None,
            key_salt: None,
            pin_configured: false,
            failed_attempts: 0,
            max_failed_attempts: DEFAULT_MAX_FAILED_ATTEMPTS,
            reset_on_failed_attempts: false,
            decoy_mode_enabled: false,
            decoy_behavior: DecoyBehavior::Locked,
            decoy_mode_activated: false,
            auto_lock_time: 0,
            last_unlock_time: None,
            language: None,
        }
    }
}

impl SecurityConfig {
    /// Every store key that makes up the record
    pub const KEYS: &'static [&'static str] = &[
        "pinHash",
        "pinSalt",
        "keySalt",
        "pinConfigured",
        "failedAttempts",
        "maxFailedAttempts",
        "resetOnFailedAttempts",
        "decoyModeEnabled",
        "decoyBehavior",
        "decoyModeActivated",
        "autoLockTime",
        "lastUnlockTime",
        "language",
    ];

    /// Keys that are removed rather than written when their value is absent
    pub const OPTIONAL_KEYS: &'static [&'static str] =
        &["pinHash", "pinSalt", "keySalt", "lastUnlockTime"];

    /// A PIN gates access only when the flag and both hash fields are present
    pub fn is_pin_configured(&self) -> bool {
        self.pin_configured && self.pin_hash.is_some() && self.pin_salt.is_some()
    }

    /// The active failure policy; decoy mode wins if both flags are set
    pub fn failure_policy(&self) -> FailurePolicy {
        if self.decoy_mode_enabled {
            FailurePolicy::Decoy(self.decoy_behavior)
        } else if self.reset_on_failed_attempts {
            FailurePolicy::HardReset
        } else {
            FailurePolicy::Disabled
        }
    }

    /// Clear `reset_on_failed_attempts` when both policies are enabled
    ///
    /// Returns true if the record was changed.
    pub fn normalize(&mut self) -> bool {
        let mut changed = false;
        if self.decoy_mode_enabled && self.reset_on_failed_attempts {
            self.reset_on_failed_attempts = false;
            changed = true;
        }
        if self.max_failed_attempts == 0 {
            self.max_failed_attempts = DEFAULT_MAX_FAILED_ATTEMPTS;
            changed = true;
        }
        changed
    }

    /// Failed attempts left before the policy fires, if a policy is active
    pub fn attempts_remaining(&self) -> Option<u32> {
        match self.failure_policy() {
            FailurePolicy::Disabled => None,
            _ => Some(self.max_failed_attempts.saturating_sub(self.failed_attempts)),
        }
    }

    fn auto_lock_ms(&self) -> i64 {
        i64::try_from(self.auto_lock_time)
            .unwrap_or(i64::MAX / 1000)
            .saturating_mul(1000)
    }

    /// An unlock recorded by any surface that is still within the timeout
    pub fn is_session_fresh(&self, now_ms: i64) -> bool {
        match self.last_unlock_time {
            None => false,
            Some(_) if self.auto_lock_time == 0 => true,
            Some(last) => now_ms.saturating_sub(last) < self.auto_lock_ms(),
        }
    }

    /// Auto-lock is on and the last recorded unlock has run out
    ///
    /// A missing unlock time counts as expired.
    pub fn is_session_expired(&self, now_ms: i64) -> bool {
        if self.auto_lock_time == 0 {
            return false;
        }
        match self.last_unlock_time {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.auto_lock_ms(),
        }
    }

    /// Milliseconds left before auto-lock, `None` when auto-lock is off
    pub fn remaining_session_ms(&self, now_ms: i64) -> Option<u64> {
        if self.auto_lock_time == 0 {
            return None;
        }
        let last = self.last_unlock_time.unwrap_or(now_ms);
        Some(last.saturating_add(self.auto_lock_ms()).saturating_sub(now_ms).max(0) as u64)
    }

    /// Validate a new maximum attempt count
    pub fn check_max_failed_attempts(max: u32) -> Result<u32> {
        if max == 0 {
            return Err(Error::InvalidConfig(
                "maximum failed attempts must be at least 1".to_string(),
            ));
        }
        Ok(max)
    }
}
