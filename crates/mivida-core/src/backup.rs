//! Backup file format
//!
//! ```json
//! {
//!   "version": "1.0.0",
//!   "exportDate": "2024-03-01T12:00:00.000Z",
//!   "accounts": [ ... ],
//!   "settings": { "autoLockTime": 900 }
//! }
//! ```
//!
//! Backups always carry plaintext base32 secrets. Parsing validates the
//! whole file before anything is returned, so a rejected import never
//! leaves partial state behind.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::account::Account;
use crate::error::{Error, Result};
use crate::DEFAULT_AUTO_LOCK_SECS;

/// Format version written by this library
pub const BACKUP_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSettings {
    #[serde(default)]
    pub auto_lock_time: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupFile {
    pub version: String,
    #[serde(default)]
    pub export_date: String,
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub settings: BackupSettings,
}

impl BackupFile {
    /// Build a backup from plaintext accounts
    pub fn new(accounts: Vec<Account>, auto_lock_time: u64, export_date: DateTime<Utc>) -> Self {
        Self {
            version: BACKUP_VERSION.to_string(),
            export_date: export_date.to_rfc3339_opts(SecondsFormat::Millis, true),
            accounts,
            settings: BackupSettings {
                auto_lock_time: Some(auto_lock_time),
            },
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Error::from)
    }

    /// Parse and validate a backup
    ///
    /// Requires a non-empty `version` string and an `accounts` array whose
    /// entries each carry a non-empty `id`, `name` and `secret`. Records
    /// marked `encrypted` are refused: sealed secrets are bound to the vault
    /// that wrote them.
    pub fn parse(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| Error::InvalidBackupFormat(format!("not valid JSON: {}", e)))?;

        let object = value
            .as_object()
            .ok_or_else(|| Error::InvalidBackupFormat("top level is not an object".to_string()))?;

        match object.get("version").and_then(Value::as_str) {
            Some(version) if !version.trim().is_empty() => {}
            _ => return Err(Error::InvalidBackupFormat("missing version".to_string())),
        }

        let accounts = object
            .get("accounts")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::InvalidBackupFormat("missing accounts array".to_string()))?;

        for (index, account) in accounts.iter().enumerate() {
            for field in ["id", "name", "secret"] {
                let present = account
                    .get(field)
                    .and_then(Value::as_str)
                    .map(|v| !v.trim().is_empty())
                    .unwrap_or(false);
                if !present {
                    return Err(Error::InvalidBackupFormat(format!(
                        "account {} is missing '{}'",
                        index, field
                    )));
                }
            }
        }

        let backup: BackupFile = serde_json::from_value(value)?;

        if backup.accounts.iter().any(|a| a.encrypted) {
            return Err(Error::InvalidBackupFormat(
                "backup contains sealed secrets".to_string(),
            ));
        }

        Ok(backup)
    }

    /// Auto-lock timeout to apply on import
    pub fn auto_lock_time(&self) -> u64 {
        self.settings.auto_lock_time.unwrap_or(DEFAULT_AUTO_LOCK_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountDraft;
    use chrono::TimeZone;

    fn sample_account(id: &str) -> Account {
        AccountDraft::new("Example", "JBSWY3DPEHPK3PXP")
            .with_domain("example.com")
            .into_account(id.to_string(), Utc::now())
            .unwrap()
    }

    #[test]
    fn test_export_shape() {
        let date = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let backup = BackupFile::new(vec![sample_account("a")], 300, date);
        let value: Value = serde_json::from_str(&backup.to_json().unwrap()).unwrap();

        assert_eq!(value["version"], "1.0.0");
        assert_eq!(value["exportDate"], "2024-03-01T12:00:00.000Z");
        assert_eq!(value["settings"]["autoLockTime"], 300);
        assert_eq!(value["accounts"][0]["secret"], "JBSWY3DPEHPK3PXP");
    }

    #[test]
    fn test_parse_exported_file() {
        let backup = BackupFile::new(vec![sample_account("a"), sample_account("b")], 0, Utc::now());
        let parsed = BackupFile::parse(&backup.to_json().unwrap()).unwrap();
        assert_eq!(parsed, backup);
        assert_eq!(parsed.auto_lock_time(), 0);
    }

    #[test]
    fn test_missing_settings_defaults_auto_lock() {
        let json = r#"{"version":"1.0.0","accounts":[{"id":"1","name":"A","secret":"JBSWY3DP"}]}"#;
        let parsed = BackupFile::parse(json).unwrap();
        assert_eq!(parsed.accounts.len(), 1);
        assert_eq!(parsed.auto_lock_time(), DEFAULT_AUTO_LOCK_SECS);
    }

    #[test]
    fn test_rejects_missing_version() {
        let json = r#"{"exportDate":"x","accounts":[]}"#;
        assert!(matches!(
            BackupFile::parse(json),
            Err(Error::InvalidBackupFormat(msg)) if msg.contains("version")
        ));
    }

    #[test]
    fn test_rejects_missing_accounts() {
        let json = r#"{"version":"1.0.0","exportDate":"x","accounts":{}}"#;
        assert!(BackupFile::parse(json).is_err());
    }

    #[test]
    fn test_rejects_account_without_secret() {
        let json = r#"{"version":"1.0.0","exportDate":"x","accounts":[
            {"id":"1","name":"A","secret":"JBSWY3DP"},
            {"id":"2","name":"B","secret":""}
        ]}"#;
        assert!(matches!(
            BackupFile::parse(json),
            Err(Error::InvalidBackupFormat(msg)) if msg.contains("account 1")
        ));
    }

    #[test]
    fn test_rejects_sealed_records() {
        let json = r#"{"version":"1.0.0","exportDate":"x","accounts":[
            {"id":"1","name":"A","secret":"c2VhbGVk","encrypted":true}
        ]}"#;
        assert!(BackupFile::parse(json).is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(BackupFile::parse("not json").is_err());
        assert!(BackupFile::parse("[]").is_err());
    }
}
