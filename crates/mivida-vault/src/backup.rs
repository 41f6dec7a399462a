//! Backup export and import on an authorized vault

use mivida_core::{BackupFile, Clock};
use serde_json::Value;
use tracing::info;

use crate::auth::unseal_account;
use crate::error::{Result, VaultError};
use crate::store::keys;
use crate::vault::{accounts_entry, Vault};

impl Vault {
    /// Serialize every account with plaintext secrets
    ///
    /// When a PIN is configured it must be supplied and is verified first;
    /// a wrong PIN counts as a failed attempt.
    pub async fn export_backup(&self, pin: Option<&str>) -> Result<String> {
        let config = self.load_config().await?;
        if config.is_pin_configured() {
            let pin = pin.ok_or(VaultError::IncorrectPin)?;
            if !self.verify_pin(pin).await? {
                return Err(VaultError::IncorrectPin);
            }
        }

        let access = self.authorize().await?;
        let mut accounts = self.load_accounts().await?;
        for account in accounts.iter_mut().filter(|a| a.encrypted) {
            let key = access.key.as_ref().ok_or(VaultError::KeyUnavailable)?;
            unseal_account(account, key)?;
        }

        let count = accounts.len();
        let backup = BackupFile::new(accounts, access.config.auto_lock_time, self.clock().now_utc());
        let json = backup.to_json()?;

        info!("Exported {} accounts", count);
        Ok(json)
    }

    /// Replace every account with the contents of a backup
    ///
    /// The file is validated in full before anything is written. Returns the
    /// number of imported accounts.
    pub async fn import_backup(&self, json: &str) -> Result<usize> {
        let access = self.authorize().await?;
        let backup = BackupFile::parse(json)?;
        let auto_lock_time = backup.auto_lock_time();

        let accounts = backup
            .accounts
            .into_iter()
            .map(|account| Self::prepare_for_storage(&access, account))
            .collect::<Result<Vec<_>>>()?;
        let count = accounts.len();

        let mut entries = accounts_entry(&accounts)?;
        entries.insert(keys::AUTO_LOCK_TIME.to_string(), Value::from(auto_lock_time));
        self.store().set(entries).await?;

        let mut config = access.config;
        config.auto_lock_time = auto_lock_time;
        self.record_activity(&config).await?;

        info!("Imported {} accounts", count);
        Ok(count)
    }
}
