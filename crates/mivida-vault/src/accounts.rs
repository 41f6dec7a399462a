//! Account operations on an authorized vault

use std::fmt;

use mivida_core::{match_accounts, totp, Account, AccountDraft, AccountUpdate, Clock};
use serde_json::Value;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::auth::{plaintext_secret, seal_account, VaultKey};
use crate::error::{Result, VaultError};
use crate::store::keys;
use crate::vault::{accounts_entry, Access, Vault};

/// Why an account has no code to show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeError {
    /// Stored secret is not valid base32
    InvalidSecret,
    /// Secret is sealed and this session has no key
    KeyUnavailable,
    /// Sealed secret failed to open
    DecryptionFailed,
}

impl fmt::Display for CodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeError::InvalidSecret => f.write_str("invalid secret"),
            CodeError::KeyUnavailable => f.write_str("unlock with PIN to view"),
            CodeError::DecryptionFailed => f.write_str("secret could not be opened"),
        }
    }
}

/// The current code for one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountCode {
    pub account_id: String,
    pub name: String,
    pub domain: Option<String>,
    pub is_decoy: bool,
    pub code: std::result::Result<String, CodeError>,
}

impl AccountCode {
    fn for_account(account: &Account, key: Option<&VaultKey>, timestamp_secs: u64) -> Self {
        // One bad record must not hide the others
        let code = match plaintext_secret(account, key) {
            Ok(secret) => {
                totp::generate(&secret, timestamp_secs).map_err(|_| CodeError::InvalidSecret)
            }
            Err(VaultError::KeyUnavailable) => Err(CodeError::KeyUnavailable),
            Err(_) => Err(CodeError::DecryptionFailed),
        };

        Self {
            account_id: account.id.clone(),
            name: account.name.clone(),
            domain: account.domain.clone(),
            is_decoy: account.is_decoy,
            code,
        }
    }
}

impl Vault {
    /// Read the stored account list, propagating read failures
    pub(crate) async fn load_accounts(&self) -> Result<Vec<Account>> {
        let mut entries = self.store().get(&[keys::ACCOUNTS]).await?;
        match entries.remove(keys::ACCOUNTS) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value)
                .map_err(|e| VaultError::StorageFailure(format!("Account list is corrupt: {}", e))),
        }
    }

    /// Read the stored account list for display; failures read as empty
    async fn load_accounts_for_display(&self) -> Vec<Account> {
        self.load_accounts().await.unwrap_or_else(|e| {
            warn!("Failed to read accounts: {}", e);
            Vec::new()
        })
    }

    async fn save_accounts(&self, accounts: &[Account]) -> Result<()> {
        self.store().set(accounts_entry(accounts)?).await
    }

    /// Seal a plaintext record if this vault seals secrets
    ///
    /// Keyless sessions may only write plaintext while decoy mode is active.
    pub(crate) fn prepare_for_storage(access: &Access, mut account: Account) -> Result<Account> {
        if !access.config.is_pin_configured() {
            return Ok(account);
        }
        match &access.key {
            Some(key) => {
                seal_account(&mut account, key)?;
                Ok(account)
            }
            None if access.config.decoy_mode_activated => Ok(account),
            None => Err(VaultError::KeyUnavailable),
        }
    }

    /// Every stored account; sealed secrets stay sealed
    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        self.authorize().await?;
        Ok(self.load_accounts_for_display().await)
    }

    pub async fn get_account(&self, id: &str) -> Result<Account> {
        self.authorize().await?;
        self.load_accounts()
            .await?
            .into_iter()
            .find(|a| a.id == id)
            .ok_or_else(|| VaultError::AccountNotFound(id.to_string()))
    }

    /// Plaintext base32 secret of one account
    pub async fn reveal_secret(&self, id: &str) -> Result<Zeroizing<String>> {
        let access = self.authorize().await?;
        let accounts = self.load_accounts().await?;
        let account = accounts
            .iter()
            .find(|a| a.id == id)
            .ok_or_else(|| VaultError::AccountNotFound(id.to_string()))?;
        plaintext_secret(account, access.key.as_ref())
    }

    /// Validate, seal and append a new account
    pub async fn add_account(&self, draft: AccountDraft) -> Result<Account> {
        let access = self.authorize().await?;
        let account = draft.into_account(uuid::Uuid::new_v4().to_string(), self.clock().now_utc())?;
        let stored = Self::prepare_for_storage(&access, account)?;

        let mut accounts = self.load_accounts().await?;
        accounts.push(stored.clone());
        self.save_accounts(&accounts).await?;
        self.record_activity(&access.config).await?;

        info!("Added account {}", stored.id);
        Ok(stored)
    }

    pub async fn update_account(&self, id: &str, update: AccountUpdate) -> Result<Account> {
        let access = self.authorize().await?;
        let mut accounts = self.load_accounts().await?;
        let account = accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| VaultError::AccountNotFound(id.to_string()))?;

        update.apply_metadata(account)?;
        if let Some(secret) = update.normalized_secret()? {
            let mut replacement = account.clone();
            replacement.secret = secret;
            replacement.encrypted = false;
            *account = Self::prepare_for_storage(&access, replacement)?;
        }
        let updated = account.clone();

        self.save_accounts(&accounts).await?;
        self.record_activity(&access.config).await?;

        info!("Updated account {}", id);
        Ok(updated)
    }

    pub async fn delete_account(&self, id: &str) -> Result<()> {
        let access = self.authorize().await?;
        let mut accounts = self.load_accounts().await?;
        let before = accounts.len();
        accounts.retain(|a| a.id != id);
        if accounts.len() == before {
            return Err(VaultError::AccountNotFound(id.to_string()));
        }

        self.save_accounts(&accounts).await?;
        self.record_activity(&access.config).await?;

        info!("Deleted account {}", id);
        Ok(())
    }

    /// Remember that a code was copied, starting the copy cooldown
    pub async fn record_copy(&self, id: &str) -> Result<()> {
        self.authorize().await?;
        let now = self.now_ms();
        let mut accounts = self.load_accounts().await?;
        let account = accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| VaultError::AccountNotFound(id.to_string()))?;
        account.last_copy_time = Some(now);
        self.save_accounts(&accounts).await
    }

    /// Current code for every account
    pub async fn codes(&self) -> Result<Vec<AccountCode>> {
        self.codes_at(self.clock().now_secs()).await
    }

    /// Code for every account at `timestamp_secs`
    pub async fn codes_at(&self, timestamp_secs: u64) -> Result<Vec<AccountCode>> {
        let access = self.authorize().await?;
        let accounts = self.load_accounts_for_display().await;
        Ok(accounts
            .iter()
            .map(|a| AccountCode::for_account(a, access.key.as_ref(), timestamp_secs))
            .collect())
    }

    /// Accounts to offer on a page, after the copy cooldown
    pub async fn matching_accounts(&self, page_url: &str, page_domain: &str) -> Result<Vec<Account>> {
        self.authorize().await?;
        let accounts = self.load_accounts_for_display().await;
        Ok(match_accounts(&accounts, page_url, page_domain, self.now_ms())
            .into_iter()
            .cloned()
            .collect())
    }

    /// Current codes for the accounts offered on a page
    pub async fn matching_codes(&self, page_url: &str, page_domain: &str) -> Result<Vec<AccountCode>> {
        let access = self.authorize().await?;
        let accounts = self.load_accounts_for_display().await;
        let timestamp_secs = self.clock().now_secs();
        Ok(match_accounts(&accounts, page_url, page_domain, self.now_ms())
            .into_iter()
            .map(|a| AccountCode::for_account(a, access.key.as_ref(), timestamp_secs))
            .collect())
    }
}
