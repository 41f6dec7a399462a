//! The vault session state machine
//!
//! ```text
//!                  setup_pin                 verify_pin (ok)
//! NoPinConfigured ──────────► Unlocked ◄─────────────────── Locked
//!        ▲                     │   ▲ adopt fresh unlock        ▲
//!        │ remove/forget PIN   │   └───────────────────────────┤
//!        │ hard reset          └── lock / auto-lock / expiry ──┘
//! ```
//!
//! Persisted state is authoritative. Every operation reads the security
//! configuration from the store, and the in-memory [`Session`] only records
//! whether this surface is unlocked and which sealing key it holds.

use std::sync::Arc;
use std::time::Duration;

use mivida_core::{Account, Clock, DecoyBehavior, SecurityConfig, SystemClock, DEFAULT_AUTO_LOCK_SECS, DEFAULT_DECOY_COUNT};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::{
    seal_account, unseal_account, validate_pin, AuthState, FailedAttemptPolicy, KdfParams,
    PinHasher, PolicyAction, Session, VaultKey,
};
use crate::autolock::AutoLockTimer;
use crate::decoy::DecoyGenerator;
use crate::error::{Result, VaultError};
use crate::store::{keys, Store};

/// Tunables for a [`Vault`]
#[derive(Clone)]
pub struct VaultOptions {
    pub kdf: KdfParams,
    /// Decoys synthesized on activation
    pub decoy_count: usize,
    /// Period of the background session-expiry check
    pub session_check_interval: Duration,
    /// Period of the background code refresh
    pub code_refresh_interval: Duration,
    pub clock: Arc<dyn Clock>,
}

impl Default for VaultOptions {
    fn default() -> Self {
        Self {
            kdf: KdfParams::default(),
            decoy_count: DEFAULT_DECOY_COUNT,
            session_check_interval: Duration::from_secs(5),
            code_refresh_interval: Duration::from_secs(1),
            clock: Arc::new(SystemClock),
        }
    }
}

impl VaultOptions {
    /// Cheap key derivation for tests
    pub fn testing() -> Self {
        Self {
            kdf: KdfParams::testing(),
            ..Default::default()
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Lock-screen summary; safe to show without unlocking
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultStatus {
    pub state: AuthState,
    pub failed_attempts: u32,
    pub max_failed_attempts: u32,
    /// Attempts left before a destructive policy fires
    pub attempts_remaining: Option<u32>,
    pub reset_on_failed_attempts: bool,
    pub decoy_mode_enabled: bool,
    pub decoy_behavior: DecoyBehavior,
    pub decoy_mode_activated: bool,
    pub auto_lock_time: u64,
    /// This surface can open sealed secrets
    pub session_has_key: bool,
    /// An auto-lock timer is counting down on this surface
    pub auto_lock_pending: bool,
}

/// Access granted to an account operation
pub(crate) struct Access {
    pub config: SecurityConfig,
    pub key: Option<VaultKey>,
}

pub struct Vault {
    store: Arc<dyn Store>,
    session: Arc<Mutex<Session>>,
    /// Always acquired after `session` when both are held
    auto_lock: Mutex<AutoLockTimer>,
    hasher: PinHasher,
    decoys: DecoyGenerator,
    options: VaultOptions,
}

impl Vault {
    /// Open a vault over `store` and derive the initial state from it
    pub async fn open(store: Arc<dyn Store>, options: VaultOptions) -> Result<Self> {
        let vault = Self {
            store,
            session: Arc::new(Mutex::new(Session::new())),
            auto_lock: Mutex::new(AutoLockTimer::new()),
            hasher: PinHasher::new(options.kdf.clone()),
            decoys: DecoyGenerator::new(options.decoy_count),
            options,
        };

        let mut config = vault.load_config().await?;
        if config.decoy_mode_enabled && config.reset_on_failed_attempts {
            warn!("Reset on failed attempts and decoy mode were both enabled; keeping decoy mode");
        }
        if config.normalize() {
            vault.persist(&config, Map::new()).await?;
        }

        let state = vault.resync().await?;
        info!("Vault opened ({:?})", state);
        Ok(vault)
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn clock(&self) -> &dyn Clock {
        self.options.clock.as_ref()
    }

    pub fn options(&self) -> &VaultOptions {
        &self.options
    }

    pub(crate) fn now_ms(&self) -> i64 {
        self.options.clock.now_ms()
    }

    // ============================================
    // Configuration persistence
    // ============================================

    pub(crate) async fn load_config(&self) -> Result<SecurityConfig> {
        let entries = self.store.get(SecurityConfig::KEYS).await?;
        serde_json::from_value(Value::Object(entries)).map_err(|e| {
            VaultError::StorageFailure(format!("Security configuration is corrupt: {}", e))
        })
    }

    /// Write the configuration plus `extra` entries in one store write,
    /// then drop optional keys the configuration no longer carries
    pub(crate) async fn persist(
        &self,
        config: &SecurityConfig,
        mut extra: Map<String, Value>,
    ) -> Result<()> {
        let Value::Object(entries) = serde_json::to_value(config)? else {
            return Err(VaultError::StorageFailure(
                "Security configuration did not serialize to an object".to_string(),
            ));
        };

        let absent: Vec<&str> = SecurityConfig::OPTIONAL_KEYS
            .iter()
            .copied()
            .filter(|k| !entries.contains_key(*k))
            .collect();

        extra.extend(entries);
        self.store.set(extra).await?;
        if !absent.is_empty() {
            self.store.remove(&absent).await?;
        }
        Ok(())
    }

    // ============================================
    // Session bookkeeping
    // ============================================

    async fn enter_unlocked(&self, key: Option<VaultKey>, config: &SecurityConfig) {
        let mut session = self.session.lock().await;
        session.unlock(key, config.pin_hash.clone());
        self.reschedule_auto_lock(config).await;
    }

    async fn lock_session(&self) {
        let mut session = self.session.lock().await;
        session.lock();
        self.auto_lock.lock().await.cancel();
    }

    /// Restart the auto-lock timer from the recorded unlock time
    async fn reschedule_auto_lock(&self, config: &SecurityConfig) {
        let mut timer = self.auto_lock.lock().await;
        match config.remaining_session_ms(self.now_ms()) {
            Some(ms) if config.is_pin_configured() => {
                timer.schedule(Duration::from_millis(ms), self.session.clone())
            }
            _ => timer.cancel(),
        }
    }

    /// Lock an unlocked session whose recorded unlock has run out, or whose
    /// key was derived under a PIN that has since changed
    async fn expire_if_stale(&self, config: &SecurityConfig) -> bool {
        let now = self.now_ms();
        let mut session = self.session.lock().await;
        if !session.is_unlocked() {
            return false;
        }

        let expired = config.is_session_expired(now);
        let stale_key = !session.key_matches(config.pin_hash.as_deref());
        if !expired && !stale_key {
            return false;
        }

        session.lock();
        self.auto_lock.lock().await.cancel();
        if stale_key {
            info!("PIN changed elsewhere, vault locked");
        } else {
            info!("Session expired, vault locked");
        }
        true
    }

    /// Gate for every account read and write
    ///
    /// Without a PIN everything is allowed. With one, the session must be
    /// unlocked and not stale.
    pub(crate) async fn authorize(&self) -> Result<Access> {
        let config = self.load_config().await?;
        if !config.is_pin_configured() {
            return Ok(Access { config, key: None });
        }

        self.expire_if_stale(&config).await;

        let session = self.session.lock().await;
        if !session.is_unlocked() {
            return Err(VaultError::Locked);
        }
        let key = session.key().cloned();
        drop(session);

        Ok(Access { config, key })
    }

    /// Refresh the shared unlock time after account activity
    pub(crate) async fn record_activity(&self, config: &SecurityConfig) -> Result<()> {
        if !config.is_pin_configured() {
            return Ok(());
        }

        let now = self.now_ms();
        let mut entries = Map::new();
        entries.insert(keys::LAST_UNLOCK_TIME.to_string(), Value::from(now));
        self.store.set(entries).await?;

        let mut config = config.clone();
        config.last_unlock_time = Some(now);
        self.reschedule_auto_lock(&config).await;
        debug!("Session activity recorded");
        Ok(())
    }

    /// Current access state
    pub async fn state(&self) -> Result<AuthState> {
        let config = self.load_config().await?;
        Ok(self.state_for(&config).await)
    }

    async fn state_for(&self, config: &SecurityConfig) -> AuthState {
        if !config.is_pin_configured() {
            return AuthState::NoPinConfigured;
        }
        self.expire_if_stale(config).await;
        if self.session.lock().await.is_unlocked() {
            AuthState::Unlocked
        } else {
            AuthState::Locked
        }
    }

    /// Lock-screen summary of the configuration and session
    pub async fn status(&self) -> Result<VaultStatus> {
        let config = self.load_config().await?;
        let state = self.state_for(&config).await;
        let session_has_key = self.holds_key().await;
        let auto_lock_pending = self.auto_lock.lock().await.is_scheduled();

        Ok(VaultStatus {
            state,
            failed_attempts: config.failed_attempts,
            max_failed_attempts: config.max_failed_attempts,
            attempts_remaining: config.attempts_remaining(),
            reset_on_failed_attempts: config.reset_on_failed_attempts,
            decoy_mode_enabled: config.decoy_mode_enabled,
            decoy_behavior: config.decoy_behavior,
            decoy_mode_activated: config.decoy_mode_activated,
            auto_lock_time: config.auto_lock_time,
            session_has_key,
            auto_lock_pending,
        })
    }

    /// Whether this surface holds the sealing key
    pub async fn holds_key(&self) -> bool {
        self.session.lock().await.has_key()
    }

    // ============================================
    // PIN lifecycle
    // ============================================

    /// Configure the first PIN and unlock
    ///
    /// Existing secrets are sealed under the new key in the same store write
    /// that records the PIN. The auto-lock timeout is set to 15 minutes.
    pub async fn setup_pin(&self, pin: &str, confirm: &str) -> Result<()> {
        validate_pin(pin)?;
        if pin != confirm {
            return Err(VaultError::PinMismatch);
        }

        let mut config = self.load_config().await?;
        if config.is_pin_configured() {
            return Err(VaultError::AlreadyConfigured);
        }

        let mut accounts = self.load_accounts().await?;
        let (record, key) = self.hasher.enroll(pin).await?;
        for account in accounts.iter_mut() {
            seal_account(account, &key)?;
        }

        config.pin_hash = Some(record.hash);
        config.pin_salt = Some(record.salt);
        config.key_salt = Some(record.key_salt);
        config.pin_configured = true;
        config.failed_attempts = 0;
        config.auto_lock_time = DEFAULT_AUTO_LOCK_SECS;
        config.last_unlock_time = Some(self.now_ms());

        self.persist(&config, accounts_entry(&accounts)?).await?;
        self.enter_unlocked(Some(key), &config).await;

        info!("PIN configured, {} secrets sealed", accounts.len());
        Ok(())
    }

    /// Check a PIN, unlocking on success
    ///
    /// A wrong PIN increments the persisted failure count and may trigger the
    /// configured failure policy. Malformed PINs are rejected without
    /// counting as an attempt.
    pub async fn verify_pin(&self, pin: &str) -> Result<bool> {
        let mut config = self.load_config().await?;
        if !config.is_pin_configured() {
            return Err(VaultError::NotConfigured);
        }
        let (Some(hash), Some(salt)) = (config.pin_hash.clone(), config.pin_salt.clone()) else {
            return Err(VaultError::NotConfigured);
        };
        validate_pin(pin)?;

        if self.hasher.verify(pin, &hash, &salt).await? {
            let mut extra = Map::new();
            let key = match config.key_salt.clone() {
                Some(key_salt) => self.hasher.derive_key(pin, &key_salt).await?,
                None => {
                    // PIN predates sealing; seal what is stored now
                    let (key_salt, key) = self.hasher.new_key(pin).await?;
                    let mut accounts = self.load_accounts().await?;
                    for account in accounts.iter_mut() {
                        seal_account(account, &key)?;
                    }
                    extra = accounts_entry(&accounts)?;
                    config.key_salt = Some(key_salt);
                    info!("Sealed {} existing secrets", accounts.len());
                    key
                }
            };

            config.failed_attempts = 0;
            config.last_unlock_time = Some(self.now_ms());
            self.persist(&config, extra).await?;
            self.enter_unlocked(Some(key), &config).await;

            info!("PIN verified, vault unlocked");
            return Ok(true);
        }

        config.failed_attempts = config.failed_attempts.saturating_add(1);
        self.persist(&config, Map::new()).await?;
        warn!(
            "Incorrect PIN ({}/{} failed attempts)",
            config.failed_attempts, config.max_failed_attempts
        );

        match FailedAttemptPolicy::evaluate(&config) {
            PolicyAction::None => {}
            PolicyAction::HardReset => self.hard_reset().await?,
            PolicyAction::ActivateDecoy { auto_unlock } => self.activate_decoy(auto_unlock).await?,
        }
        Ok(false)
    }

    /// Replace the PIN after verifying the current one
    ///
    /// Every secret is re-sealed under the new key; if any fails to open,
    /// nothing is written.
    pub async fn change_pin(&self, current: &str, new_pin: &str, confirm: &str) -> Result<()> {
        validate_pin(new_pin)?;
        if new_pin != confirm {
            return Err(VaultError::PinMismatch);
        }
        if !self.verify_pin(current).await? {
            return Err(VaultError::IncorrectPin);
        }

        let old_key = self
            .session
            .lock()
            .await
            .key()
            .cloned()
            .ok_or(VaultError::KeyUnavailable)?;

        let mut accounts = self.load_accounts().await?;
        let (record, new_key) = self.hasher.enroll(new_pin).await?;
        for account in accounts.iter_mut() {
            unseal_account(account, &old_key)?;
            seal_account(account, &new_key)?;
        }

        let mut config = self.load_config().await?;
        config.pin_hash = Some(record.hash);
        config.pin_salt = Some(record.salt);
        config.key_salt = Some(record.key_salt);
        config.pin_configured = true;
        config.failed_attempts = 0;
        config.last_unlock_time = Some(self.now_ms());

        self.persist(&config, accounts_entry(&accounts)?).await?;
        self.enter_unlocked(Some(new_key), &config).await;

        info!("PIN changed, {} secrets re-sealed", accounts.len());
        Ok(())
    }

    /// Remove the PIN from an unlocked vault, keeping every account
    ///
    /// Secrets are stored in plaintext again, so this surface must hold
    /// the sealing key whenever any secret is sealed.
    pub async fn remove_pin(&self) -> Result<()> {
        let access = self.authorize().await?;
        if !access.config.is_pin_configured() {
            return Err(VaultError::NotConfigured);
        }

        let mut accounts = self.load_accounts().await?;
        if accounts.iter().any(|a| a.encrypted) {
            let key = access.key.as_ref().ok_or(VaultError::KeyUnavailable)?;
            for account in accounts.iter_mut() {
                unseal_account(account, key)?;
            }
        }

        let mut config = access.config;
        clear_pin(&mut config);
        self.persist(&config, accounts_entry(&accounts)?).await?;
        self.lock_session().await;

        info!("PIN removed");
        Ok(())
    }

    /// Forget the PIN from the lock screen, erasing every account
    pub async fn forget_pin(&self) -> Result<()> {
        let mut config = self.load_config().await?;
        if !config.is_pin_configured() {
            return Err(VaultError::NotConfigured);
        }

        clear_pin(&mut config);
        config.decoy_mode_activated = false;

        let mut extra = Map::new();
        extra.insert(keys::ACCOUNTS.to_string(), Value::Array(Vec::new()));
        self.persist(&config, extra).await?;
        self.lock_session().await;

        warn!("PIN forgotten, all accounts erased");
        Ok(())
    }

    /// Lock this surface and withdraw the shared unlock
    ///
    /// Idempotent.
    pub async fn lock(&self) -> Result<()> {
        self.lock_session().await;

        let config = self.load_config().await?;
        if config.is_pin_configured() {
            self.store.remove(&[keys::LAST_UNLOCK_TIME]).await?;
        }

        info!("Vault locked");
        Ok(())
    }

    async fn hard_reset(&self) -> Result<()> {
        self.lock_session().await;
        self.store.clear().await?;
        warn!("Failed attempt limit reached, all stored data erased");
        Ok(())
    }

    async fn activate_decoy(&self, auto_unlock: bool) -> Result<()> {
        self.decoys
            .activate(self.store.as_ref(), self.options.clock.as_ref())
            .await?;

        if !auto_unlock {
            self.lock_session().await;
            return Ok(());
        }

        let mut config = self.load_config().await?;
        config.failed_attempts = 0;
        config.decoy_mode_activated = true;
        config.last_unlock_time = Some(self.now_ms());
        self.persist(&config, Map::new()).await?;
        self.enter_unlocked(None, &config).await;
        Ok(())
    }

    // ============================================
    // Settings
    // ============================================

    /// Set the auto-lock timeout in seconds (0 disables it)
    pub async fn set_auto_lock_time(&self, seconds: u64) -> Result<()> {
        let mut config = self.authorize().await?.config;
        config.auto_lock_time = seconds;
        if config.is_pin_configured() {
            config.last_unlock_time = Some(self.now_ms());
        }
        self.persist(&config, Map::new()).await?;
        self.reschedule_auto_lock(&config).await;

        info!("Auto-lock set to {} seconds", seconds);
        Ok(())
    }

    pub async fn set_reset_on_failed_attempts(&self, enabled: bool, max: Option<u32>) -> Result<()> {
        self.update_policy(|config| FailedAttemptPolicy::set_reset(config, enabled, max))
            .await?;
        info!("Reset on failed attempts {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    pub async fn set_decoy_mode(&self, enabled: bool, max: Option<u32>) -> Result<()> {
        self.update_policy(|config| FailedAttemptPolicy::set_decoy(config, enabled, max))
            .await?;
        info!("Decoy mode {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    pub async fn set_decoy_behavior(&self, behavior: DecoyBehavior) -> Result<()> {
        self.update_policy(|config| {
            FailedAttemptPolicy::set_decoy_behavior(config, behavior);
            Ok(())
        })
        .await
    }

    pub async fn set_max_failed_attempts(&self, max: u32) -> Result<()> {
        self.update_policy(|config| FailedAttemptPolicy::set_max_attempts(config, max))
            .await
    }

    async fn update_policy<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut SecurityConfig) -> Result<()> + Send,
    {
        let mut config = self.authorize().await?.config;
        change(&mut config)?;
        self.persist(&config, Map::new()).await
    }

    // ============================================
    // Cross-surface synchronization
    // ============================================

    /// Lock if the recorded unlock has expired; true if this call locked
    pub async fn check_session_expiry(&self) -> Result<bool> {
        let config = self.load_config().await?;
        if !config.is_pin_configured() {
            return Ok(false);
        }
        Ok(self.expire_if_stale(&config).await)
    }

    /// Reconcile this surface with the shared unlock time
    ///
    /// A fresh unlock recorded elsewhere is adopted (without the sealing
    /// key); a missing or stale one ends this surface's session.
    pub async fn resync(&self) -> Result<AuthState> {
        let config = self.load_config().await?;
        if !config.is_pin_configured() {
            self.lock_session().await;
            return Ok(AuthState::NoPinConfigured);
        }

        let fresh = config.is_session_fresh(self.now_ms());
        let mut session = self.session.lock().await;

        if session.is_unlocked() {
            if fresh && session.key_matches(config.pin_hash.as_deref()) {
                return Ok(AuthState::Unlocked);
            }
            session.lock();
            self.auto_lock.lock().await.cancel();
            info!("Session ended by another surface");
            return Ok(AuthState::Locked);
        }

        if fresh {
            session.unlock(None, config.pin_hash.clone());
            self.reschedule_auto_lock(&config).await;
            info!("Adopted unlock from another surface");
            return Ok(AuthState::Unlocked);
        }

        Ok(AuthState::Locked)
    }
}

/// Strip every PIN-dependent field from the configuration
fn clear_pin(config: &mut SecurityConfig) {
    config.pin_hash = None;
    config.pin_salt = None;
    config.key_salt = None;
    config.pin_configured = false;
    config.failed_attempts = 0;
    config.last_unlock_time = None;
    config.reset_on_failed_attempts = false;
    config.decoy_mode_enabled = false;
}

pub(crate) fn accounts_entry(accounts: &[Account]) -> Result<Map<String, Value>> {
    let mut entries = Map::new();
    entries.insert(keys::ACCOUNTS.to_string(), serde_json::to_value(accounts)?);
    Ok(entries)
}
