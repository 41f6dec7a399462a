//! Background tasks for a long-running surface
//!
//! - Code tick: regenerates every code on a fixed period and publishes the
//!   result on a `watch` channel, with the countdown to the next window
//! - Session check: periodically locks a session whose unlock expired
//! - Resync: reacts to store changes from other surfaces
//!
//! All tasks stop when [`BackgroundTasks`] is dropped.

use std::sync::Arc;

use mivida_core::totp::time_remaining_at;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::accounts::AccountCode;
use crate::error::VaultError;
use crate::store::{keys, StoreChange};
use crate::vault::Vault;

/// Store keys whose change means the session may need to follow
const RESYNC_KEYS: &[&str] = &[keys::LAST_UNLOCK_TIME, keys::PIN_HASH, keys::PIN_CONFIGURED];

/// One refresh of the code list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeSnapshot {
    /// Unix seconds the codes were generated for
    pub generated_at_secs: u64,
    /// Seconds until the current window ends
    pub seconds_remaining: u64,
    /// The vault was locked; `codes` is empty
    pub locked: bool,
    pub codes: Vec<AccountCode>,
}

pub struct BackgroundTasks {
    codes: watch::Receiver<CodeSnapshot>,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Start every task for `vault`
    pub fn spawn(vault: Arc<Vault>) -> Self {
        let (codes_tx, codes_rx) = watch::channel(CodeSnapshot::default());
        // Subscribe before spawning so no change is missed
        let changes = vault.store().subscribe();

        let handles = vec![
            tokio::spawn(code_tick(vault.clone(), codes_tx)),
            tokio::spawn(session_check(vault.clone())),
            tokio::spawn(store_resync(vault, changes)),
        ];

        Self {
            codes: codes_rx,
            handles,
        }
    }

    /// Receiver for code snapshots
    pub fn codes(&self) -> watch::Receiver<CodeSnapshot> {
        self.codes.clone()
    }

    /// Stop every task
    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

async fn code_tick(vault: Arc<Vault>, tx: watch::Sender<CodeSnapshot>) {
    let mut interval = tokio::time::interval(vault.options().code_refresh_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        let now_secs = vault.clock().now_secs();
        let mut snapshot = CodeSnapshot {
            generated_at_secs: now_secs,
            seconds_remaining: time_remaining_at(now_secs),
            ..Default::default()
        };
        match vault.codes_at(now_secs).await {
            Ok(codes) => snapshot.codes = codes,
            Err(VaultError::Locked) => snapshot.locked = true,
            Err(e) => warn!("Code refresh failed: {}", e),
        }

        if tx.send(snapshot).is_err() {
            debug!("No code subscribers left, stopping code tick");
            break;
        }
    }
}

async fn session_check(vault: Arc<Vault>) {
    let mut interval = tokio::time::interval(vault.options().session_check_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        if let Err(e) = vault.check_session_expiry().await {
            warn!("Session check failed: {}", e);
        }
    }
}

async fn store_resync(vault: Arc<Vault>, mut changes: broadcast::Receiver<StoreChange>) {
    loop {
        match changes.recv().await {
            Ok(change) if change.touches_any(RESYNC_KEYS) => {
                if let Err(e) = vault.resync().await {
                    warn!("Resync failed: {}", e);
                }
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                debug!("Missed {} store changes, resyncing", missed);
                if let Err(e) = vault.resync().await {
                    warn!("Resync failed: {}", e);
                }
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
