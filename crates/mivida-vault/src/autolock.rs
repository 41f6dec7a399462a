//! Auto-lock timer
//!
//! A one-shot tokio task that locks the session when it fires. Scheduling
//! again replaces the pending timer, so at most one is ever live.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::auth::Session;

#[derive(Debug, Default)]
pub struct AutoLockTimer {
    handle: Option<JoinHandle<()>>,
}

impl AutoLockTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock `session` after `after`, cancelling any pending timer
    pub fn schedule(&mut self, after: Duration, session: Arc<Mutex<Session>>) {
        self.cancel();
        debug!("Auto-lock scheduled in {:?}", after);

        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let mut session = session.lock().await;
            if session.is_unlocked() {
                session.lock();
                info!("Auto-lock timer fired, vault locked");
            }
        }));
    }

    /// Drop the pending timer, if any
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Whether a timer is waiting to fire
    pub fn is_scheduled(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }
}

impl Drop for AutoLockTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
