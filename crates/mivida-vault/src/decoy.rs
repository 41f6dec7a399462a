//! Decoy activation
//!
//! Replaces the stored account list with synthesized decoys in a single
//! store write, together with the activation flag. The real accounts are
//! not kept anywhere.

use mivida_core::{synthesize_decoys, Account, Clock, DEFAULT_DECOY_COUNT};
use rand::rngs::OsRng;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::Result;
use crate::store::{keys, Store};

#[derive(Clone, Debug)]
pub struct DecoyGenerator {
    count: usize,
}

impl Default for DecoyGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_DECOY_COUNT)
    }
}

impl DecoyGenerator {
    pub fn new(count: usize) -> Self {
        Self { count }
    }

    /// Overwrite the account list with decoys and mark decoy mode active
    pub async fn activate(&self, store: &dyn Store, clock: &dyn Clock) -> Result<Vec<Account>> {
        let decoys = synthesize_decoys(&mut OsRng, self.count, clock.now_utc());

        let mut entries = Map::new();
        entries.insert(keys::ACCOUNTS.to_string(), serde_json::to_value(&decoys)?);
        entries.insert(keys::DECOY_MODE_ACTIVATED.to_string(), Value::Bool(true));
        store.set(entries).await?;

        warn!("Decoy mode activated: {} decoy accounts replaced the account list", decoys.len());
        Ok(decoys)
    }
}
