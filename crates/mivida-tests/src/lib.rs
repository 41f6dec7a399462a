//! Shared helpers for the Mivida end-to-end tests

use std::path::Path;
use std::sync::Arc;

use mivida_vault::{FileStore, Vault, VaultOptions};
use serde_json::{Map, Value};

/// Open a vault over the store file at `path`, as a fresh process would
pub async fn open_file_vault(path: &Path) -> mivida_vault::Result<Vault> {
    Vault::open(Arc::new(FileStore::new(path)), VaultOptions::testing()).await
}

/// Raw JSON object persisted at `path`; empty when the file is missing
pub fn read_store_file(path: &Path) -> Map<String, Value> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        },
        Err(_) => Map::new(),
    }
}
