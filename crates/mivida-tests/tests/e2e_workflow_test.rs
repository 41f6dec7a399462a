//! End-to-end workflow tests for Mivida
//!
//! These tests drive the vault over the JSON file store the CLI uses,
//! reopening it between steps the way separate processes would.

use chrono::Utc;
use mivida_core::{
    matcher::{matches_page, should_show},
    totp, Account, AccountDraft, DecoyBehavior, FloatingWindowDelay,
};
use mivida_tests::{open_file_vault, read_store_file};
use mivida_vault::{AuthState, VaultError};
use tempfile::tempdir;

const GITHUB_SECRET: &str = "JBSWY3DPEHPK3PXP";
const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

fn stored_accounts(path: &std::path::Path) -> Vec<Account> {
    read_store_file(path)
        .remove("accounts")
        .map(|v| serde_json::from_value(v).unwrap())
        .unwrap_or_default()
}

/// Simulates the complete life of a vault file
#[tokio::test]
async fn test_full_vault_lifecycle() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");

    // ==========================================
    // STEP 1: Accounts without a PIN
    // ==========================================
    let vault = open_file_vault(&path).await.unwrap();
    assert_eq!(vault.state().await.unwrap(), AuthState::NoPinConfigured);

    vault
        .add_account(AccountDraft::new("GitHub", GITHUB_SECRET).with_domain("github.com"))
        .await
        .unwrap();
    vault
        .add_account(AccountDraft::new("RFC", RFC_SECRET).with_url("rfc-editor.org/rfc/rfc6238"))
        .await
        .unwrap();
    assert!(std::fs::read_to_string(&path).unwrap().contains(GITHUB_SECRET));

    // ==========================================
    // STEP 2: Protect with a PIN
    // ==========================================
    vault.setup_pin("4321", "4321").await.unwrap();
    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(!raw.contains(GITHUB_SECRET));
    assert!(!raw.contains(RFC_SECRET));
    assert!(stored_accounts(&path).iter().all(|a| a.encrypted));

    vault.lock().await.unwrap();
    assert!(!vault.verify_pin("1111").await.unwrap());
    drop(vault);

    // ==========================================
    // STEP 3: Restart keeps the lock and the count
    // ==========================================
    let vault = open_file_vault(&path).await.unwrap();
    let status = vault.status().await.unwrap();
    assert_eq!(status.state, AuthState::Locked);
    assert_eq!(status.failed_attempts, 1);
    assert!(matches!(vault.codes().await, Err(VaultError::Locked)));

    assert!(vault.verify_pin("4321").await.unwrap());
    let codes = vault.codes_at(59).await.unwrap();
    let rfc = codes.iter().find(|c| c.name == "RFC").unwrap();
    assert_eq!(rfc.code, Ok("287082".to_string()));
    let github = codes.iter().find(|c| c.name == "GitHub").unwrap();
    assert_eq!(github.code, Ok(totp::generate(GITHUB_SECRET, 59).unwrap()));

    let matched = vault
        .matching_accounts("https://www.rfc-editor.org/rfc/rfc6238", "www.rfc-editor.org")
        .await
        .unwrap();
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].name, "RFC");

    // ==========================================
    // STEP 4: Backup, change PIN, restore
    // ==========================================
    let backup = vault.export_backup(Some("4321")).await.unwrap();
    assert!(backup.contains(GITHUB_SECRET));

    vault.change_pin("4321", "987654", "987654").await.unwrap();
    vault.delete_account(&github.account_id).await.unwrap();
    assert_eq!(vault.list_accounts().await.unwrap().len(), 1);

    assert_eq!(vault.import_backup(&backup).await.unwrap(), 2);
    assert!(stored_accounts(&path).iter().all(|a| a.encrypted));
    drop(vault);

    let vault = open_file_vault(&path).await.unwrap();
    assert!(!vault.verify_pin("4321").await.unwrap());
    assert!(vault.verify_pin("987654").await.unwrap());
    assert_eq!(vault.list_accounts().await.unwrap().len(), 2);

    // ==========================================
    // STEP 5: Remove the PIN, secrets back in plaintext
    // ==========================================
    vault.remove_pin().await.unwrap();
    drop(vault);

    let vault = open_file_vault(&path).await.unwrap();
    assert_eq!(vault.state().await.unwrap(), AuthState::NoPinConfigured);
    let accounts = stored_accounts(&path);
    assert_eq!(accounts.len(), 2);
    assert!(accounts.iter().all(|a| !a.encrypted));
    assert!(std::fs::read_to_string(&path).unwrap().contains(GITHUB_SECRET));
    assert!(!read_store_file(&path).contains_key("pinHash"));
}

#[tokio::test]
async fn test_unlock_is_shared_between_processes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");

    let first = open_file_vault(&path).await.unwrap();
    first.setup_pin("1234", "1234").await.unwrap();
    first
        .add_account(AccountDraft::new("GitHub", GITHUB_SECRET))
        .await
        .unwrap();

    // A second process adopts the unlock but cannot open sealed secrets
    let second = open_file_vault(&path).await.unwrap();
    assert_eq!(second.state().await.unwrap(), AuthState::Unlocked);
    assert!(second.codes().await.unwrap()[0].code.is_err());

    first.lock().await.unwrap();
    assert_eq!(second.resync().await.unwrap(), AuthState::Locked);

    let third = open_file_vault(&path).await.unwrap();
    assert_eq!(third.state().await.unwrap(), AuthState::Locked);
}

#[tokio::test]
async fn test_decoy_scenario() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");

    let vault = open_file_vault(&path).await.unwrap();
    vault.setup_pin("1234", "1234").await.unwrap();
    vault
        .add_account(AccountDraft::new("Bank", GITHUB_SECRET).with_domain("bank.example"))
        .await
        .unwrap();
    vault.set_decoy_mode(true, Some(3)).await.unwrap();
    vault.set_decoy_behavior(DecoyBehavior::Unlocked).await.unwrap();
    vault.lock().await.unwrap();

    for _ in 0..3 {
        assert!(!vault.verify_pin("9999").await.unwrap());
    }

    let store = read_store_file(&path);
    assert_eq!(store["decoyModeActivated"], true);
    let accounts = stored_accounts(&path);
    assert_eq!(accounts.len(), 30);
    assert!(accounts.iter().all(|a| a.is_decoy && !a.encrypted));
    assert!(accounts.iter().all(|a| a.name != "Bank"));
    assert!(!std::fs::read_to_string(&path).unwrap().contains(GITHUB_SECRET));

    assert_eq!(vault.state().await.unwrap(), AuthState::Unlocked);
    let codes = vault.codes().await.unwrap();
    assert_eq!(codes.len(), 30);
    assert!(codes.iter().all(|c| c.is_decoy && c.code.is_ok()));
}

#[tokio::test]
async fn test_hard_reset_scenario() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");

    let vault = open_file_vault(&path).await.unwrap();
    vault.setup_pin("1234", "1234").await.unwrap();
    vault
        .add_account(AccountDraft::new("Bank", GITHUB_SECRET))
        .await
        .unwrap();
    vault.set_reset_on_failed_attempts(true, Some(3)).await.unwrap();
    vault.lock().await.unwrap();

    for _ in 0..3 {
        assert!(!vault.verify_pin("9999").await.unwrap());
    }

    assert!(read_store_file(&path).is_empty());
    drop(vault);

    let vault = open_file_vault(&path).await.unwrap();
    assert_eq!(vault.state().await.unwrap(), AuthState::NoPinConfigured);
    assert!(vault.list_accounts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_import_without_version_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");

    let vault = open_file_vault(&path).await.unwrap();
    vault
        .add_account(AccountDraft::new("GitHub", GITHUB_SECRET))
        .await
        .unwrap();
    let before = std::fs::read_to_string(&path).unwrap();

    let result = vault
        .import_backup(r#"{"exportDate":"2024-01-01T00:00:00.000Z","accounts":[]}"#)
        .await;
    assert!(matches!(result, Err(VaultError::InvalidBackupFormat(_))));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn test_matching_scenarios() {
    let mut google = AccountDraft::new("Google", GITHUB_SECRET)
        .with_domain("google.com")
        .into_account("g".to_string(), Utc::now())
        .unwrap();
    assert!(matches_page(&google, "https://accounts.google.com/", "accounts.google.com"));

    google.domain = Some("www.example.com".to_string());
    assert!(matches_page(&google, "https://example.com/", "example.com"));
    assert!(!matches_page(&google, "https://notexample.com/", "notexample.com"));
}

#[test]
fn test_copy_cooldown_scenario() {
    let now = 1_700_000_000_000i64;
    let mut account = AccountDraft::new("Site", GITHUB_SECRET)
        .with_delay("30".parse::<FloatingWindowDelay>().unwrap())
        .into_account("s".to_string(), Utc::now())
        .unwrap();

    account.last_copy_time = Some(now - 20 * 60_000);
    assert!(!should_show(&account, now));

    account.last_copy_time = Some(now - 31 * 60_000);
    assert!(should_show(&account, now));
}
