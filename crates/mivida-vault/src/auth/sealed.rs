//! Sealing of account secrets at rest
//!
//! A sealed secret is `base64(nonce || ciphertext || tag)` produced by
//! ChaCha20-Poly1305 with a random 12-byte nonce. The account id is bound
//! as associated data so a sealed secret cannot be moved to another record.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use mivida_core::Account;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{Result, VaultError};

/// Sealing key length in bytes
pub const KEY_LEN: usize = 32;

/// Size of the nonce for ChaCha20-Poly1305
const NONCE_SIZE: usize = 12;

/// Poly1305 tag size
const TAG_SIZE: usize = 16;

/// Key that seals account secrets, zeroized on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct VaultKey([u8; KEY_LEN]);

impl VaultKey {
    pub(crate) fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    fn cipher(&self) -> Result<ChaCha20Poly1305> {
        ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| VaultError::Crypto(format!("Invalid key: {}", e)))
    }
}

impl fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VaultKey(<redacted>)")
    }
}

/// Seal a plaintext secret for the account `account_id`
pub fn seal_secret(key: &VaultKey, account_id: &str, secret: &str) -> Result<String> {
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = key
        .cipher()?
        .encrypt(
            nonce,
            Payload {
                msg: secret.as_bytes(),
                aad: account_id.as_bytes(),
            },
        )
        .map_err(|e| VaultError::Crypto(format!("Encryption failed: {}", e)))?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(sealed))
}

/// Open a sealed secret
pub fn open_secret(key: &VaultKey, account_id: &str, sealed: &str) -> Result<Zeroizing<String>> {
    let data = STANDARD
        .decode(sealed.trim())
        .map_err(|_| VaultError::DecryptionFailed)?;
    if data.len() < NONCE_SIZE + TAG_SIZE {
        return Err(VaultError::DecryptionFailed);
    }

    let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
    let plaintext = key
        .cipher()?
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: ciphertext,
                aad: account_id.as_bytes(),
            },
        )
        .map_err(|_| VaultError::DecryptionFailed)?;

    String::from_utf8(plaintext)
        .map(Zeroizing::new)
        .map_err(|_| VaultError::DecryptionFailed)
}

/// Seal `account.secret` in place; already sealed records are left alone
pub fn seal_account(account: &mut Account, key: &VaultKey) -> Result<()> {
    if account.encrypted {
        return Ok(());
    }
    let sealed = seal_secret(key, &account.id, &account.secret)?;
    account.secret.zeroize();
    account.secret = sealed;
    account.encrypted = true;
    Ok(())
}

/// Replace a sealed `account.secret` with its plaintext
pub fn unseal_account(account: &mut Account, key: &VaultKey) -> Result<()> {
    if !account.encrypted {
        return Ok(());
    }
    let plaintext = open_secret(key, &account.id, &account.secret)?;
    account.secret = plaintext.as_str().to_string();
    account.encrypted = false;
    Ok(())
}

/// The base32 secret of `account`, opening it with `key` if sealed
pub fn plaintext_secret(account: &Account, key: Option<&VaultKey>) -> Result<Zeroizing<String>> {
    if !account.encrypted {
        return Ok(Zeroizing::new(account.secret.clone()));
    }
    let key = key.ok_or(VaultError::KeyUnavailable)?;
    open_secret(key, &account.id, &account.secret)
}
