//! PIN hashing and sealing-key derivation
//!
//! The stored verifier is PBKDF2-SHA256 (100,000 iterations, 256-bit output)
//! over the PIN with a random 16-byte salt, hex encoded. The sealing key is
//! derived separately with Argon2id under its own salt, so the stored hash
//! never doubles as key material.

use argon2::{Algorithm, Argon2, Params, Version};
use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

use super::sealed::{VaultKey, KEY_LEN};
use crate::error::{Result, VaultError};

/// Minimum PIN length
pub const MIN_PIN_LENGTH: usize = 4;
/// Maximum PIN length
pub const MAX_PIN_LENGTH: usize = 6;
/// PBKDF2 salt length in bytes
pub const PIN_SALT_LEN: usize = 16;
/// Argon2 salt length in bytes
pub const KEY_SALT_LEN: usize = 32;
/// PBKDF2 iteration count for stored hashes
pub const PBKDF2_ITERATIONS: u32 = 100_000;

const HASH_LEN: usize = 32;

/// Cost parameters for the PIN hash and the sealing-key derivation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KdfParams {
    pub pbkdf2_iterations: u32,
    /// Argon2 memory cost in KiB
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub argon2_parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: PBKDF2_ITERATIONS,
            argon2_memory_kib: 19 * 1024,
            argon2_iterations: 2,
            argon2_parallelism: 1,
        }
    }
}

impl KdfParams {
    /// Minimal cost for tests. Hashes made with these parameters do not
    /// verify under the defaults.
    pub fn testing() -> Self {
        Self {
            pbkdf2_iterations: 1_000,
            argon2_memory_kib: 8,
            argon2_iterations: 1,
            argon2_parallelism: 1,
        }
    }
}

/// Check that a PIN is 4 to 6 ASCII digits
pub fn validate_pin(pin: &str) -> Result<()> {
    let valid_length = (MIN_PIN_LENGTH..=MAX_PIN_LENGTH).contains(&pin.len());
    if !valid_length || !pin.bytes().all(|b| b.is_ascii_digit()) {
        return Err(VaultError::InvalidPinFormat {
            min: MIN_PIN_LENGTH,
            max: MAX_PIN_LENGTH,
        });
    }
    Ok(())
}

/// PIN material persisted in the security configuration (all hex)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PinRecord {
    pub hash: String,
    pub salt: String,
    pub key_salt: String,
}

/// Runs PIN derivations on the blocking thread pool
#[derive(Clone, Debug, Default)]
pub struct PinHasher {
    params: KdfParams,
}

impl PinHasher {
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &KdfParams {
        &self.params
    }

    /// Hash a new PIN under fresh salts and derive its sealing key
    pub async fn enroll(&self, pin: &str) -> Result<(PinRecord, VaultKey)> {
        validate_pin(pin)?;

        let mut salt = [0u8; PIN_SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let mut key_salt = [0u8; KEY_SALT_LEN];
        OsRng.fill_bytes(&mut key_salt);

        let pin = Zeroizing::new(pin.to_string());
        let params = self.params.clone();

        tokio::task::spawn_blocking(move || -> Result<(PinRecord, VaultKey)> {
            let hash = hash_pin(pin.as_bytes(), &salt, params.pbkdf2_iterations);
            let key = derive_sealing_key(pin.as_bytes(), &key_salt, &params)?;
            let record = PinRecord {
                hash: hex::encode(hash.as_slice()),
                salt: hex::encode(salt),
                key_salt: hex::encode(key_salt),
            };
            Ok((record, key))
        })
        .await?
    }

    /// Compare `pin` against a stored hash in constant time
    pub async fn verify(&self, pin: &str, hash_hex: &str, salt_hex: &str) -> Result<bool> {
        let expected = decode_hex("PIN hash", hash_hex)?;
        let salt = decode_hex("PIN salt", salt_hex)?;
        let pin = Zeroizing::new(pin.to_string());
        let iterations = self.params.pbkdf2_iterations;

        tokio::task::spawn_blocking(move || {
            let actual = hash_pin(pin.as_bytes(), &salt, iterations);
            bool::from(actual.as_slice().ct_eq(&expected))
        })
        .await
        .map_err(VaultError::from)
    }

    /// Derive the sealing key for `pin` under a stored key salt
    pub async fn derive_key(&self, pin: &str, key_salt_hex: &str) -> Result<VaultKey> {
        let key_salt = decode_hex("key salt", key_salt_hex)?;
        let pin = Zeroizing::new(pin.to_string());
        let params = self.params.clone();

        tokio::task::spawn_blocking(move || derive_sealing_key(pin.as_bytes(), &key_salt, &params))
            .await?
    }

    /// Derive a sealing key under a fresh salt, returning the hex salt
    pub async fn new_key(&self, pin: &str) -> Result<(String, VaultKey)> {
        let mut key_salt = [0u8; KEY_SALT_LEN];
        OsRng.fill_bytes(&mut key_salt);
        let key = self.derive_key(pin, &hex::encode(key_salt)).await?;
        Ok((hex::encode(key_salt), key))
    }
}

fn decode_hex(what: &str, value: &str) -> Result<Vec<u8>> {
    hex::decode(value).map_err(|_| VaultError::StorageFailure(format!("Stored {} is corrupt", what)))
}

/// PBKDF2-HMAC-SHA256 over the PIN
fn hash_pin(pin: &[u8], salt: &[u8], iterations: u32) -> Zeroizing<[u8; HASH_LEN]> {
    let mut out = Zeroizing::new([0u8; HASH_LEN]);
    pbkdf2_hmac::<Sha256>(pin, salt, iterations, &mut out[..]);
    out
}

/// Argon2id over the PIN, producing the secret-sealing key
fn derive_sealing_key(pin: &[u8], salt: &[u8], params: &KdfParams) -> Result<VaultKey> {
    let argon_params = Params::new(
        params.argon2_memory_kib,
        params.argon2_iterations,
        params.argon2_parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| VaultError::Crypto(format!("Invalid Argon2 parameters: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);
    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(pin, salt, &mut key)
        .map_err(|e| VaultError::Crypto(format!("Key derivation failed: {}", e)))?;

    let vault_key = VaultKey::new(key);
    key.zeroize();
    Ok(vault_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PinHasher {
        PinHasher::new(KdfParams::testing())
    }

    #[test]
    fn test_validate_pin() {
        for ok in ["1234", "12345", "123456", "0000"] {
            assert!(validate_pin(ok).is_ok(), "{} should be accepted", ok);
        }
        for bad in ["", "123", "1234567", "12a4", "12 34", "١٢٣٤"] {
            assert!(
                matches!(validate_pin(bad), Err(VaultError::InvalidPinFormat { .. })),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_hash_is_hex_256_bits() {
        let hash = hash_pin(b"1234", &[7u8; PIN_SALT_LEN], 10);
        assert_eq!(hex::encode(hash.as_slice()).len(), 64);
    }

    #[test]
    fn test_hash_depends_on_salt_and_pin() {
        let a = hash_pin(b"1234", &[1u8; PIN_SALT_LEN], 10);
        let b = hash_pin(b"1234", &[2u8; PIN_SALT_LEN], 10);
        let c = hash_pin(b"1235", &[1u8; PIN_SALT_LEN], 10);
        assert_ne!(a.as_slice(), b.as_slice());
        assert_ne!(a.as_slice(), c.as_slice());
        assert_eq!(a.as_slice(), hash_pin(b"1234", &[1u8; PIN_SALT_LEN], 10).as_slice());
    }

    #[test]
    fn test_production_iterations() {
        // One derivation at the real cost; the vault tests use the cheap profile
        let salt = [9u8; PIN_SALT_LEN];
        let slow = hash_pin(b"246810", &salt, PBKDF2_ITERATIONS);
        assert_ne!(slow.as_slice(), hash_pin(b"246810", &salt, 1_000).as_slice());
        assert_eq!(KdfParams::default().pbkdf2_iterations, 100_000);
    }

    #[tokio::test]
    async fn test_enroll_then_verify() {
        let hasher = hasher();
        let (record, key) = hasher.enroll("4321").await.unwrap();

        assert_eq!(record.salt.len(), PIN_SALT_LEN * 2);
        assert_eq!(record.key_salt.len(), KEY_SALT_LEN * 2);
        assert!(hasher.verify("4321", &record.hash, &record.salt).await.unwrap());
        assert!(!hasher.verify("4322", &record.hash, &record.salt).await.unwrap());

        let again = hasher.derive_key("4321", &record.key_salt).await.unwrap();
        assert_eq!(again.as_bytes(), key.as_bytes());
        let other = hasher.derive_key("9999", &record.key_salt).await.unwrap();
        assert_ne!(other.as_bytes(), key.as_bytes());
    }

    #[tokio::test]
    async fn test_enroll_rejects_bad_pin() {
        assert!(hasher().enroll("12").await.is_err());
    }

    #[tokio::test]
    async fn test_corrupt_stored_hash() {
        let result = hasher().verify("1234", "zz-not-hex", "00").await;
        assert!(matches!(result, Err(VaultError::StorageFailure(_))));
    }
}
