//! TOTP code generation (RFC 6238, HMAC-SHA1, 30-second steps, 6 digits)
//!
//! Secrets are RFC 4648 base32 without padding. Whitespace is ignored and
//! lowercase input is accepted. Leftover bits that do not fill a whole byte
//! at the end of the input are discarded.

use chrono::Utc;
use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::error::{Error, Result};
use crate::{CODE_DIGITS, PERIOD_SECS};

type HmacSha1 = Hmac<Sha1>;

/// RFC 4648 base32 alphabet
pub const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Decode a base32 secret into raw key bytes
///
/// Fails with [`Error::InvalidSecret`] on any character outside the
/// alphabet, including `=` padding. The offending character is reported by
/// position only so secret material never reaches logs.
pub fn decode_base32(input: &str) -> Result<Vec<u8>> {
    let mut symbols: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let key_len = symbols.chars().count() * 5 / 8;

    // Complete the last 8-symbol group with zero bits, then keep whole bytes only
    while symbols.len() % 8 != 0 {
        symbols.push('A');
    }

    let mut bytes = BASE32_NOPAD.decode(symbols.as_bytes()).map_err(|e| {
        Error::InvalidSecret(format!(
            "character at position {} is not in the base32 alphabet",
            e.position
        ))
    })?;
    bytes.truncate(key_len);
    Ok(bytes)
}

/// Canonical stored form of a secret: whitespace stripped, uppercased
///
/// Rejects secrets that are not valid base32 or that decode to no key bytes.
pub fn normalize_secret(secret: &str) -> Result<String> {
    let normalized: String = secret
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if decode_base32(&normalized)?.is_empty() {
        return Err(Error::InvalidSecret(
            "secret is too short to produce a key".to_string(),
        ));
    }

    Ok(normalized)
}

/// Whether `secret` would be accepted by [`generate`]
pub fn validate_secret(secret: &str) -> bool {
    normalize_secret(secret).is_ok()
}

/// Generate the 6-digit code for `secret` at `timestamp_secs`
pub fn generate(secret: &str, timestamp_secs: u64) -> Result<String> {
    let key = decode_base32(secret)?;
    if key.is_empty() {
        return Err(Error::InvalidSecret(
            "secret is too short to produce a key".to_string(),
        ));
    }

    let counter = timestamp_secs / PERIOD_SECS;

    let mut mac = <HmacSha1 as Mac>::new_from_slice(&key)
        .map_err(|e| Error::InvalidSecret(e.to_string()))?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    // Dynamic truncation
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);

    let code = binary % 10u32.pow(CODE_DIGITS);
    Ok(format!("{:0width$}", code, width = CODE_DIGITS as usize))
}

/// Generate the code for `secret` at the current system time
pub fn generate_current(secret: &str) -> Result<String> {
    generate(secret, current_unix_secs())
}

/// Seconds until the window containing `timestamp_secs` ends, in `1..=30`
pub fn time_remaining_at(timestamp_secs: u64) -> u64 {
    PERIOD_SECS - timestamp_secs % PERIOD_SECS
}

/// Seconds until the current window ends
pub fn time_remaining() -> u64 {
    time_remaining_at(current_unix_secs())
}

/// Insert a space after the third digit of a 6-digit code
///
/// Codes of any other length are returned unchanged.
pub fn format_code(code: &str) -> String {
    if code.len() == CODE_DIGITS as usize && code.is_ascii() {
        format!("{} {}", &code[..3], &code[3..])
    } else {
        code.to_string()
    }
}

fn current_unix_secs() -> u64 {
    Utc::now().timestamp().max(0) as u64
}
