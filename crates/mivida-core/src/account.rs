//! OTP account records
//!
//! [`Account`] is the persisted record, serialized with camelCase keys so
//! stored data and backup files share one shape. New accounts are built from
//! an [`AccountDraft`], which normalizes the secret and the domain.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::totp::normalize_secret;

/// When the in-page code window may be offered for an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FloatingWindowDelay {
    /// Never offered
    Disabled,
    /// Offered on every matching page
    #[default]
    Always,
    /// Offered again only after this many minutes since the last copy
    Minutes(u32),
}

impl fmt::Display for FloatingWindowDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FloatingWindowDelay::Disabled => f.write_str("disabled"),
            FloatingWindowDelay::Always => f.write_str("always"),
            FloatingWindowDelay::Minutes(m) => write!(f, "{}", m),
        }
    }
}

impl FromStr for FloatingWindowDelay {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "disabled" => Ok(FloatingWindowDelay::Disabled),
            "always" => Ok(FloatingWindowDelay::Always),
            other => match other.parse::<u32>() {
                Ok(minutes) if minutes > 0 => Ok(FloatingWindowDelay::Minutes(minutes)),
                _ => Err(Error::InvalidAccount(format!(
                    "floating window delay must be 'disabled', 'always' or a positive number of minutes, got '{}'",
                    other
                ))),
            },
        }
    }
}

impl Serialize for FloatingWindowDelay {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FloatingWindowDelay {
    /// Stored values are strings, older data may carry bare numbers.
    /// Anything unrecognized falls back to `Always`.
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
            Other(serde::de::IgnoredAny),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text.parse().unwrap_or_default(),
            Raw::Number(minutes) => u32::try_from(minutes)
                .ok()
                .filter(|m| *m > 0)
                .map(FloatingWindowDelay::Minutes)
                .unwrap_or_default(),
            Raw::Other(_) => FloatingWindowDelay::Always,
        })
    }
}

/// A persisted OTP account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Opaque unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Lowercased site domain used for page matching
    #[serde(default)]
    pub domain: Option<String>,
    /// URL fragment used for page matching, takes priority over the domain
    #[serde(default)]
    pub url: Option<String>,
    /// Base32 secret, or the sealed secret when `encrypted` is set
    pub secret: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub floating_window_delay: FloatingWindowDelay,
    /// Unix milliseconds of the last code copy
    #[serde(default)]
    pub last_copy_time: Option<i64>,
    /// Synthesized by decoy activation
    #[serde(default)]
    pub is_decoy: bool,
    /// `secret` holds sealed ciphertext rather than base32
    #[serde(default)]
    pub encrypted: bool,
    /// ISO-8601 creation time
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Account {
    /// Check the fields every stored or imported record must carry
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidAccount("account id is empty".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(Error::InvalidAccount(format!("account {} has no name", self.id)));
        }
        if self.secret.trim().is_empty() {
            return Err(Error::InvalidAccount(format!("account {} has no secret", self.id)));
        }
        Ok(())
    }

    /// Domain with a leading `www.` removed, for comparisons
    pub fn bare_domain(&self) -> Option<String> {
        self.domain
            .as_deref()
            .map(bare_domain)
            .filter(|d| !d.is_empty())
    }
}

/// Lowercase, trim and strip a leading `www.`
pub fn bare_domain(domain: &str) -> String {
    let lowered = domain.trim().to_lowercase();
    match lowered.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => lowered,
    }
}

fn normalize_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn normalize_domain(value: Option<String>) -> Option<String> {
    normalize_text(value).map(|d| d.to_lowercase())
}

/// User input for a new account
#[derive(Debug, Clone, Default)]
pub struct AccountDraft {
    pub name: String,
    pub secret: String,
    pub domain: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub floating_window_delay: FloatingWindowDelay,
}

impl AccountDraft {
    pub fn new(name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: secret.into(),
            ..Default::default()
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_delay(mut self, delay: FloatingWindowDelay) -> Self {
        self.floating_window_delay = delay;
        self
    }

    /// Validate and normalize into a stored record
    ///
    /// The secret is checked as base32 and stored without whitespace in
    /// uppercase. The domain is lowercased. Blank optional fields become
    /// `None`.
    pub fn into_account(self, id: String, created_at: DateTime<Utc>) -> Result<Account> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::InvalidAccount("account name is required".to_string()));
        }
        if self.secret.trim().is_empty() {
            return Err(Error::InvalidAccount("account secret is required".to_string()));
        }
        let secret = normalize_secret(&self.secret)?;

        Ok(Account {
            id,
            name,
            domain: normalize_domain(self.domain),
            url: normalize_text(self.url),
            secret,
            description: normalize_text(self.description),
            floating_window_delay: self.floating_window_delay,
            last_copy_time: None,
            is_decoy: false,
            encrypted: false,
            created_at: Some(created_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        })
    }
}

/// Edits to an existing account
///
/// `None` leaves a field untouched. For the nullable fields, `Some(None)`
/// clears the value.
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub name: Option<String>,
    pub secret: Option<String>,
    pub domain: Option<Option<String>>,
    pub url: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub floating_window_delay: Option<FloatingWindowDelay>,
}

impl AccountUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.secret.is_none()
            && self.domain.is_none()
            && self.url.is_none()
            && self.description.is_none()
            && self.floating_window_delay.is_none()
    }

    /// Apply every field except the secret
    ///
    /// The secret may have to be sealed, so the caller handles it after
    /// normalizing it with [`AccountUpdate::normalized_secret`].
    pub fn apply_metadata(&self, account: &mut Account) -> Result<()> {
        if let Some(name) = &self.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(Error::InvalidAccount("account name is required".to_string()));
            }
            account.name = name.to_string();
        }
        if let Some(domain) = &self.domain {
            account.domain = normalize_domain(domain.clone());
        }
        if let Some(url) = &self.url {
            account.url = normalize_text(url.clone());
        }
        if let Some(description) = &self.description {
            account.description = normalize_text(description.clone());
        }
        if let Some(delay) = self.floating_window_delay {
            account.floating_window_delay = delay;
        }
        Ok(())
    }

    /// The replacement secret in stored form, if one was given
    pub fn normalized_secret(&self) -> Result<Option<String>> {
        self.secret.as_deref().map(normalize_secret).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_draft_normalizes_fields() {
        let account = AccountDraft::new("  GitHub ", "jbsw y3dp ehpk 3pxp")
            .with_domain(" GitHub.COM ")
            .with_url("   ")
            .into_account("id-1".to_string(), created())
            .unwrap();

        assert_eq!(account.name, "GitHub");
        assert_eq!(account.secret, "JBSWY3DPEHPK3PXP");
        assert_eq!(account.domain.as_deref(), Some("github.com"));
        assert_eq!(account.url, None);
        assert_eq!(account.floating_window_delay, FloatingWindowDelay::Always);
        assert!(!account.is_decoy);
        assert!(!account.encrypted);
        assert_eq!(account.created_at.as_deref(), Some("2024-03-01T12:00:00.000Z"));
    }

    #[test]
    fn test_draft_requires_name_and_secret() {
        let missing_name = AccountDraft::new(" ", "JBSWY3DP").into_account("a".into(), created());
        assert!(matches!(missing_name, Err(Error::InvalidAccount(_))));

        let missing_secret = AccountDraft::new("Site", "").into_account("a".into(), created());
        assert!(matches!(missing_secret, Err(Error::InvalidAccount(_))));

        let bad_secret = AccountDraft::new("Site", "not base32!").into_account("a".into(), created());
        assert!(matches!(bad_secret, Err(Error::InvalidSecret(_))));
    }

    #[test]
    fn test_account_json_shape() {
        let account = AccountDraft::new("Site", "JBSWY3DP")
            .with_delay(FloatingWindowDelay::Minutes(5))
            .into_account("abc".to_string(), created())
            .unwrap();
        let json = serde_json::to_value(&account).unwrap();

        assert_eq!(json["floatingWindowDelay"], "5");
        assert_eq!(json["isDecoy"], false);
        assert!(json["domain"].is_null());
        assert!(json.get("lastCopyTime").is_some());
    }

    #[test]
    fn test_delay_parses_legacy_forms() {
        let parse = |raw: &str| -> FloatingWindowDelay {
            let json = format!(r#"{{"id":"a","name":"n","secret":"JBSWY3DP","floatingWindowDelay":{}}}"#, raw);
            serde_json::from_str::<Account>(&json).unwrap().floating_window_delay
        };

        assert_eq!(parse(r#""disabled""#), FloatingWindowDelay::Disabled);
        assert_eq!(parse(r#""always""#), FloatingWindowDelay::Always);
        assert_eq!(parse(r#""15""#), FloatingWindowDelay::Minutes(15));
        assert_eq!(parse("10"), FloatingWindowDelay::Minutes(10));
        assert_eq!(parse(r#""soon""#), FloatingWindowDelay::Always);
        assert_eq!(parse("0"), FloatingWindowDelay::Always);
        assert_eq!(parse("null"), FloatingWindowDelay::Always);
    }

    #[test]
    fn test_minimal_record_defaults() {
        let account: Account =
            serde_json::from_str(r#"{"id":"a","name":"n","secret":"JBSWY3DP"}"#).unwrap();
        assert_eq!(account.floating_window_delay, FloatingWindowDelay::Always);
        assert_eq!(account.last_copy_time, None);
        assert!(!account.is_decoy);
        assert!(!account.encrypted);
    }

    #[test]
    fn test_delay_from_str_is_strict() {
        assert_eq!("30".parse::<FloatingWindowDelay>().unwrap(), FloatingWindowDelay::Minutes(30));
        assert!("0".parse::<FloatingWindowDelay>().is_err());
        assert!("later".parse::<FloatingWindowDelay>().is_err());
    }

    #[test]
    fn test_validate_rejects_blank_fields() {
        let mut account: Account =
            serde_json::from_str(r#"{"id":"a","name":"n","secret":"JBSWY3DP"}"#).unwrap();
        assert!(account.validate().is_ok());
        account.name = "  ".to_string();
        assert!(account.validate().is_err());
    }

    #[test]
    fn test_update_applies_metadata() {
        let mut account = AccountDraft::new("Old", "JBSWY3DP")
            .with_domain("old.com")
            .with_description("note")
            .into_account("a".into(), created())
            .unwrap();

        let update = AccountUpdate {
            name: Some("New".to_string()),
            domain: Some(Some("NEW.com".to_string())),
            description: Some(None),
            ..Default::default()
        };
        update.apply_metadata(&mut account).unwrap();

        assert_eq!(account.name, "New");
        assert_eq!(account.domain.as_deref(), Some("new.com"));
        assert_eq!(account.description, None);
        assert_eq!(update.normalized_secret().unwrap(), None);
    }

    #[test]
    fn test_bare_domain() {
        assert_eq!(bare_domain("WWW.Example.com"), "example.com");
        assert_eq!(bare_domain("mail.example.com"), "mail.example.com");
    }
}
