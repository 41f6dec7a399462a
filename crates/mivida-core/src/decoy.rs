//! Decoy account catalog
//!
//! Decoys look like an ordinary account list: well-known services with
//! random but valid base32 secrets, so they produce real-looking codes.

use chrono::{DateTime, SecondsFormat, Utc};
use rand::seq::SliceRandom;
use rand::{CryptoRng, Rng};

use crate::account::{Account, FloatingWindowDelay};
use crate::totp::BASE32_ALPHABET;

/// Length of a synthesized decoy secret in base32 characters
pub const DECOY_SECRET_LEN: usize = 32;

/// A service a decoy account can impersonate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoyTemplate {
    pub name: &'static str,
    pub domain: &'static str,
}

const fn template(name: &'static str, domain: &'static str) -> DecoyTemplate {
    DecoyTemplate { name, domain }
}

/// Services decoys are drawn from
pub const DECOY_CATALOG: &[DecoyTemplate] = &[
    template("Binance", "binance.com"),
    template("Google", "google.com"),
    template("Facebook", "facebook.com"),
    template("Amazon", "amazon.com"),
    template("Microsoft", "microsoft.com"),
    template("Apple ID", "apple.com"),
    template("GitHub", "github.com"),
    template("Twitter", "twitter.com"),
    template("Instagram", "instagram.com"),
    template("LinkedIn", "linkedin.com"),
    template("PayPal", "paypal.com"),
    template("Coinbase", "coinbase.com"),
    template("Kraken", "kraken.com"),
    template("Dropbox", "dropbox.com"),
    template("Spotify", "spotify.com"),
    template("Netflix", "netflix.com"),
    template("Discord", "discord.com"),
    template("Slack", "slack.com"),
    template("Twitch", "twitch.tv"),
    template("Reddit", "reddit.com"),
    template("Steam", "steampowered.com"),
    template("Epic Games", "epicgames.com"),
    template("Adobe", "adobe.com"),
    template("Zoom", "zoom.us"),
    template("WhatsApp", "whatsapp.com"),
    template("Telegram", "telegram.org"),
    template("Bitfinex", "bitfinex.com"),
    template("Bitstamp", "bitstamp.net"),
    template("Gemini", "gemini.com"),
    template("AWS", "aws.amazon.com"),
];

/// A random base32 secret of [`DECOY_SECRET_LEN`] characters
pub fn random_secret<R: Rng + CryptoRng>(rng: &mut R) -> String {
    (0..DECOY_SECRET_LEN)
        .map(|_| BASE32_ALPHABET[rng.gen_range(0..BASE32_ALPHABET.len())] as char)
        .collect()
}

/// Build up to `count` decoy accounts from a shuffled catalog
///
/// Every decoy gets a fresh random identifier, a fresh secret and
/// `is_decoy` set. At most one decoy is produced per catalog entry.
pub fn synthesize_decoys<R: Rng + CryptoRng>(
    rng: &mut R,
    count: usize,
    created_at: DateTime<Utc>,
) -> Vec<Account> {
    let mut catalog: Vec<&DecoyTemplate> = DECOY_CATALOG.iter().collect();
    catalog.shuffle(rng);

    let created_at = created_at.to_rfc3339_opts(SecondsFormat::Millis, true);

    catalog
        .into_iter()
        .take(count)
        .map(|template| Account {
            id: uuid::Uuid::new_v4().to_string(),
            name: template.name.to_string(),
            domain: Some(template.domain.to_string()),
            url: None,
            secret: random_secret(rng),
            description: None,
            floating_window_delay: FloatingWindowDelay::Always,
            last_copy_time: None,
            is_decoy: true,
            encrypted: false,
            created_at: Some(created_at.clone()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::totp::generate;
    use rand::rngs::OsRng;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_has_thirty_unique_services() {
        assert_eq!(DECOY_CATALOG.len(), 30);
        let names: HashSet<_> = DECOY_CATALOG.iter().map(|t| t.name).collect();
        assert_eq!(names.len(), 30);
    }

    #[test]
    fn test_synthesize_full_set() {
        let decoys = synthesize_decoys(&mut OsRng, 30, Utc::now());
        assert_eq!(decoys.len(), 30);

        let ids: HashSet<_> = decoys.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids.len(), 30);

        for decoy in &decoys {
            assert!(decoy.is_decoy);
            assert!(!decoy.encrypted);
            assert_eq!(decoy.secret.len(), DECOY_SECRET_LEN);
            assert!(decoy.validate().is_ok());
            assert_eq!(generate(&decoy.secret, 1_700_000_000).unwrap().len(), 6);
        }
    }

    #[test]
    fn test_count_is_capped_by_catalog() {
        assert_eq!(synthesize_decoys(&mut OsRng, 5, Utc::now()).len(), 5);
        assert_eq!(synthesize_decoys(&mut OsRng, 100, Utc::now()).len(), 30);
        assert!(synthesize_decoys(&mut OsRng, 0, Utc::now()).is_empty());
    }

    #[test]
    fn test_random_secret_alphabet() {
        let secret = random_secret(&mut OsRng);
        assert!(secret.bytes().all(|b| BASE32_ALPHABET.contains(&b)));
    }
}
