//! Page matching for the in-page code window

use crate::account::{bare_domain, Account, FloatingWindowDelay};

/// Whether `account` belongs to the page at `page_url` / `page_domain`
///
/// A non-empty account URL is tried first as a case-insensitive substring
/// match in either direction; a hit ends the check. Otherwise the account
/// domain (without `www.`) must equal the page domain or be a dot-bounded
/// suffix of it, in either direction.
pub fn matches_page(account: &Account, page_url: &str, page_domain: &str) -> bool {
    if let Some(url) = account.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        let page_url = page_url.trim().to_lowercase();
        let url = url.to_lowercase();
        if !page_url.is_empty() && (page_url.contains(&url) || url.contains(&page_url)) {
            return true;
        }
    }

    let Some(account_domain) = account.bare_domain() else {
        return false;
    };
    let page_domain = bare_domain(page_domain);
    if page_domain.is_empty() {
        return false;
    }

    account_domain == page_domain
        || page_domain.ends_with(&format!(".{}", account_domain))
        || account_domain.ends_with(&format!(".{}", page_domain))
}

/// Whether the copy cooldown allows offering `account` at `now_ms`
pub fn should_show(account: &Account, now_ms: i64) -> bool {
    match account.floating_window_delay {
        FloatingWindowDelay::Disabled => false,
        FloatingWindowDelay::Always => true,
        FloatingWindowDelay::Minutes(minutes) => match account.last_copy_time {
            None => true,
            Some(last_copy) => now_ms.saturating_sub(last_copy) >= i64::from(minutes) * 60_000,
        },
    }
}

/// Accounts to offer on a page, in stored order
pub fn match_accounts<'a>(
    accounts: &'a [Account],
    page_url: &str,
    page_domain: &str,
    now_ms: i64,
) -> Vec<&'a Account> {
    accounts
        .iter()
        .filter(|account| matches_page(account, page_url, page_domain))
        .filter(|account| should_show(account, now_ms))
        .collect()
}
