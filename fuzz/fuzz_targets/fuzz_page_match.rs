#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mivida_core::{matches_page, should_show, Account, FloatingWindowDelay};

#[derive(Arbitrary, Debug)]
struct Input {
    domain: Option<String>,
    url: Option<String>,
    page_url: String,
    page_domain: String,
    delay: String,
    last_copy_time: Option<i64>,
    now_ms: i64,
}

fuzz_target!(|input: Input| {
    let account = Account {
        id: "fuzz".to_string(),
        name: "fuzz".to_string(),
        domain: input.domain,
        url: input.url,
        secret: "JBSWY3DPEHPK3PXP".to_string(),
        description: None,
        floating_window_delay: input
            .delay
            .parse::<FloatingWindowDelay>()
            .unwrap_or_default(),
        last_copy_time: input.last_copy_time,
        is_decoy: false,
        encrypted: false,
        created_at: None,
    };

    // Matching and the cooldown must never panic
    let matched = matches_page(&account, &input.page_url, &input.page_domain);
    let _ = should_show(&account, input.now_ms);

    // An empty page never matches on the domain rule alone
    if account.url.is_none() && input.page_domain.trim().is_empty() {
        assert!(!matched);
    }
});
