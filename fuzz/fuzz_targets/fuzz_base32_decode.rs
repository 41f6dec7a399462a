#![no_main]

use libfuzzer_sys::fuzz_target;
use mivida_core::totp::{decode_base32, generate, normalize_secret, validate_secret};

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    // Decoding arbitrary text must never panic
    if let Ok(bytes) = decode_base32(input) {
        // Five bits per character, leftover bits dropped
        let symbols = input.chars().filter(|c| !c.is_whitespace()).count();
        assert_eq!(bytes.len(), symbols * 5 / 8);
    }

    match normalize_secret(input) {
        Ok(secret) => {
            assert!(validate_secret(input));
            assert_eq!(normalize_secret(&secret).as_ref(), Ok(&secret));

            let code = generate(&secret, 59).unwrap();
            assert_eq!(code.len(), 6);
            assert!(code.bytes().all(|b| b.is_ascii_digit()));
        }
        Err(_) => assert!(!validate_secret(input)),
    }
});
