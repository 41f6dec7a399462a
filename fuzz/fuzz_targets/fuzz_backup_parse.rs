#![no_main]

use libfuzzer_sys::fuzz_target;
use mivida_core::BackupFile;

fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };

    // Parsing must never panic
    if let Ok(backup) = BackupFile::parse(json) {
        assert!(!backup.version.trim().is_empty());
        assert!(backup.accounts.iter().all(|a| !a.encrypted));

        // A parsed backup serializes back to an accepted one
        let reserialized = backup.to_json().unwrap();
        let reparsed = BackupFile::parse(&reserialized).unwrap();
        assert_eq!(reparsed.accounts.len(), backup.accounts.len());
        assert_eq!(reparsed.auto_lock_time(), backup.auto_lock_time());
    }
});
