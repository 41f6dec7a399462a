//! Property-based tests for PIN validation and the failed-attempt policy

use mivida_core::SecurityConfig;
use mivida_vault::auth::{validate_pin, FailedAttemptPolicy, PolicyAction};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum PolicyChange {
    Reset(bool, Option<u32>),
    Decoy(bool, Option<u32>),
    Max(u32),
}

fn arb_change() -> impl Strategy<Value = PolicyChange> {
    prop_oneof![
        (any::<bool>(), proptest::option::of(0u32..10)).prop_map(|(e, m)| PolicyChange::Reset(e, m)),
        (any::<bool>(), proptest::option::of(0u32..10)).prop_map(|(e, m)| PolicyChange::Decoy(e, m)),
        (0u32..10).prop_map(PolicyChange::Max),
    ]
}

fn with_pin() -> SecurityConfig {
    SecurityConfig {
        pin_hash: Some("00".to_string()),
        pin_salt: Some("00".to_string()),
        pin_configured: true,
        ..Default::default()
    }
}

// ============================================
// PIN Format Properties
// ============================================

proptest! {
    /// Exactly 4-6 ASCII digits are accepted
    #[test]
    fn prop_pin_format(pin in "\\PC{0,8}") {
        let expected = (4..=6).contains(&pin.len()) && pin.bytes().all(|b| b.is_ascii_digit());
        prop_assert_eq!(validate_pin(&pin).is_ok(), expected);
    }

    #[test]
    fn prop_digit_pins_accepted(pin in "[0-9]{4,6}") {
        prop_assert!(validate_pin(&pin).is_ok());
    }
}

// ============================================
// Policy Properties
// ============================================

proptest! {
    /// No sequence of setter calls leaves both policies enabled
    #[test]
    fn prop_policies_stay_exclusive(changes in prop::collection::vec(arb_change(), 0..20)) {
        let mut config = with_pin();
        for change in changes {
            let _ = match change {
                PolicyChange::Reset(enabled, max) => {
                    FailedAttemptPolicy::set_reset(&mut config, enabled, max)
                }
                PolicyChange::Decoy(enabled, max) => {
                    FailedAttemptPolicy::set_decoy(&mut config, enabled, max)
                }
                PolicyChange::Max(max) => FailedAttemptPolicy::set_max_attempts(&mut config, max),
            };
            prop_assert!(!(config.reset_on_failed_attempts && config.decoy_mode_enabled));
            prop_assert!(config.max_failed_attempts >= 1);
        }
    }

    /// Nothing fires before the maximum is reached
    #[test]
    fn prop_no_action_below_max(
        max in 1u32..20,
        failed in 0u32..40,
        reset in any::<bool>(),
    ) {
        let mut config = with_pin();
        config.max_failed_attempts = max;
        config.failed_attempts = failed;
        config.reset_on_failed_attempts = reset;
        config.decoy_mode_enabled = !reset;

        let action = FailedAttemptPolicy::evaluate(&config);
        if failed < max {
            prop_assert_eq!(action, PolicyAction::None);
        } else {
            prop_assert_ne!(action, PolicyAction::None);
        }
    }

    /// Without a PIN neither policy can be enabled
    #[test]
    fn prop_policies_need_pin(changes in prop::collection::vec(arb_change(), 0..10)) {
        let mut config = SecurityConfig::default();
        for change in changes {
            let _ = match change {
                PolicyChange::Reset(enabled, max) => {
                    FailedAttemptPolicy::set_reset(&mut config, enabled, max)
                }
                PolicyChange::Decoy(enabled, max) => {
                    FailedAttemptPolicy::set_decoy(&mut config, enabled, max)
                }
                PolicyChange::Max(max) => FailedAttemptPolicy::set_max_attempts(&mut config, max),
            };
        }
        prop_assert!(!config.reset_on_failed_attempts);
        prop_assert!(!config.decoy_mode_enabled);
    }
}
