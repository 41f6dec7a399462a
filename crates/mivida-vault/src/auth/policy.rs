//! Failed-attempt policy
//!
//! Once failed PIN attempts reach the configured maximum, exactly one of two
//! destructive policies may fire:
//!
//! - Hard reset: every stored key is deleted
//! - Decoy: the account list is replaced with plausible fake accounts,
//!   optionally opening the vault onto them
//!
//! The two are mutually exclusive and both require a configured PIN. The
//! setters here are the only way the flags change.

use mivida_core::{DecoyBehavior, FailurePolicy, SecurityConfig};

use crate::error::{Result, VaultError};

/// Consequence of a failed attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyAction {
    /// Only the counter moved
    None,
    /// Wipe the store
    HardReset,
    /// Replace accounts with decoys; `auto_unlock` opens the vault onto them
    ActivateDecoy { auto_unlock: bool },
}

pub struct FailedAttemptPolicy;

impl FailedAttemptPolicy {
    /// What the already-incremented failure count triggers
    pub fn evaluate(config: &SecurityConfig) -> PolicyAction {
        if config.failed_attempts < config.max_failed_attempts {
            return PolicyAction::None;
        }
        match config.failure_policy() {
            FailurePolicy::Disabled => PolicyAction::None,
            FailurePolicy::HardReset => PolicyAction::HardReset,
            FailurePolicy::Decoy(behavior) => PolicyAction::ActivateDecoy {
                auto_unlock: behavior == DecoyBehavior::Unlocked,
            },
        }
    }

    /// Turn hard reset on or off, optionally changing the maximum
    pub fn set_reset(config: &mut SecurityConfig, enabled: bool, max: Option<u32>) -> Result<()> {
        if enabled {
            Self::require_pin(config)?;
            if config.decoy_mode_enabled {
                return Err(VaultError::ConflictingPolicy);
            }
        }
        Self::apply_max(config, max)?;
        config.reset_on_failed_attempts = enabled;
        Ok(())
    }

    /// Turn decoy mode on or off, optionally changing the maximum
    pub fn set_decoy(config: &mut SecurityConfig, enabled: bool, max: Option<u32>) -> Result<()> {
        if enabled {
            Self::require_pin(config)?;
            if config.reset_on_failed_attempts {
                return Err(VaultError::ConflictingPolicy);
            }
        }
        Self::apply_max(config, max)?;
        config.decoy_mode_enabled = enabled;
        Ok(())
    }

    pub fn set_decoy_behavior(config: &mut SecurityConfig, behavior: DecoyBehavior) {
        config.decoy_behavior = behavior;
    }

    pub fn set_max_attempts(config: &mut SecurityConfig, max: u32) -> Result<()> {
        Self::apply_max(config, Some(max))
    }

    fn apply_max(config: &mut SecurityConfig, max: Option<u32>) -> Result<()> {
        if let Some(max) = max {
            config.max_failed_attempts = SecurityConfig::check_max_failed_attempts(max)?;
        }
        Ok(())
    }

    fn require_pin(config: &SecurityConfig) -> Result<()> {
        if config.is_pin_configured() {
            Ok(())
        } else {
            Err(VaultError::NotConfigured)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_pin() -> SecurityConfig {
        SecurityConfig {
            pin_hash: Some("00".to_string()),
            pin_salt: Some("00".to_string()),
            pin_configured: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_below_threshold_does_nothing() {
        let mut config = with_pin();
        config.reset_on_failed_attempts = true;
        config.failed_attempts = 4;
        assert_eq!(FailedAttemptPolicy::evaluate(&config), PolicyAction::None);
        config.failed_attempts = 5;
        assert_eq!(FailedAttemptPolicy::evaluate(&config), PolicyAction::HardReset);
        config.failed_attempts = 9;
        assert_eq!(FailedAttemptPolicy::evaluate(&config), PolicyAction::HardReset);
    }

    #[test]
    fn test_decoy_actions() {
        let mut config = with_pin();
        config.decoy_mode_enabled = true;
        config.failed_attempts = 5;
        assert_eq!(
            FailedAttemptPolicy::evaluate(&config),
            PolicyAction::ActivateDecoy { auto_unlock: false }
        );
        config.decoy_behavior = DecoyBehavior::Unlocked;
        assert_eq!(
            FailedAttemptPolicy::evaluate(&config),
            PolicyAction::ActivateDecoy { auto_unlock: true }
        );
    }

    #[test]
    fn test_no_policy_only_counts() {
        let mut config = with_pin();
        config.failed_attempts = 50;
        assert_eq!(FailedAttemptPolicy::evaluate(&config), PolicyAction::None);
    }

    #[test]
    fn test_policies_are_exclusive() {
        let mut config = with_pin();
        FailedAttemptPolicy::set_reset(&mut config, true, Some(3)).unwrap();
        assert_eq!(config.max_failed_attempts, 3);

        let err = FailedAttemptPolicy::set_decoy(&mut config, true, None).unwrap_err();
        assert!(matches!(err, VaultError::ConflictingPolicy));
        assert!(!config.decoy_mode_enabled);

        FailedAttemptPolicy::set_reset(&mut config, false, None).unwrap();
        FailedAttemptPolicy::set_decoy(&mut config, true, None).unwrap();
        assert!(matches!(
            FailedAttemptPolicy::set_reset(&mut config, true, None),
            Err(VaultError::ConflictingPolicy)
        ));
    }

    #[test]
    fn test_policies_require_pin() {
        let mut config = SecurityConfig::default();
        assert!(matches!(
            FailedAttemptPolicy::set_decoy(&mut config, true, None),
            Err(VaultError::NotConfigured)
        ));
        // Disabling never needs a PIN
        FailedAttemptPolicy::set_reset(&mut config, false, None).unwrap();
    }

    #[test]
    fn test_max_attempts_must_be_positive() {
        let mut config = with_pin();
        assert!(FailedAttemptPolicy::set_max_attempts(&mut config, 0).is_err());
        assert!(FailedAttemptPolicy::set_reset(&mut config, true, Some(0)).is_err());
        assert!(!config.reset_on_failed_attempts);
        FailedAttemptPolicy::set_max_attempts(&mut config, 1).unwrap();
        assert_eq!(config.max_failed_attempts, 1);
    }
}
