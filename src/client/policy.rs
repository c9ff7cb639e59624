//! Reconnect backoff policy.
//!
//! Delay for attempt `n` is `min(base * multiplier^n, max_delay)`. The
//! attempt counter itself lives in the client session; the policy is pure.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default delay before the first reconnect attempt.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1_000);

/// Default growth factor between attempts.
pub const DEFAULT_MULTIPLIER: f64 = 1.5;

/// Default delay ceiling.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);

// ============================================================================
// ReconnectPolicy
// ============================================================================

/// Exponential backoff for reconnect scheduling.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay for attempt 0.
    pub base_delay: Duration,

    /// Growth factor applied per attempt.
    pub multiplier: f64,

    /// Upper bound for any single delay.
    pub max_delay: Duration,

    /// Attempts allowed before giving up.
    ///
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
            max_delay: DEFAULT_MAX_DELAY,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Creates the default policy with a custom base delay.
    #[inline]
    #[must_use]
    pub fn with_base_delay(base_delay: Duration) -> Self {
        Self {
            base_delay,
            ..Self::default()
        }
    }

    /// Sets the delay ceiling.
    #[inline]
    #[must_use]
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Sets the growth factor.
    #[inline]
    #[must_use]
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Caps the number of attempts.
    #[inline]
    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Computes the delay before reconnect attempt `attempt`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);

        if scaled.is_nan() || scaled >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        // Unvalidated multipliers can go negative
        if scaled < 0.0 {
            return self.base_delay.min(self.max_delay);
        }

        Duration::from_secs_f64(scaled)
    }

    /// Returns `true` if attempt `attempt` may still be scheduled.
    #[inline]
    #[must_use]
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt < max)
    }

    /// Validates the policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base delay is zero, the multiplier
    /// is below 1 or not finite, or the ceiling is lower than the base delay.
    pub fn validate(&self) -> Result<()> {
        if self.base_delay.is_zero() {
            return Err(Error::config(
                "Reconnect base delay must be greater than zero",
            ));
        }

        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(Error::config(format!(
                "Reconnect multiplier must be a finite value >= 1.0, got {}",
                self.multiplier
            )));
        }

        if self.max_delay < self.base_delay {
            return Err(Error::config(format!(
                "Reconnect max delay ({}ms) is lower than base delay ({}ms)",
                self.max_delay.as_millis(),
                self.base_delay.as_millis()
            )));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_default_policy() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.multiplier, 1.5);
        assert_eq!(policy.max_delay, Duration::from_secs(30));
        assert_eq!(policy.max_attempts, None);
    }

    #[test]
    fn test_delay_sequence() {
        let policy = ReconnectPolicy::default();

        assert_eq!(policy.delay(0), Duration::from_millis(1_000));
        assert_eq!(policy.delay(1), Duration::from_millis(1_500));
        assert_eq!(policy.delay(2), Duration::from_millis(2_250));
        assert_eq!(policy.delay(3), Duration::from_micros(3_375_000));
    }

    #[test]
    fn test_delay_caps_at_ceiling() {
        let policy = ReconnectPolicy::default();

        // 1.5^9 ~ 38.4, above the 30s ceiling
        assert_eq!(policy.delay(9), Duration::from_secs(30));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_allows() {
        assert!(ReconnectPolicy::default().allows(u32::MAX - 1));

        let capped = ReconnectPolicy::default().max_attempts(3);
        assert!(capped.allows(2));
        assert!(!capped.allows(3));
    }

    #[test]
    fn test_validate() {
        assert!(ReconnectPolicy::default().validate().is_ok());
        assert!(ReconnectPolicy::default().multiplier(0.5).validate().is_err());
        assert!(
            ReconnectPolicy::with_base_delay(Duration::from_secs(60))
                .validate()
                .is_err()
        );

        let zero = ReconnectPolicy::with_base_delay(Duration::ZERO);
        let err = zero.validate().unwrap_err();
        assert!(err.to_string().contains("base delay must be greater than zero"));
    }

    #[test]
    fn test_delay_with_negative_multiplier_stays_in_range() {
        let policy = ReconnectPolicy::default().multiplier(-2.0);

        for attempt in 0..8 {
            let delay = policy.delay(attempt);
            assert!(delay <= policy.max_delay);
        }
        assert_eq!(policy.delay(1), policy.base_delay);
    }

    proptest! {
        #[test]
        fn prop_delay_matches_formula(base_ms in 1u64..10_000, attempt in 0u32..64) {
            let policy = ReconnectPolicy::with_base_delay(Duration::from_millis(base_ms));
            let expected_ms = (base_ms as f64 * 1.5f64.powi(attempt as i32)).min(30_000.0);
            let actual_ms = policy.delay(attempt).as_secs_f64() * 1_000.0;

            prop_assert!((actual_ms - expected_ms).abs() < 1e-3);
        }

        #[test]
        fn prop_delay_is_monotonic(base_ms in 1u64..30_000, attempt in 0u32..128) {
            let policy = ReconnectPolicy::with_base_delay(Duration::from_millis(base_ms));
            prop_assert!(policy.delay(attempt) <= policy.delay(attempt + 1));
            prop_assert!(policy.delay(attempt) <= policy.max_delay);
        }
    }
}
