//! Configuration types for the notification-broker crate
//!
//! This module defines the reconnect backoff policy and the timeouts that
//! bound a connection task's handshake and graceful close.

use rand::Rng;
use std::time::Duration;

use crate::error::BrokerError;

/// Capped exponential backoff with symmetric jitter.
///
/// Attempt `n` (starting at 1) waits `initial_delay * multiplier^(n-1)`,
/// scaled by a random factor in `[1 - jitter, 1 + jitter]` and never more
/// than `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first retry
    /// Default: 1 second
    pub initial_delay: Duration,

    /// Upper bound for any single delay
    /// Default: 30 seconds
    pub max_delay: Duration,

    /// Growth factor between consecutive attempts
    /// Default: 2.0
    pub multiplier: f64,

    /// Relative jitter applied to each delay, in `[0, 1)`
    /// Default: 0.2
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

impl BackoffPolicy {
    /// A policy that always waits `delay`, without jitter.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
            jitter: 0.0,
        }
    }

    /// Delay for `attempt` before jitter is applied.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(64) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        self.capped(secs)
    }

    /// Delay to wait before retry number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter <= 0.0 {
            return base;
        }

        let factor = 1.0 + rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        self.capped(base.as_secs_f64() * factor)
    }

    /// `secs` as a duration, never above `max_delay`. Values past what a
    /// `Duration` holds (the f64 round trip of a huge `max_delay`) saturate.
    fn capped(&self, secs: f64) -> Duration {
        Duration::try_from_secs_f64(secs).map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Validate the policy and return any issues
    pub fn validate(&self) -> Result<(), BrokerError> {
        if self.initial_delay == Duration::ZERO {
            return Err(BrokerError::Configuration(
                "Initial backoff delay must be greater than 0".to_string(),
            ));
        }

        if self.max_delay < self.initial_delay {
            return Err(BrokerError::Configuration(
                "Invalid backoff: max delay must not be less than initial delay".to_string(),
            ));
        }

        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(BrokerError::Configuration(
                "Backoff multiplier must be at least 1.0".to_string(),
            ));
        }

        if !(0.0..1.0).contains(&self.jitter) {
            return Err(BrokerError::Configuration(
                "Backoff jitter must be in [0, 1)".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration for the NotificationBroker
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Reconnect backoff policy
    pub backoff: BackoffPolicy,

    /// Upper bound on a single handshake, whatever the connector does
    /// Default: 10 seconds
    pub handshake_timeout: Duration,

    /// Time allowed for a graceful close when a connection is retired
    /// Default: 2 seconds
    pub close_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            handshake_timeout: Duration::from_secs(10),
            close_timeout: Duration::from_secs(2),
        }
    }
}

impl BrokerConfig {
    /// Create a new BrokerConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a BrokerConfig that retries quickly, for flaky local networks
    pub fn aggressive_reconnect() -> Self {
        Self {
            backoff: BackoffPolicy {
                initial_delay: Duration::from_millis(250),
                max_delay: Duration::from_secs(5),
                multiplier: 1.5,
                jitter: 0.1,
            },
            handshake_timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    /// Create a BrokerConfig that backs off far, to spare a struggling backend
    pub fn conservative() -> Self {
        Self {
            backoff: BackoffPolicy {
                initial_delay: Duration::from_secs(5),
                max_delay: Duration::from_secs(300), // 5 minutes
                multiplier: 2.0,
                jitter: 0.3,
            },
            handshake_timeout: Duration::from_secs(30),
            close_timeout: Duration::from_secs(5),
        }
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<(), BrokerError> {
        self.backoff.validate()?;

        if self.handshake_timeout == Duration::ZERO {
            return Err(BrokerError::Configuration(
                "Handshake timeout must be greater than 0".to_string(),
            ));
        }

        if self.close_timeout == Duration::ZERO {
            return Err(BrokerError::Configuration(
                "Close timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn test_default_config_is_valid() {
        assert!(BrokerConfig::default().validate().is_ok());
        assert!(BrokerConfig::aggressive_reconnect().validate().is_ok());
        assert!(BrokerConfig::conservative().validate().is_ok());
    }

    #[test]
    fn test_base_delay_grows_and_caps() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.base_delay(1), Duration::from_secs(1));
        assert_eq!(policy.base_delay(2), Duration::from_secs(2));
        assert_eq!(policy.base_delay(3), Duration::from_secs(4));
        assert_eq!(policy.base_delay(5), Duration::from_secs(16));
        assert_eq!(policy.base_delay(6), Duration::from_secs(30));
        assert_eq!(policy.base_delay(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_unbounded_max_delay_saturates() {
        let policy = BackoffPolicy {
            max_delay: Duration::MAX,
            jitter: 0.5,
            ..Default::default()
        };
        assert!(policy.validate().is_ok());

        assert_eq!(policy.base_delay(10), Duration::from_secs(512));
        assert_eq!(policy.base_delay(200), Duration::MAX);
        for attempt in [1, 64, 65, 200, u32::MAX] {
            assert!(policy.delay_for_attempt(attempt) >= Duration::from_millis(500));
        }
    }

    #[test]
    fn test_fixed_policy_has_no_jitter() {
        let policy = BackoffPolicy::fixed(Duration::from_millis(500));
        assert!(policy.validate().is_ok());
        for attempt in 1..10 {
            assert_eq!(policy.delay_for_attempt(attempt), Duration::from_millis(500));
        }
    }

    #[rstest]
    #[case::zero_initial(BackoffPolicy { initial_delay: Duration::ZERO, ..Default::default() })]
    #[case::max_below_initial(BackoffPolicy {
        initial_delay: Duration::from_secs(10),
        max_delay: Duration::from_secs(1),
        ..Default::default()
    })]
    #[case::shrinking(BackoffPolicy { multiplier: 0.5, ..Default::default() })]
    #[case::nan_multiplier(BackoffPolicy { multiplier: f64::NAN, ..Default::default() })]
    #[case::full_jitter(BackoffPolicy { jitter: 1.0, ..Default::default() })]
    #[case::negative_jitter(BackoffPolicy { jitter: -0.1, ..Default::default() })]
    fn test_invalid_backoff(#[case] policy: BackoffPolicy) {
        assert!(matches!(
            policy.validate(),
            Err(BrokerError::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_timeouts() {
        let config = BrokerConfig::new().with_handshake_timeout(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = BrokerConfig::new().with_close_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    proptest! {
        #[test]
        fn test_jittered_delay_stays_in_bounds(attempt in 1u32..40, jitter in 0.0f64..0.9) {
            let policy = BackoffPolicy { jitter, ..Default::default() };
            let base = policy.base_delay(attempt).as_secs_f64();
            let delay = policy.delay_for_attempt(attempt).as_secs_f64();

            prop_assert!(delay <= policy.max_delay.as_secs_f64() + 1e-9);
            prop_assert!(delay >= base * (1.0 - jitter) - 1e-9);
        }

        #[test]
        fn test_base_delay_is_monotonic(attempt in 1u32..200) {
            let policy = BackoffPolicy::default();
            prop_assert!(policy.base_delay(attempt) <= policy.base_delay(attempt + 1));
        }
    }
}
