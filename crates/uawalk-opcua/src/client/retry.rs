// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connect retry policy with exponential backoff and jitter.
//!
//! ```text
//! attempt 1 ──✗── wait initial ──▶ attempt 2 ──✗── wait initial*m ──▶ ...
//!                                     delays capped at max_delay, ± jitter
//! ```

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, OpcUaError};

// =============================================================================
// RetryConfig
// =============================================================================

/// Retry policy for the initial connect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt (0 = no retries).
    pub max_retries: u32,

    /// Delay before the first retry.
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Upper bound for any single delay.
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// Growth factor between consecutive delays.
    pub multiplier: f64,

    /// Jitter as a fraction of the delay (0.0 to 1.0).
    pub jitter: f64,
}

impl RetryConfig {
    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Creates a configuration with exponential backoff and no jitter.
    pub fn exponential(max_retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
            multiplier: 2.0,
            jitter: 0.0,
        }
    }

    /// Sets the jitter factor.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Sets the multiplier.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Returns the backoff calculator for this policy.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(self.initial_delay, self.max_delay)
            .with_multiplier(self.multiplier)
            .with_jitter(self.jitter)
    }

    /// Total number of connect attempts allowed.
    #[inline]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Validates this policy.
    pub fn validate(&self) -> Result<(), OpcUaError> {
        if self.multiplier < 1.0 {
            return Err(OpcUaError::configuration(ConfigurationError::invalid_retry(
                format!("multiplier must be at least 1.0, got {}", self.multiplier),
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(OpcUaError::configuration(ConfigurationError::invalid_retry(
                format!("jitter must be within 0.0..=1.0, got {}", self.jitter),
            )));
        }
        if self.max_delay < self.initial_delay {
            return Err(OpcUaError::configuration(ConfigurationError::invalid_retry(
                "max_delay must not be shorter than initial_delay",
            )));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

// =============================================================================
// ExponentialBackoff
// =============================================================================

/// Exponential backoff with optional jitter.
///
/// Delay for attempt `n` (0-based) is `initial_delay * multiplier^n`, capped at
/// `max_delay`, then shifted by up to `± jitter_factor` of itself.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Initial delay for the first retry.
    pub initial_delay: Duration,
    /// Maximum delay cap.
    pub max_delay: Duration,
    /// Multiplier for each attempt.
    pub multiplier: f64,
    /// Jitter factor (0.0 = none).
    pub jitter_factor: f64,
}

impl ExponentialBackoff {
    /// Creates a backoff with multiplier 2.0 and no jitter.
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }

    /// Sets the multiplier.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the jitter factor.
    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    /// Calculates the delay for the given attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = base.min(self.max_delay.as_secs_f64());

        let final_delay = if self.jitter_factor > 0.0 && capped > 0.0 {
            let jitter_range = capped * self.jitter_factor;
            let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
            (capped + jitter).max(0.0)
        } else {
            capped
        };

        Duration::from_secs_f64(final_delay)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        RetryConfig::default().backoff()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(10));

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(2), Duration::from_millis(400));
        assert_eq!(backoff.delay(3), Duration::from_millis(800));
    }

    #[test]
    fn test_exponential_backoff_cap() {
        let backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(30));

        assert_eq!(backoff.delay(4), Duration::from_secs(16));
        assert_eq!(backoff.delay(5), Duration::from_secs(30));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(30))
            .with_jitter(0.1);

        for _ in 0..100 {
            let delay = backoff.delay(0).as_secs_f64();
            assert!((0.9..=1.1).contains(&delay), "delay {delay} outside jitter band");
        }
    }

    #[test]
    fn test_default_policy() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.max_attempts(), 6);
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(RetryConfig::default().with_multiplier(0.5).validate().is_err());
        assert!(RetryConfig::default().with_jitter(1.5).validate().is_err());
        assert!(
            RetryConfig::exponential(3, Duration::from_secs(10), Duration::from_secs(1))
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_deserialize_humantime() {
        let config: RetryConfig =
            serde_json::from_str(r#"{"max_retries": 2, "initial_delay": "250ms"}"#).unwrap();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.initial_delay, Duration::from_millis(250));
        assert_eq!(config.max_delay, Duration::from_secs(30));
    }
}
