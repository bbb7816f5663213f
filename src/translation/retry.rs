/*!
 * Retry and backoff policy for translation calls.
 *
 * Transient failures back off exponentially with jitter. Quota failures wait
 * a fixed, longer cool-down and draw on their own retry budget.
 */

use rand::Rng;
use std::time::Duration;

use crate::app_config::RetryConfig;

/// Retry policy applied by the translation client
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries allowed after the first call for transient failures
    pub max_retries: u32,
    /// Retries allowed for quota failures
    pub quota_max_retries: u32,
    /// First backoff delay
    pub base_delay: Duration,
    /// Upper bound for a single backoff delay
    pub max_delay: Duration,
    /// Fixed wait after a quota failure
    pub quota_cooldown: Duration,
    /// Hard deadline for one backend call
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            quota_max_retries: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            quota_cooldown: Duration::from_secs(60),
            call_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Build a policy from configuration values
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            quota_max_retries: config.quota_max_retries,
            base_delay: Duration::from_millis(config.backoff_base_ms),
            max_delay: Duration::from_millis(config.backoff_max_ms),
            quota_cooldown: Duration::from_secs(config.quota_cooldown_secs),
            call_timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// A policy with near-zero waits, for tests and dry runs
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            quota_max_retries: max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            quota_cooldown: Duration::from_millis(1),
            call_timeout: Duration::from_secs(5),
        }
    }

    /// Override the per-call timeout
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Un-jittered delay before transient retry number `retry` (1-based)
    pub fn backoff_ceiling(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        let delay = self.base_delay.saturating_mul(1u32 << exponent);
        delay.min(self.max_delay)
    }

    /// Jittered delay before transient retry number `retry` (1-based)
    ///
    /// The result lies in `[ceiling / 2, ceiling]`.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let ceiling = self.backoff_ceiling(retry);
        let half = ceiling / 2;
        let spread = (ceiling - half).as_millis() as u64;
        let jitter = if spread == 0 {
            0
        } else {
            rand::rng().random_range(0..=spread)
        };
        half + Duration::from_millis(jitter)
    }
}
