//! Backoff configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning for reconnection delays.
///
/// The defaults are the values every tether session uses unless configured
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Upper bound of the random delay after the first failure of an episode.
    pub first_failure_jitter: Duration,
    /// Upper bound of the random delay added to a `Retry-After` hint.
    pub retry_after_jitter: Duration,
    /// Cap for exponential growth.
    pub max_delay: Duration,
    /// Growth factor applied to the previous delay.
    pub multiplier: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            first_failure_jitter: Duration::from_millis(3_000),
            retry_after_jitter: Duration::from_millis(5_000),
            max_delay: Duration::from_millis(300_000),
            multiplier: 2,
        }
    }
}

impl BackoffConfig {
    /// Create the default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the first-failure jitter window.
    #[must_use]
    pub fn first_failure_jitter(mut self, d: Duration) -> Self {
        self.first_failure_jitter = d;
        self
    }

    /// Set the jitter added to `Retry-After` hints.
    #[must_use]
    pub fn retry_after_jitter(mut self, d: Duration) -> Self {
        self.retry_after_jitter = d;
        self
    }

    /// Set the maximum computed delay.
    #[must_use]
    pub fn max_delay(mut self, d: Duration) -> Self {
        self.max_delay = d;
        self
    }

    /// Set the growth factor.
    #[must_use]
    pub fn multiplier(mut self, m: u32) -> Self {
        self.multiplier = m;
        self
    }
}
