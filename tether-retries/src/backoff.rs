//! Reconnection backoff.

use crate::config::BackoffConfig;
use rand::Rng;
use std::time::Duration;
use tracing::trace;

/// Backoff state for one session.
///
/// `reconnect_after` grows across consecutive transient failures and is reset
/// when a stream opens. `min_reconnect_delay` is set by the server's `retry:`
/// field and lasts for the whole session.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    config: BackoffConfig,
    reconnect_after: Duration,
    min_reconnect_delay: Duration,
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

impl ReconnectBackoff {
    /// Create backoff state with the given tuning.
    #[must_use]
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            reconnect_after: Duration::ZERO,
            min_reconnect_delay: Duration::ZERO,
        }
    }

    /// The tuning in use.
    #[must_use]
    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// The delay computed for the most recent failure of this episode.
    #[must_use]
    pub fn reconnect_after(&self) -> Duration {
        self.reconnect_after
    }

    /// The server-declared minimum delay.
    #[must_use]
    pub fn min_reconnect_delay(&self) -> Duration {
        self.min_reconnect_delay
    }

    /// Record a `retry:` value from the stream.
    pub fn set_min_reconnect_delay(&mut self, delay: Duration) {
        self.min_reconnect_delay = delay;
    }

    /// End the failure episode.
    pub fn reset(&mut self) {
        self.reconnect_after = Duration::ZERO;
    }

    /// Compute the delay before the next attempt using the thread-local RNG.
    pub fn next_delay(&mut self, retry_after: Option<Duration>) -> Duration {
        self.next_delay_with(&mut rand::thread_rng(), retry_after)
    }

    /// Compute the delay before the next attempt.
    ///
    /// Updates `reconnect_after` and returns it, raised to the server minimum if
    /// that is longer.
    pub fn next_delay_with<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        retry_after: Option<Duration>,
    ) -> Duration {
        let reconnect_after = match retry_after.filter(|d| !d.is_zero()) {
            Some(hint) => hint.saturating_add(random_up_to(rng, self.config.retry_after_jitter)),
            // No prior delay to build on, so spread clients out instead
            None if self.reconnect_after.is_zero() => {
                random_up_to(rng, self.config.first_failure_jitter)
            }
            None => self
                .reconnect_after
                .saturating_mul(self.config.multiplier)
                .min(self.config.max_delay),
        };
        self.reconnect_after = reconnect_after;

        let delay = reconnect_after.max(self.min_reconnect_delay);
        trace!(
            reconnect_after_ms = reconnect_after.as_millis() as u64,
            min_delay_ms = self.min_reconnect_delay.as_millis() as u64,
            delay_ms = delay.as_millis() as u64,
            "Computed reconnect delay"
        );
        delay
    }
}

/// Uniform whole-millisecond delay in `[0, max]`.
fn random_up_to<R: Rng + ?Sized>(rng: &mut R, max: Duration) -> Duration {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(rng.gen_range(0..=max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_first_failure_within_jitter_window() {
        let mut rng = rng();
        for _ in 0..100 {
            let mut backoff = ReconnectBackoff::default();
            let delay = backoff.next_delay_with(&mut rng, None);
            assert!(delay <= ms(3_000));
            assert_eq!(delay, backoff.reconnect_after());
        }
    }

    #[test]
    fn test_consecutive_failures_double_until_cap() {
        let mut rng = rng();
        let mut backoff = ReconnectBackoff::default();

        let mut previous = backoff.next_delay_with(&mut rng, None);
        let mut ceiling = ms(3_000);
        for _ in 0..20 {
            let delay = backoff.next_delay_with(&mut rng, None);
            ceiling = (ceiling * 2).min(ms(300_000));

            assert!(delay >= previous);
            assert!(delay <= ceiling);
            if !previous.is_zero() {
                assert_eq!(delay, (previous * 2).min(ms(300_000)));
            }
            previous = delay;
        }
    }

    #[test]
    fn test_doubling_is_capped() {
        let mut backoff = ReconnectBackoff::default();
        backoff.reconnect_after = ms(200_000);
        assert_eq!(backoff.next_delay_with(&mut rng(), None), ms(300_000));
        assert_eq!(backoff.next_delay_with(&mut rng(), None), ms(300_000));
    }

    #[test]
    fn test_retry_after_hint_wins() {
        let mut backoff = ReconnectBackoff::default();
        backoff.reconnect_after = ms(100_000);

        let delay = backoff.next_delay_with(&mut rng(), Some(Duration::from_secs(10)));
        assert!(delay >= ms(10_000));
        assert!(delay <= ms(15_000));
        assert_eq!(backoff.reconnect_after(), delay);
    }

    #[test]
    fn test_zero_retry_after_is_ignored() {
        let mut backoff = ReconnectBackoff::default();
        backoff.reconnect_after = ms(1_000);
        assert_eq!(backoff.next_delay_with(&mut rng(), Some(Duration::ZERO)), ms(2_000));
    }

    #[test]
    fn test_min_delay_raises_short_delay() {
        let mut backoff = ReconnectBackoff::default();
        backoff.set_min_reconnect_delay(ms(10_000));

        let delay = backoff.next_delay_with(&mut rng(), None);
        assert_eq!(delay, ms(10_000));
        // The episode state itself is not raised
        assert!(backoff.reconnect_after() <= ms(3_000));
    }

    #[test]
    fn test_min_delay_never_shortens() {
        let mut backoff = ReconnectBackoff::default();
        backoff.reconnect_after = ms(20_000);
        backoff.set_min_reconnect_delay(ms(1_000));
        assert_eq!(backoff.next_delay_with(&mut rng(), None), ms(40_000));
    }

    #[test]
    fn test_reset_restarts_episode() {
        let mut rng = rng();
        let mut backoff = ReconnectBackoff::default();
        backoff.set_min_reconnect_delay(ms(500));
        backoff.reconnect_after = ms(80_000);

        backoff.reset();
        assert_eq!(backoff.reconnect_after(), Duration::ZERO);
        assert_eq!(backoff.min_reconnect_delay(), ms(500));
        assert!(backoff.next_delay_with(&mut rng, None) <= ms(3_000));
    }

    #[test]
    fn test_custom_config() {
        let config = BackoffConfig::new()
            .first_failure_jitter(Duration::ZERO)
            .max_delay(ms(50));
        let mut backoff = ReconnectBackoff::new(config);

        assert_eq!(backoff.next_delay_with(&mut rng(), None), Duration::ZERO);
        backoff.reconnect_after = ms(40);
        assert_eq!(backoff.next_delay_with(&mut rng(), None), ms(50));
    }
}
