//! Retry policy for retryable send failures.

use queue_config_and_utils::Config;
use rand::Rng;
use std::time::Duration;

/// Exponential backoff with a cap.
///
/// Delay for the nth consecutive failure is `initial_delay * 2^(n - 1)`,
/// capped at `max_delay`. With jitter enabled the delay is drawn uniformly
/// from the upper half of that value, so it never exceeds the cap:
/// - 1st retry: 1s
/// - 2nd retry: 2s
/// - 3rd retry: 4s
/// - ... up to 60s max
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Retries allowed after the first attempt before the request is
    /// treated as terminally failed.
    pub max_retries: u32,
    /// Randomize each delay.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(60000),
            max_retries: 10,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            initial_delay: config.initial_retry_delay(),
            max_delay: config.max_retry_delay(),
            max_retries: config.max_retries,
            jitter: true,
        }
    }

    /// Backoff without randomization.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Whether a request that has failed `failures` times may be sent again.
    pub fn should_retry(&self, failures: u32) -> bool {
        failures <= self.max_retries
    }

    /// Delay before retrying after the `failures`th consecutive failure.
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        let base = self
            .initial_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);

        if !self.jitter || base.is_zero() {
            return base;
        }

        let half = base / 2;
        let spread = base - half;
        half + spread.mul_f64(rand::thread_rng().gen_range(0.0..=1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_until_capped() {
        let policy = RetryPolicy::default().without_jitter();

        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(6), Duration::from_secs(32));
        assert_eq!(policy.delay_for(7), Duration::from_secs(60));
        assert_eq!(policy.delay_for(200), Duration::from_secs(60));
    }

    #[test]
    fn jitter_stays_within_upper_half() {
        let policy = RetryPolicy::default();
        for failures in 1..12 {
            let capped = policy.clone().without_jitter().delay_for(failures);
            let delay = policy.delay_for(failures);
            assert!(delay <= capped, "{delay:?} > {capped:?}");
            assert!(delay >= capped / 2, "{delay:?} < half of {capped:?}");
        }
    }

    #[test]
    fn retries_until_budget_exhausted() {
        let policy = RetryPolicy {
            max_retries: 2,
            ..RetryPolicy::default()
        };
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn built_from_config() {
        let mut config = Config::new();
        config.initial_retry_delay_ms = 250;
        config.max_retry_delay_ms = 1000;
        config.max_retries = 3;

        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.initial_delay, Duration::from_millis(250));
        assert_eq!(policy.max_delay, Duration::from_secs(1));
        assert_eq!(policy.max_retries, 3);
        assert!(policy.jitter);
    }
}
