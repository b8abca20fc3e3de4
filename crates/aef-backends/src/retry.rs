use std::time::Duration;

use rand::Rng;

/// Exponential backoff with a cap and fractional jitter.
///
/// The delay before retry `n` (0-indexed) is
/// `min(backoff_factor * 2^n, max_delay)`, perturbed by up to
/// `jitter * delay` in either direction to avoid thundering herds.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retry attempts after the initial one (0 = no retry)
    pub max_retries: u32,
    /// Base delay multiplier
    pub backoff_factor: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Fractional jitter in [0, 1]
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_factor: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Policy with no retries at all
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before the given 0-indexed retry attempt
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.backoff_factor.as_secs_f64() * 2f64.powi(attempt.min(63) as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        let delayed = if self.jitter > 0.0 && capped > 0.0 {
            let range = capped * self.jitter;
            capped + rand::rng().random_range(-range..=range)
        } else {
            capped
        };

        Duration::from_secs_f64(delayed.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(factor_ms: u64, max_ms: u64, jitter: f64) -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            backoff_factor: Duration::from_millis(factor_ms),
            max_delay: Duration::from_millis(max_ms),
            jitter,
        }
    }

    #[test]
    fn delay_doubles_per_attempt() {
        let policy = policy(1000, 60_000, 0.0);

        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(2), Duration::from_secs(4));
        assert_eq!(policy.delay(3), Duration::from_secs(8));
    }

    #[test]
    fn delay_scales_with_backoff_factor() {
        let policy = policy(500, 60_000, 0.0);

        assert_eq!(policy.delay(0), Duration::from_millis(500));
        assert_eq!(policy.delay(1), Duration::from_millis(1000));
        assert_eq!(policy.delay(2), Duration::from_millis(2000));
    }

    #[test]
    fn delay_is_capped_at_max() {
        let policy = policy(1000, 5000, 0.0);

        // Uncapped this would be 2^10 seconds
        assert_eq!(policy.delay(10), Duration::from_secs(5));
    }

    #[test]
    fn jitter_stays_within_range_and_varies() {
        let policy = policy(1000, 60_000, 0.5);

        let delays: Vec<Duration> = (0..100).map(|_| policy.delay(0)).collect();

        for delay in &delays {
            let secs = delay.as_secs_f64();
            assert!((0.5..=1.5).contains(&secs), "delay {} out of range", secs);
        }

        let distinct: std::collections::HashSet<u128> =
            delays.iter().map(|d| d.as_nanos()).collect();
        assert!(distinct.len() > 1);
    }

    #[test]
    fn default_matches_documented_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.backoff_factor, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
        assert_eq!(policy.jitter, 0.1);
    }
}
