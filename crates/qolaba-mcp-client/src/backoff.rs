//! Retry backoff policy.
//!
//! Exponential delay with jitter: `base * factor^attempt`, capped, then
//! spread by a uniform ±25% so synchronized callers don't retry in lockstep.

use rand::Rng;
use std::time::Duration;

/// Base delay for the first retry.
pub const BASE_DELAY_SECS: f64 = 1.0;

/// Multiplier applied per attempt.
pub const BACKOFF_FACTOR: f64 = 2.0;

/// Ceiling on the delay before jitter.
pub const MAX_DELAY_SECS: f64 = 60.0;

/// Jitter range as a fraction of the capped delay.
const JITTER_FRACTION: f64 = 0.25;

/// Exponential backoff policy.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub base: f64,
    pub factor: f64,
    pub max: f64,
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: BASE_DELAY_SECS,
            factor: BACKOFF_FACTOR,
            max: MAX_DELAY_SECS,
            jitter: true,
        }
    }
}

impl BackoffPolicy {
    /// Policy with jitter disabled, for deterministic tests.
    pub fn without_jitter() -> Self {
        Self {
            jitter: false,
            ..Self::default()
        }
    }

    /// Delay before the retry following `attempt` (0-indexed: the first
    /// retry uses `attempt = 0`). Never negative.
    pub fn delay(&self, attempt: u32) -> Duration {
        let capped = (self.base * self.factor.powi(attempt as i32)).min(self.max);

        let secs = if self.jitter {
            let spread = capped * JITTER_FRACTION;
            capped + rand::thread_rng().gen_range(-spread..=spread)
        } else {
            capped
        };

        Duration::from_secs_f64(secs.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubles_until_cap_without_jitter() {
        let policy = BackoffPolicy::without_jitter();
        assert_eq!(policy.delay(0), Duration::from_secs_f64(1.0));
        assert_eq!(policy.delay(1), Duration::from_secs_f64(2.0));
        assert_eq!(policy.delay(2), Duration::from_secs_f64(4.0));
        assert_eq!(policy.delay(5), Duration::from_secs_f64(32.0));
        // Cap reached
        assert_eq!(policy.delay(6), Duration::from_secs_f64(60.0));
        assert_eq!(policy.delay(7), Duration::from_secs_f64(60.0));
    }

    #[test]
    fn test_jittered_delay_is_bounded() {
        let policy = BackoffPolicy::default();
        for attempt in 0..12 {
            let delay = policy.delay(attempt).as_secs_f64();
            assert!(delay >= 0.0);
            assert!(delay <= MAX_DELAY_SECS * (1.0 + JITTER_FRACTION));
        }
    }

    #[test]
    fn test_jitter_stays_within_quarter_of_capped_value() {
        let policy = BackoffPolicy::default();
        for _ in 0..100 {
            let delay = policy.delay(2).as_secs_f64();
            assert!((3.0..=5.0).contains(&delay), "delay {delay} out of range");
        }
    }
}
