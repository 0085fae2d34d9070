//! Stage retry backoff.

use std::time::Duration;

use rand::Rng;

/// Backoff policy for stage retries.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the initial attempt
    pub max_retries: u32,
    /// Base delay; doubles per attempt
    pub base_delay: Duration,
    /// Delay cap
    pub max_delay: Duration,
    /// Jitter fraction applied symmetrically (0.25 = +/-25%)
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            jitter: 0.25,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Deterministic delay for an attempt (1-based), before jitter.
    fn raw_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(2u32.saturating_pow(exp))
            .min(self.max_delay)
    }

    /// Delay for an attempt with jitter applied.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let raw = self.raw_delay(attempt);
        if self.jitter <= 0.0 {
            return raw;
        }
        let factor = 1.0 + rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        raw.mul_f64(factor.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_and_cap() {
        let config = RetryConfig {
            jitter: 0.0,
            ..Default::default()
        };
        assert_eq!(config.raw_delay(1), Duration::from_secs(2));
        assert_eq!(config.raw_delay(2), Duration::from_secs(4));
        assert_eq!(config.raw_delay(3), Duration::from_secs(8));
        assert_eq!(config.raw_delay(5), Duration::from_secs(30));
        assert_eq!(config.raw_delay(16), Duration::from_secs(30));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let config = RetryConfig::default();
        for attempt in 1..=4 {
            let raw = config.raw_delay(attempt).as_secs_f64();
            for _ in 0..100 {
                let jittered = config.delay_for_attempt(attempt).as_secs_f64();
                assert!(jittered >= raw * 0.74, "too short: {jittered} vs {raw}");
                assert!(jittered <= raw * 1.26, "too long: {jittered} vs {raw}");
            }
        }
    }
}
