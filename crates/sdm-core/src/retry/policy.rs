//! Exponential backoff with cap and jitter.

use crate::config::RetrySection;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    /// Relative jitter: the delay is scaled by `1 ± jitter_factor`.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl From<&RetrySection> for RetryConfig {
    fn from(s: &RetrySection) -> Self {
        Self {
            max_retries: s.max_retries,
            base_delay: Duration::from_millis(s.base_delay_ms),
            max_delay: Duration::from_millis(s.max_delay_ms),
            backoff_factor: s.backoff_factor,
            jitter_factor: s.jitter_factor,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based):
    /// `min(base · factor^(attempt-1), max) · (1 ± jitter)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32);
        let raw = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exp as i32);
        let capped = raw.min(self.max_delay.as_secs_f64());
        let jitter = 1.0 + self.jitter_factor * (rand::random::<f64>() * 2.0 - 1.0);
        Duration::from_secs_f64((capped * jitter).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter() -> RetryConfig {
        RetryConfig {
            jitter_factor: 0.0,
            ..RetryConfig::default()
        }
    }

    #[test]
    fn backoff_grows_exponentially() {
        let p = no_jitter();
        assert_eq!(p.delay_for(1), Duration::from_millis(500));
        assert_eq!(p.delay_for(2), Duration::from_millis(1000));
        assert_eq!(p.delay_for(3), Duration::from_millis(2000));
    }

    #[test]
    fn backoff_is_capped() {
        let p = no_jitter();
        assert_eq!(p.delay_for(30), p.max_delay);
    }

    #[test]
    fn jitter_stays_in_band() {
        let p = RetryConfig {
            jitter_factor: 0.5,
            ..RetryConfig::default()
        };
        for _ in 0..50 {
            let d = p.delay_for(1).as_secs_f64();
            assert!((0.25..=0.75).contains(&d), "delay {d} out of band");
        }
    }

    #[test]
    fn from_config_section() {
        let section = crate::config::RetrySection {
            max_retries: 2,
            base_delay_ms: 100,
            max_delay_ms: 400,
            backoff_factor: 3.0,
            jitter_factor: 0.0,
        };
        let p = RetryConfig::from(&section);
        assert_eq!(p.delay_for(1), Duration::from_millis(100));
        assert_eq!(p.delay_for(2), Duration::from_millis(300));
        assert_eq!(p.delay_for(3), Duration::from_millis(400));
    }
}
