//! Exponential reconnect backoff with downward jitter.

use std::time::Duration;

/// Largest jitter fraction accepted. Keeps consecutive uncapped delays
/// strictly increasing: `2 * (1 - 0.45) > 1`.
pub const MAX_JITTER: f64 = 0.45;

/// Reconnect delay parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Upper bound for any delay.
    pub max_delay: Duration,
    /// Growth factor between consecutive delays.
    pub backoff_multiplier: f64,
    /// Fraction of each delay that may be randomly shaved off, clamped to
    /// `0.0..=MAX_JITTER`.
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

/// Stateful delay generator. Call [`Backoff::next_delay`] after each failed
/// attempt and [`Backoff::reset`] after a successful one.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    /// Creates a backoff at its minimum delay.
    #[must_use]
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Number of delays handed out since the last reset.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns the next delay and advances the sequence.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.base_delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);

        let jitter = self.config.jitter.clamp(0.0, MAX_JITTER);
        if jitter == 0.0 {
            return base;
        }
        let shave = jitter * rand::random::<f64>();
        base.mul_f64(1.0 - shave)
    }

    /// Returns to the minimum delay.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    fn base_delay(&self, attempt: u32) -> Duration {
        let max = self.config.max_delay;
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let factor = self.config.backoff_multiplier.max(1.0).powi(exponent);
        let secs = (self.config.initial_delay.as_secs_f64() * factor).min(max.as_secs_f64());
        Duration::try_from_secs_f64(secs).unwrap_or(max)
    }
}
