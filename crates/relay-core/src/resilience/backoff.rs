//! Backoff calculator: how long to wait before the next retry.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Exponential backoff settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    #[serde(rename = "initial_delay_ms", with = "crate::duration_ms")]
    pub initial_delay: Duration,

    /// Growth factor per attempt.
    pub multiplier: f64,

    /// Upper bound applied before jitter.
    #[serde(rename = "max_delay_ms", with = "crate::duration_ms")]
    pub max_delay: Duration,

    /// Inflate each delay by a uniform 0-50% to spread out retry storms.
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl BackoffConfig {
    /// No waiting at all. Useful for tests and for queues driven purely by
    /// external triggers.
    pub fn immediate() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// `min(initial_delay * multiplier^attempt, max_delay)`, without jitter.
    ///
    /// `attempt` is zero-based: the first retry uses `attempt = 0`.
    ///
    /// Example with initial=1s, multiplier=2.0, max=30s:
    /// - attempt 0: 1s
    /// - attempt 1: 2s
    /// - attempt 4: 16s
    /// - attempt 5: 30s (capped)
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let max_secs = self.max_delay.as_secs_f64();
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let raw = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);

        let secs = if raw.is_finite() {
            raw.clamp(0.0, max_secs)
        } else {
            max_secs
        };
        Duration::from_secs_f64(secs)
    }
}

/// Delay before retry number `attempt` (zero-based), jittered if enabled.
pub fn delay(attempt: u32, config: &BackoffConfig) -> Duration {
    delay_with_rng(attempt, config, &mut rand::thread_rng())
}

/// Same as [`delay`] with an explicit random source.
pub fn delay_with_rng<R: Rng + ?Sized>(attempt: u32, config: &BackoffConfig, rng: &mut R) -> Duration {
    let base = config.base_delay(attempt);
    if !config.jitter || base.is_zero() {
        return base;
    }

    let factor = 1.0 + rng.gen_range(0.0..0.5);
    base.mul_f64(factor)
}
