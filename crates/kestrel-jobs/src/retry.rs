//! Retry policy used by the bundled job stores.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry strategy enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    /// No retry.
    None,
    /// Fixed delay between retries.
    Fixed,
    /// Exponential backoff with optional jitter.
    Exponential,
}

/// Decides whether a failed job is retried and after how long.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub strategy: RetryStrategy,

    /// A job that has failed this many times is moved to the dead set.
    pub max_fails: u32,

    /// Initial delay in milliseconds.
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds.
    pub max_delay_ms: u64,

    /// Backoff multiplier (exponential only).
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0); zero disables jitter.
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(4)
    }
}

impl RetryPolicy {
    /// Creates a policy with no retries.
    pub fn none() -> Self {
        Self {
            strategy: RetryStrategy::None,
            max_fails: 0,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            multiplier: 1.0,
            jitter_factor: 0.0,
        }
    }

    /// Creates a fixed delay retry policy.
    pub fn fixed(max_fails: u32, delay: Duration) -> Self {
        let delay_ms = delay.as_millis() as u64;
        Self {
            strategy: RetryStrategy::Fixed,
            max_fails,
            initial_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            multiplier: 1.0,
            jitter_factor: 0.0,
        }
    }

    /// Creates an exponential backoff retry policy.
    pub fn exponential(max_fails: u32) -> Self {
        Self {
            strategy: RetryStrategy::Exponential,
            max_fails,
            initial_delay_ms: 15_000,
            max_delay_ms: 3_600_000,
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Disables jitter.
    pub fn without_jitter(mut self) -> Self {
        self.jitter_factor = 0.0;
        self
    }

    /// True if a job that has now failed `fails` times gets another attempt.
    pub fn should_retry(&self, fails: u32) -> bool {
        self.strategy != RetryStrategy::None && fails < self.max_fails
    }

    /// Delay before the attempt following failure number `fails` (1-based).
    pub fn delay_for(&self, fails: u32) -> Duration {
        if fails == 0 || self.strategy == RetryStrategy::None {
            return Duration::ZERO;
        }

        let base_delay = match self.strategy {
            RetryStrategy::None => 0,
            RetryStrategy::Fixed => self.initial_delay_ms,
            RetryStrategy::Exponential => {
                let exp = i32::try_from(fails - 1).unwrap_or(i32::MAX);
                (self.initial_delay_ms as f64 * self.multiplier.powi(exp)) as u64
            }
        };

        let capped_delay = base_delay.min(self.max_delay_ms);

        let final_delay = if self.jitter_factor > 0.0 {
            let jitter_range = (capped_delay as f64 * self.jitter_factor) as u64;
            capped_delay
                .saturating_add(rand_jitter(jitter_range))
                .saturating_sub(jitter_range / 2)
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay)
    }
}

/// Uniform jitter in `0..range`.
fn rand_jitter(range: u64) -> u64 {
    if range == 0 {
        return 0;
    }
    rand::thread_rng().gen_range(0..range)
}
