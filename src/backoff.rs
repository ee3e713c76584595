//! Retry backoff strategies
//!
//! Delay policies applied between optimistic-concurrency retry attempts.
//! The strategy is pluggable through [`RepositoryConfig`](crate::RepositoryConfig);
//! the default is a uniform random delay, which spreads contending writers
//! across the window instead of re-colliding them in lockstep.

use std::time::Duration;

use rand::Rng;

/// Delay policy between conflict retry attempts
pub trait Backoff: Send + Sync + std::fmt::Debug {
    /// Delay to sleep before retry number `attempt` (first retry = 0)
    fn delay(&self, attempt: u32) -> Duration;
}

/// Uniform random delay within a fixed window, independent of attempt count
#[derive(Debug, Clone)]
pub struct UniformBackoff {
    /// Lower bound of the delay window
    pub min: Duration,

    /// Upper bound of the delay window (inclusive)
    pub max: Duration,
}

impl Default for UniformBackoff {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(50),
            max: Duration::from_millis(500),
        }
    }
}

impl Backoff for UniformBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if min >= max {
            return self.min;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

/// Capped exponential delay with random jitter
///
/// Doubles the window on each attempt up to `cap`, then samples uniformly
/// from the upper half of the window.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Delay window for the first retry
    pub base: Duration,

    /// Largest window any retry may reach
    pub cap: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(50),
            cap: Duration::from_secs(5),
        }
    }
}

impl Backoff for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let base = self.base.as_millis() as u64;
        let cap = self.cap.as_millis() as u64;

        // Saturate the shift so large attempt counts can't overflow
        let window = base
            .checked_shl(attempt.min(32))
            .unwrap_or(cap)
            .min(cap)
            .max(1);

        let jittered = rand::thread_rng().gen_range(window / 2..=window);
        Duration::from_millis(jittered)
    }
}
