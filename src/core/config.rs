//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for a [`Retrier`](crate::Retrier).
//!
//! Config is used in two ways:
//! 1. **Retrier creation**: `Retrier::new(config)` / `Retrier::builder(config)`
//! 2. **Policy defaults**: `Retrier::submit_with_defaults(op)` uses [`Config::policy`]
//!
//! ## Sentinel values
//! - `max_concurrent = 0` → unlimited (no global semaphore created)
//! - `bus_capacity = 0` → clamped to 1

use crate::policies::RetryPolicy;

/// Global configuration for the retry runtime.
///
/// ## Field semantics
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
/// - `max_concurrent`: Limit on attempts in flight across all runs (`0` = unlimited)
/// - `policy`: Default policy for [`Retrier::submit_with_defaults`](crate::Retrier::submit_with_defaults)
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow receivers that lag behind more than `bus_capacity` messages will
    /// receive `Lagged` and skip older items.
    pub bus_capacity: usize,

    /// Maximum number of attempts executing concurrently across all runs.
    ///
    /// - `0` = unlimited (no semaphore)
    /// - `n > 0` = a run waits (cancellably) for a permit before each attempt
    pub max_concurrent: usize,

    /// Default retry policy.
    pub policy: RetryPolicy,
}

impl Config {
    /// Returns the global concurrency limit as an `Option`.
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        if self.max_concurrent == 0 {
            None
        } else {
            Some(self.max_concurrent)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `max_concurrent = 0` (unlimited)
    /// - `policy = RetryPolicy::default()` (one attempt, no delay)
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            max_concurrent: 0,
            policy: RetryPolicy::default(),
        }
    }
}
