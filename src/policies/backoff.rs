//! # Backoff policy for retry delays.
//!
//! [`Backoff`] is the pluggable contract: a pure mapping from the index of the
//! attempt that just failed (0-based) to the delay before the next one.
//! [`BackoffPolicy`] is the built-in implementation:
//! - [`BackoffPolicy::None`] retries immediately;
//! - [`BackoffPolicy::Fixed`] waits a constant delay;
//! - [`BackoffPolicy::Incremental`] waits `first + step × n`, optionally capped;
//! - [`BackoffPolicy::Exponential`] waits `first × factor^n`, capped at `max`.
//!
//! Jitter is applied to the computed base and is never fed back into later
//! calculations: each attempt derives its base from the attempt index alone.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use retryvisor::{Backoff, BackoffPolicy};
//!
//! let backoff = BackoffPolicy::exponential(Duration::from_millis(100), 2.0)
//!     .with_max(Duration::from_secs(10));
//!
//! assert_eq!(backoff.next_delay(0), Duration::from_millis(100));
//! assert_eq!(backoff.next_delay(1), Duration::from_millis(200));
//! // 100ms × 2^10 = 102.4s → capped
//! assert_eq!(backoff.next_delay(10), Duration::from_secs(10));
//! ```

use std::time::Duration;

use crate::error::PolicyError;
use crate::policies::jitter::JitterPolicy;

/// Default cap for exponential growth.
const DEFAULT_EXPONENTIAL_MAX: Duration = Duration::from_secs(30);

/// Computes the delay before the next attempt.
///
/// Implementations must be pure and total: the same index yields the same
/// delay (modulo documented jitter) and no call may fail.
///
/// Any `Fn(u32) -> Duration` is a backoff:
/// ```
/// use std::time::Duration;
/// use retryvisor::Backoff;
///
/// let linear = |attempt: u32| Duration::from_millis(5 * u64::from(attempt));
/// assert_eq!(linear.next_delay(3), Duration::from_millis(15));
/// ```
pub trait Backoff: Send + Sync + 'static {
    /// Delay to wait after the failure of attempt `attempt` (0-based).
    fn next_delay(&self, attempt: u32) -> Duration;
}

impl<F> Backoff for F
where
    F: Fn(u32) -> Duration + Send + Sync + 'static,
{
    fn next_delay(&self, attempt: u32) -> Duration {
        self(attempt)
    }
}

/// Built-in backoff strategies.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum BackoffPolicy {
    /// No delay between attempts.
    #[default]
    None,

    /// Constant delay regardless of attempt index.
    Fixed {
        /// Delay between attempts.
        delay: Duration,
        /// Jitter applied to `delay`.
        jitter: JitterPolicy,
    },

    /// Linearly growing delay: `first + step × attempt`.
    Incremental {
        /// Delay after the first failure.
        first: Duration,
        /// Increment per further failure.
        step: Duration,
        /// Optional ceiling.
        max: Option<Duration>,
        /// Jitter applied to the capped base.
        jitter: JitterPolicy,
    },

    /// Exponentially growing delay: `first × factor^attempt`, capped at `max`.
    Exponential {
        /// Delay after the first failure.
        first: Duration,
        /// Multiplicative growth factor (`>= 1.0`).
        factor: f64,
        /// Ceiling for the delay.
        max: Duration,
        /// Jitter applied to the capped base.
        jitter: JitterPolicy,
    },
}

impl BackoffPolicy {
    /// Constant delay without jitter.
    pub fn fixed(delay: Duration) -> Self {
        BackoffPolicy::Fixed {
            delay,
            jitter: JitterPolicy::None,
        }
    }

    /// `first + step × attempt`, uncapped, without jitter.
    pub fn incremental(first: Duration, step: Duration) -> Self {
        BackoffPolicy::Incremental {
            first,
            step,
            max: None,
            jitter: JitterPolicy::None,
        }
    }

    /// `first × factor^attempt`, capped at 30s, without jitter.
    pub fn exponential(first: Duration, factor: f64) -> Self {
        BackoffPolicy::Exponential {
            first,
            factor,
            max: DEFAULT_EXPONENTIAL_MAX,
            jitter: JitterPolicy::None,
        }
    }

    /// Returns the policy with a delay ceiling (ignored by `None` and `Fixed`).
    pub fn with_max(mut self, ceiling: Duration) -> Self {
        match &mut self {
            BackoffPolicy::Incremental { max, .. } => *max = Some(ceiling),
            BackoffPolicy::Exponential { max, .. } => *max = ceiling,
            BackoffPolicy::None | BackoffPolicy::Fixed { .. } => {}
        }
        self
    }

    /// Returns the policy with the given jitter (ignored by `None`).
    pub fn with_jitter(mut self, policy: JitterPolicy) -> Self {
        match &mut self {
            BackoffPolicy::Fixed { jitter, .. }
            | BackoffPolicy::Incremental { jitter, .. }
            | BackoffPolicy::Exponential { jitter, .. } => *jitter = policy,
            BackoffPolicy::None => {}
        }
        self
    }

    /// Checks parameters that would make the delay ill-defined.
    pub fn validate(&self) -> Result<(), PolicyError> {
        match *self {
            BackoffPolicy::None => Ok(()),
            BackoffPolicy::Fixed { jitter, .. } | BackoffPolicy::Incremental { jitter, .. } => {
                jitter.validate()
            }
            BackoffPolicy::Exponential { factor, jitter, .. } => {
                if !factor.is_finite() || factor < 1.0 {
                    return Err(PolicyError::InvalidFactor { factor });
                }
                jitter.validate()
            }
        }
    }

    /// Un-jittered delay for `attempt`, after applying the ceiling.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        match *self {
            BackoffPolicy::None => Duration::ZERO,
            BackoffPolicy::Fixed { delay, .. } => delay,
            BackoffPolicy::Incremental {
                first, step, max, ..
            } => {
                let base = first.saturating_add(step.saturating_mul(attempt));
                max.map_or(base, |cap| base.min(cap))
            }
            BackoffPolicy::Exponential {
                first, factor, max, ..
            } => {
                let max_secs = max.as_secs_f64();
                let exp = attempt.min(i32::MAX as u32) as i32;
                let unclamped = first.as_secs_f64() * factor.powi(exp);
                if !unclamped.is_finite() || unclamped < 0.0 || unclamped >= max_secs {
                    return max;
                }
                // `max_secs` is rounded; near `Duration::MAX` the conversion can still overflow.
                Duration::try_from_secs_f64(unclamped).map_or(max, |d| d.min(max))
            }
        }
    }

    fn ceiling(&self) -> Option<Duration> {
        match *self {
            BackoffPolicy::Incremental { max, .. } => max,
            BackoffPolicy::Exponential { max, .. } => Some(max),
            BackoffPolicy::None | BackoffPolicy::Fixed { .. } => None,
        }
    }

    fn jitter(&self) -> JitterPolicy {
        match *self {
            BackoffPolicy::None => JitterPolicy::None,
            BackoffPolicy::Fixed { jitter, .. }
            | BackoffPolicy::Incremental { jitter, .. }
            | BackoffPolicy::Exponential { jitter, .. } => jitter,
        }
    }
}

impl Backoff for BackoffPolicy {
    fn next_delay(&self, attempt: u32) -> Duration {
        let jittered = self.jitter().apply(self.base_delay(attempt));
        match self.ceiling() {
            Some(cap) => jittered.min(cap),
            None => jittered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_never_waits() {
        for attempt in [0, 1, 100, u32::MAX] {
            assert_eq!(BackoffPolicy::None.next_delay(attempt), Duration::ZERO);
        }
    }

    #[test]
    fn fixed_is_constant() {
        let policy = BackoffPolicy::fixed(Duration::from_millis(500));
        for attempt in 0..10 {
            assert_eq!(
                policy.next_delay(attempt),
                Duration::from_millis(500),
                "attempt {attempt} should be constant at 500ms"
            );
        }
    }

    #[test]
    fn incremental_grows_linearly_and_caps() {
        let policy =
            BackoffPolicy::incremental(Duration::from_millis(100), Duration::from_millis(50));
        assert_eq!(policy.next_delay(0), Duration::from_millis(100));
        assert_eq!(policy.next_delay(1), Duration::from_millis(150));
        assert_eq!(policy.next_delay(4), Duration::from_millis(300));

        let capped = policy.with_max(Duration::from_millis(200));
        assert_eq!(capped.next_delay(1), Duration::from_millis(150));
        assert_eq!(capped.next_delay(9), Duration::from_millis(200));
    }

    #[test]
    fn incremental_saturates_instead_of_overflowing() {
        let policy = BackoffPolicy::incremental(Duration::MAX, Duration::from_secs(1));
        assert_eq!(policy.next_delay(u32::MAX), Duration::MAX);
    }

    #[test]
    fn exponential_growth_no_jitter() {
        let policy = BackoffPolicy::exponential(Duration::from_millis(100), 2.0);
        assert_eq!(policy.next_delay(0), Duration::from_millis(100));
        assert_eq!(policy.next_delay(1), Duration::from_millis(200));
        assert_eq!(policy.next_delay(2), Duration::from_millis(400));
        assert_eq!(policy.next_delay(3), Duration::from_millis(800));
        assert_eq!(policy.next_delay(4), Duration::from_millis(1600));
    }

    #[test]
    fn exponential_first_exceeds_max() {
        let policy =
            BackoffPolicy::exponential(Duration::from_secs(10), 2.0).with_max(Duration::from_secs(5));
        assert_eq!(policy.next_delay(0), Duration::from_secs(5));
    }

    #[test]
    fn exponential_overflow_clamps_to_max() {
        let policy = BackoffPolicy::exponential(Duration::from_millis(100), 2.0)
            .with_max(Duration::from_secs(10));
        assert_eq!(policy.next_delay(100), Duration::from_secs(10));
        assert_eq!(policy.next_delay(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn exponential_near_duration_max_is_total() {
        let policy =
            BackoffPolicy::exponential(Duration::from_secs(1), 2.0).with_max(Duration::MAX);
        assert_eq!(policy.next_delay(64), Duration::MAX);
        assert_eq!(policy.next_delay(u32::MAX), Duration::MAX);
        assert_eq!(policy.next_delay(63), Duration::from_secs(1 << 63));
        for attempt in 55..70 {
            assert!(policy.next_delay(attempt) <= Duration::MAX);
        }
    }

    #[test]
    fn jitter_never_exceeds_ceiling() {
        let policy = BackoffPolicy::exponential(Duration::from_millis(100), 2.0)
            .with_max(Duration::from_secs(1))
            .with_jitter(JitterPolicy::Proportional { ratio: 0.5 });
        for attempt in 0..20 {
            assert!(policy.next_delay(attempt) <= Duration::from_secs(1));
        }
    }

    #[test]
    fn equal_jitter_keeps_half_of_base() {
        let policy = BackoffPolicy::exponential(Duration::from_millis(100), 2.0)
            .with_jitter(JitterPolicy::Equal);
        for attempt in 0..15 {
            let base = policy.base_delay(attempt);
            let delay = policy.next_delay(attempt);
            assert!(delay >= base / 2, "attempt {attempt}: {delay:?} < half of {base:?}");
            assert!(delay <= base, "attempt {attempt}: {delay:?} > {base:?}");
        }
    }

    #[test]
    fn unjittered_delays_are_repeatable() {
        let policies = [
            BackoffPolicy::fixed(Duration::from_millis(7)),
            BackoffPolicy::incremental(Duration::from_millis(1), Duration::from_millis(3)),
            BackoffPolicy::exponential(Duration::from_millis(10), 1.5),
        ];
        for policy in policies {
            for attempt in 0..12 {
                assert_eq!(policy.next_delay(attempt), policy.next_delay(attempt));
            }
        }
    }

    #[test]
    fn invalid_factor_is_rejected() {
        let shrinking = BackoffPolicy::exponential(Duration::from_millis(100), 0.5);
        assert_eq!(
            shrinking.validate(),
            Err(PolicyError::InvalidFactor { factor: 0.5 })
        );
        let infinite = BackoffPolicy::exponential(Duration::from_millis(100), f64::INFINITY);
        assert!(infinite.validate().is_err());
        assert!(BackoffPolicy::fixed(Duration::ZERO).validate().is_ok());
    }

    #[test]
    fn builders_ignore_inapplicable_knobs() {
        let policy = BackoffPolicy::None
            .with_max(Duration::from_secs(1))
            .with_jitter(JitterPolicy::Full);
        assert_eq!(policy, BackoffPolicy::None);
    }
}
