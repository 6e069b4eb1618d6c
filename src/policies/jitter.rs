//! # Jitter policy for retry delays.
//!
//! [`JitterPolicy`] perturbs a computed backoff delay so that many callers
//! retrying the same dependency do not wake up in lockstep.
//!
//! - [`JitterPolicy::None`]: exact delay
//! - [`JitterPolicy::Full`]: random delay in `[0, delay]`
//! - [`JitterPolicy::Equal`]: `delay/2 + random[0, delay/2]`
//! - [`JitterPolicy::Proportional`]: multiplicative, `delay × random[1 - ratio, 1 + ratio]`
//! - [`JitterPolicy::Additive`]: `delay + random[0, max]`
//!
//! Every variant is stateless: the output of one call never feeds the next one.
//! [`JitterPolicy::bounds`] reports the closed interval a jittered delay falls in.

use rand::Rng;
use std::time::Duration;

use crate::error::PolicyError;

/// Policy controlling randomization of retry delays.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum JitterPolicy {
    /// No jitter: use the exact backoff delay.
    #[default]
    None,

    /// Full jitter: random delay in `[0, delay]`.
    Full,

    /// Equal jitter: `delay/2 + random[0, delay/2]`.
    Equal,

    /// Multiplicative jitter: `delay × random[1 - ratio, 1 + ratio]`.
    ///
    /// `ratio` must lie within `[0.0, 1.0]`.
    Proportional {
        /// Relative spread around the base delay.
        ratio: f64,
    },

    /// Additive jitter: `delay + random[0, max]`.
    Additive {
        /// Upper bound of the added random component.
        max: Duration,
    },
}

impl JitterPolicy {
    /// Applies jitter to the given delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        if matches!(self, JitterPolicy::None) {
            return delay;
        }
        let (lo, hi) = self.bounds_nanos(delay);
        if lo >= hi {
            return Duration::from_nanos(lo);
        }
        Duration::from_nanos(rand::rng().random_range(lo..=hi))
    }

    /// Closed interval `[min, max]` that [`apply`](Self::apply) may return for `delay`.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use retryvisor::JitterPolicy;
    ///
    /// let (lo, hi) = JitterPolicy::Equal.bounds(Duration::from_millis(100));
    /// assert_eq!(lo, Duration::from_millis(50));
    /// assert_eq!(hi, Duration::from_millis(100));
    /// ```
    pub fn bounds(&self, delay: Duration) -> (Duration, Duration) {
        if matches!(self, JitterPolicy::None) {
            return (delay, delay);
        }
        let (lo, hi) = self.bounds_nanos(delay);
        (Duration::from_nanos(lo), Duration::from_nanos(hi))
    }

    pub(crate) fn validate(&self) -> Result<(), PolicyError> {
        match *self {
            JitterPolicy::Proportional { ratio } if !(0.0..=1.0).contains(&ratio) => {
                Err(PolicyError::InvalidJitter { ratio })
            }
            _ => Ok(()),
        }
    }

    /// Bounds in nanoseconds; delays beyond `u64::MAX` ns (~584 years) saturate.
    fn bounds_nanos(&self, delay: Duration) -> (u64, u64) {
        let ns = saturating_nanos(delay);
        match *self {
            JitterPolicy::None => (ns, ns),
            JitterPolicy::Full => (0, ns),
            JitterPolicy::Equal => (ns.div_ceil(2), ns),
            JitterPolicy::Proportional { ratio } => {
                let ratio = ratio.clamp(0.0, 1.0);
                let base = ns as f64;
                ((base * (1.0 - ratio)) as u64, (base * (1.0 + ratio)) as u64)
            }
            JitterPolicy::Additive { max } => (ns, ns.saturating_add(saturating_nanos(max))),
        }
    }
}

fn saturating_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_identity() {
        let d = Duration::from_micros(1500);
        assert_eq!(JitterPolicy::None.apply(d), d);
        assert_eq!(JitterPolicy::None.bounds(d), (d, d));
    }

    #[test]
    fn zero_delay_stays_zero() {
        for j in [
            JitterPolicy::Full,
            JitterPolicy::Equal,
            JitterPolicy::Proportional { ratio: 0.5 },
        ] {
            assert_eq!(j.apply(Duration::ZERO), Duration::ZERO, "{j:?}");
        }
    }

    #[test]
    fn applied_delay_stays_within_bounds() {
        let base = Duration::from_millis(1000);
        let policies = [
            JitterPolicy::Full,
            JitterPolicy::Equal,
            JitterPolicy::Proportional { ratio: 0.25 },
            JitterPolicy::Additive {
                max: Duration::from_millis(300),
            },
        ];
        for j in policies {
            let (lo, hi) = j.bounds(base);
            for _ in 0..200 {
                let d = j.apply(base);
                assert!(d >= lo && d <= hi, "{j:?}: {d:?} outside [{lo:?}, {hi:?}]");
            }
        }
    }

    #[test]
    fn sub_millisecond_delays_keep_their_precision() {
        let base = Duration::from_micros(1500);
        let (lo, hi) = JitterPolicy::Equal.bounds(base);
        assert_eq!(lo, Duration::from_micros(750));
        assert_eq!(hi, base);
        for _ in 0..200 {
            let d = JitterPolicy::Equal.apply(base);
            assert!(d >= Duration::from_micros(750) && d <= base, "{d:?}");
        }

        let tiny = Duration::from_micros(400);
        let (lo, hi) = JitterPolicy::Additive { max: Duration::from_micros(100) }.bounds(tiny);
        assert_eq!((lo, hi), (tiny, Duration::from_micros(500)));
        assert!(JitterPolicy::Full.apply(tiny) <= tiny);
    }

    #[test]
    fn proportional_bounds() {
        let (lo, hi) = JitterPolicy::Proportional { ratio: 0.2 }.bounds(Duration::from_secs(1));
        assert_eq!(lo, Duration::from_millis(800));
        assert_eq!(hi, Duration::from_millis(1200));
    }

    #[test]
    fn ratio_outside_unit_interval_is_rejected() {
        assert_eq!(
            JitterPolicy::Proportional { ratio: 1.5 }.validate(),
            Err(PolicyError::InvalidJitter { ratio: 1.5 })
        );
        assert!(JitterPolicy::Proportional { ratio: f64::NAN }.validate().is_err());
        assert!(JitterPolicy::Proportional { ratio: 1.0 }.validate().is_ok());
    }
}
