//! # Attempt limit for a retry run.
//!
//! [`MaxAttempts`] counts **attempts**, not retries: `Limited(3)` means the
//! operation runs at most three times. `Unbounded` retries until success, a
//! non-retryable failure, or cancellation.
//!
//! Zero attempts cannot be expressed: [`MaxAttempts::limited`] rejects it with
//! [`PolicyError::ZeroAttempts`].

use std::fmt;
use std::num::NonZeroU32;

use crate::error::PolicyError;

/// Maximum number of attempts a run may make.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MaxAttempts {
    /// At most `n` attempts (`n >= 1`).
    Limited(NonZeroU32),
    /// No limit; only success, a terminal failure or cancellation end the run.
    Unbounded,
}

impl MaxAttempts {
    /// A single attempt, no retries.
    pub const ONCE: MaxAttempts = MaxAttempts::Limited(NonZeroU32::MIN);

    /// Creates a bounded limit, rejecting zero.
    ///
    /// # Example
    /// ```
    /// use retryvisor::{MaxAttempts, PolicyError};
    ///
    /// assert_eq!(MaxAttempts::limited(3).unwrap().get(), Some(3));
    /// assert_eq!(MaxAttempts::limited(0), Err(PolicyError::ZeroAttempts));
    /// ```
    pub fn limited(n: u32) -> Result<Self, PolicyError> {
        NonZeroU32::new(n)
            .map(MaxAttempts::Limited)
            .ok_or(PolicyError::ZeroAttempts)
    }

    /// Returns the limit, or `None` when unbounded.
    pub fn get(&self) -> Option<u32> {
        match self {
            MaxAttempts::Limited(n) => Some(n.get()),
            MaxAttempts::Unbounded => None,
        }
    }

    /// True if another attempt may follow the failed attempt `attempt` (0-based).
    pub fn allows_after(&self, attempt: u32) -> bool {
        match self {
            MaxAttempts::Limited(n) => attempt.saturating_add(1) < n.get(),
            MaxAttempts::Unbounded => true,
        }
    }

    /// True for [`MaxAttempts::Unbounded`].
    pub fn is_unbounded(&self) -> bool {
        matches!(self, MaxAttempts::Unbounded)
    }
}

impl Default for MaxAttempts {
    /// Returns [`MaxAttempts::ONCE`].
    fn default() -> Self {
        MaxAttempts::ONCE
    }
}

impl fmt::Display for MaxAttempts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxAttempts::Limited(n) => write!(f, "{n}"),
            MaxAttempts::Unbounded => f.write_str("unbounded"),
        }
    }
}
