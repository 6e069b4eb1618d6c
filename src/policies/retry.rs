//! # Retry policy: the immutable rule set of a run.
//!
//! [`RetryPolicy`] bundles:
//! - a [`Backoff`] computing the delay between attempts;
//! - a [`MaxAttempts`] limit;
//! - a retryable-failure predicate (`retry_if`);
//! - an optional per-attempt failure observer (`on_failure`).
//!
//! A policy is built once through [`RetryPolicyBuilder`] and never mutated
//! afterwards; it can be shared (`Arc<RetryPolicy>`) by any number of
//! concurrent runs.
//!
//! ## Defaults
//! | Field          | Default                  |
//! |----------------|--------------------------|
//! | `backoff`      | [`BackoffPolicy::None`]  |
//! | `max_attempts` | 1                        |
//! | `retry_if`     | always `true`            |
//! | `on_failure`   | none                     |
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use retryvisor::{BackoffPolicy, RetryPolicy};
//!
//! let policy = RetryPolicy::builder()
//!     .with_backoff(BackoffPolicy::fixed(Duration::from_millis(10)))
//!     .with_max_attempts(10)
//!     .with_on_failure(|attempt, max, failure| {
//!         println!("{attempt} of {max} {failure}");
//!     })
//!     .build()
//!     .expect("valid policy");
//!
//! assert_eq!(policy.max_attempts().get(), Some(10));
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Failure, PolicyError};
use crate::policies::{attempts::MaxAttempts, backoff::Backoff, backoff::BackoffPolicy};

/// Classifies a failure as retryable (`true`) or terminal (`false`).
pub type RetryPredicate = Arc<dyn Fn(&Failure) -> bool + Send + Sync>;

/// Observer invoked once per failed attempt: `(attempt (1-based), max_attempts, failure)`.
pub type FailureObserver = Arc<dyn Fn(u32, MaxAttempts, &Failure) + Send + Sync>;

/// Immutable retry rules shared by every attempt of a run.
#[derive(Clone)]
pub struct RetryPolicy {
    backoff: Arc<dyn Backoff>,
    max_attempts: MaxAttempts,
    retry_if: Option<RetryPredicate>,
    on_failure: Option<FailureObserver>,
}

impl RetryPolicy {
    /// Starts a builder with all defaults.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    /// Shorthand for `n` attempts with a constant delay and default predicate.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Result<Self, PolicyError> {
        Self::builder()
            .with_backoff(BackoffPolicy::fixed(delay))
            .with_max_attempts(max_attempts)
            .build()
    }

    /// Shorthand for unbounded retries with the given backoff.
    pub fn unbounded(backoff: BackoffPolicy) -> Result<Self, PolicyError> {
        Self::builder()
            .with_backoff(backoff)
            .with_unbounded_attempts()
            .build()
    }

    /// Attempt limit.
    pub fn max_attempts(&self) -> MaxAttempts {
        self.max_attempts
    }

    /// Delay after the failure of attempt `attempt` (0-based).
    pub fn next_delay(&self, attempt: u32) -> Duration {
        self.backoff.next_delay(attempt)
    }

    /// Applies the retryable predicate (`true` when none is configured).
    pub fn is_retryable(&self, failure: &Failure) -> bool {
        self.retry_if.as_ref().is_none_or(|pred| pred(failure))
    }

    /// Failure observer, if configured.
    pub fn on_failure(&self) -> Option<&FailureObserver> {
        self.on_failure.as_ref()
    }
}

impl Default for RetryPolicy {
    /// One attempt, no delay, every failure retryable, no observer.
    fn default() -> Self {
        Self {
            backoff: Arc::new(BackoffPolicy::None),
            max_attempts: MaxAttempts::default(),
            retry_if: None,
            on_failure: None,
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("retry_if", &self.retry_if.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`RetryPolicy`] with fluent API.
///
/// Validation happens in [`build`](Self::build): zero attempts and ill-formed
/// built-in backoff parameters are rejected there, never at run time.
#[derive(Clone)]
pub struct RetryPolicyBuilder {
    backoff: Arc<dyn Backoff>,
    builtin: Option<BackoffPolicy>,
    max_attempts: Option<u32>,
    retry_if: Option<RetryPredicate>,
    on_failure: Option<FailureObserver>,
}

impl RetryPolicyBuilder {
    /// Creates a builder with all defaults.
    pub fn new() -> Self {
        Self {
            backoff: Arc::new(BackoffPolicy::None),
            builtin: Some(BackoffPolicy::None),
            max_attempts: Some(1),
            retry_if: None,
            on_failure: None,
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = Arc::new(backoff);
        self.builtin = Some(backoff);
        self
    }

    /// Uses a custom [`Backoff`] implementation (not validated).
    pub fn with_backoff_fn(mut self, backoff: impl Backoff) -> Self {
        self.backoff = Arc::new(backoff);
        self.builtin = None;
        self
    }

    /// Sets the attempt limit; `0` is rejected by [`build`](Self::build).
    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = Some(n);
        self
    }

    pub fn with_unbounded_attempts(mut self) -> Self {
        self.max_attempts = None;
        self
    }

    /// Sets the retryable predicate; `false` ends the run immediately.
    pub fn with_retry_if<F>(mut self, pred: F) -> Self
    where
        F: Fn(&Failure) -> bool + Send + Sync + 'static,
    {
        self.retry_if = Some(Arc::new(pred));
        self
    }

    /// Sets the per-attempt failure observer.
    ///
    /// Called synchronously by the scheduler, once per failed attempt and
    /// before any backoff delay. A panicking observer is logged and ignored.
    pub fn with_on_failure<F>(mut self, observer: F) -> Self
    where
        F: Fn(u32, MaxAttempts, &Failure) + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(observer));
        self
    }

    /// Validates and builds the policy.
    pub fn build(self) -> Result<RetryPolicy, PolicyError> {
        let max_attempts = match self.max_attempts {
            Some(n) => MaxAttempts::limited(n)?,
            None => MaxAttempts::Unbounded,
        };
        if let Some(builtin) = self.builtin {
            builtin.validate()?;
        }
        Ok(RetryPolicy {
            backoff: self.backoff,
            max_attempts,
            retry_if: self.retry_if,
            on_failure: self.on_failure,
        })
    }
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
