//! Error types used by the retry runtime and the wrapped operations.
//!
//! This module defines:
//!
//! - [`Failure`]: why a single attempt failed (an error value or a captured panic).
//! - [`RetryError`]: the terminal, caller-visible outcome of a rejected or cancelled run.
//! - [`PolicyError`]: invalid retry configuration, reported when a policy is built.
//! - [`RuntimeError`]: errors raised while wiring the runtime itself.
//!
//! All enums provide `as_label` (stable snake_case) for logs/metrics.

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Boxed error accepted from wrapped operations.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Classification of a single failed attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// The operation returned an error.
    Error,
    /// The operation panicked; the panic was captured.
    Panic,
}

/// # Reason an attempt failed.
///
/// Opaque but inspectable: the original error is kept behind an `Arc` so a
/// failure can be cloned cheaply (observer, events, terminal outcome) and still
/// be downcast to the caller's concrete error type.
///
/// # Example
/// ```
/// use retryvisor::{Failure, FailureKind};
///
/// let f = Failure::from_error(std::io::Error::other("connection refused"));
/// assert_eq!(f.kind(), FailureKind::Error);
/// assert_eq!(f.message(), "connection refused");
/// assert!(f.downcast_ref::<std::io::Error>().is_some());
/// ```
#[derive(Clone)]
pub struct Failure {
    kind: FailureKind,
    message: Arc<str>,
    source: Option<Arc<dyn StdError + Send + Sync + 'static>>,
}

impl Failure {
    /// Wraps an error returned by the operation.
    pub fn from_error(err: impl Into<BoxError>) -> Self {
        let boxed: BoxError = err.into();
        Self {
            kind: FailureKind::Error,
            message: boxed.to_string().into(),
            source: Some(Arc::from(boxed)),
        }
    }

    /// Builds a failure from a captured panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Self::panicked(panic_message(payload.as_ref()))
    }

    /// Builds a panic failure from a message.
    pub fn panicked(message: impl Into<Arc<str>>) -> Self {
        Self {
            kind: FailureKind::Panic,
            message: message.into(),
            source: None,
        }
    }

    /// Returns the failure classification.
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// True if the attempt panicked instead of returning an error.
    pub fn is_panic(&self) -> bool {
        self.kind == FailureKind::Panic
    }

    /// Human-readable message of the underlying error or panic.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Attempts to view the underlying error as a concrete type.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.source.as_deref()?.downcast_ref::<E>()
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self.kind {
            FailureKind::Error => "attempt_failed",
            FailureKind::Panic => "attempt_panicked",
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FailureKind::Error => f.write_str(&self.message),
            FailureKind::Panic => write!(f, "attempt panicked: {}", self.message),
        }
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .finish()
    }
}

impl StdError for Failure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// # Terminal outcome of a run that did not resolve with a value.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum RetryError {
    /// Every permitted attempt failed with a retryable failure.
    ///
    /// Carries the **last** failure, the most diagnostic one.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Failure of the final attempt.
        last: Failure,
    },

    /// The failure was classified as non-retryable by the policy.
    #[error("non-retryable failure on attempt {attempt}: {failure}")]
    Rejected {
        /// Attempt number (1-based) that produced the failure.
        attempt: u32,
        /// The terminal failure.
        failure: Failure,
    },

    /// The run was cancelled by the caller or by runtime shutdown.
    #[error("retry run cancelled")]
    Cancelled,
}

impl RetryError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use retryvisor::RetryError;
    ///
    /// assert_eq!(RetryError::Cancelled.as_label(), "run_cancelled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RetryError::Exhausted { .. } => "run_exhausted",
            RetryError::Rejected { .. } => "run_rejected",
            RetryError::Cancelled => "run_cancelled",
        }
    }

    /// The failure behind this outcome (`None` for cancellation).
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            RetryError::Exhausted { last, .. } => Some(last),
            RetryError::Rejected { failure, .. } => Some(failure),
            RetryError::Cancelled => None,
        }
    }

    /// True if the run ended through cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled)
    }
}

/// # Invalid retry configuration.
///
/// Raised by [`RetryPolicyBuilder::build`](crate::RetryPolicyBuilder::build),
/// never at run time.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    /// `max_attempts = 0`; at least one attempt is required.
    #[error("max attempts must be at least 1")]
    ZeroAttempts,

    /// Exponential factor is not finite or below 1.0.
    #[error("backoff factor must be finite and >= 1.0, got {factor}")]
    InvalidFactor {
        /// The rejected factor.
        factor: f64,
    },

    /// Proportional jitter ratio outside `[0.0, 1.0]`.
    #[error("jitter ratio must be within [0.0, 1.0], got {ratio}")]
    InvalidJitter {
        /// The rejected ratio.
        ratio: f64,
    },
}

impl PolicyError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            PolicyError::ZeroAttempts => "policy_zero_attempts",
            PolicyError::InvalidFactor { .. } => "policy_invalid_factor",
            PolicyError::InvalidJitter { .. } => "policy_invalid_jitter",
        }
    }
}

/// # Errors produced while wiring the retry runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// No tokio runtime was supplied and none is current.
    #[error("no tokio runtime available: {reason}")]
    NoRuntime {
        /// Reason reported by tokio.
        reason: String,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::NoRuntime { .. } => "runtime_missing",
        }
    }
}
