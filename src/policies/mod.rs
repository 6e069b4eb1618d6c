//! Retry policies.
//!
//! This module groups the knobs that control **whether** a failed attempt is
//! retried and **how long** to wait before the next one.
//!
//! ## Contents
//! - [`RetryPolicy`] immutable rule set (backoff / attempts / predicate / observer)
//! - [`MaxAttempts`] attempt limit (bounded or unbounded)
//! - [`Backoff`], [`BackoffPolicy`] how delays evolve (none / fixed / incremental / exponential)
//! - [`JitterPolicy`] randomization strategy to avoid thundering herd
//!
//! ## Quick wiring
//! ```text
//! Retrier::submit(op, Arc<RetryPolicy>)
//!      └─► core::scheduler::RetryRun uses:
//!           - is_retryable(failure) to reject terminal failures
//!           - max_attempts.allows_after(n) to detect exhaustion
//!           - next_delay(n) to arm the inter-attempt timer
//! ```

mod attempts;
mod backoff;
mod jitter;
mod retry;

pub use attempts::MaxAttempts;
pub use backoff::{Backoff, BackoffPolicy};
pub use jitter::JitterPolicy;
pub use retry::{FailureObserver, RetryPolicy, RetryPolicyBuilder, RetryPredicate};
