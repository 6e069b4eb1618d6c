//! # Operation abstractions.
//!
//! This module provides the wrapped-operation types:
//! - [`Operation`] - trait for re-invocable fallible units of work
//! - [`BlockingFn`] - blocking closure executed on the blocking pool
//! - [`AsyncFn`] - async closure executed on the runtime's workers
//! - [`OperationRef`] - shared reference to an operation (`Arc<dyn Operation<T>>`)

mod async_fn;
mod blocking_fn;
mod operation;

pub use async_fn::AsyncFn;
pub use blocking_fn::BlockingFn;
pub use operation::{BoxAttemptFuture, Operation, OperationRef};
