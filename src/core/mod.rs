//! Runtime core: run orchestration and result handles.
//!
//! The only public API from this module is [`Retrier`] (plus its builder and
//! configuration) and the handle types returned from it.
//!
//! Internal modules:
//! - [`executor`]: executes one attempt, isolates panics, publishes attempt events;
//! - [`scheduler`]: per-run retry state machine (classify, back off, settle);
//! - [`handle`]: settle-once result cell shared between a run and its caller;
//! - [`retrier`]: spawns runs, owns the bus, global concurrency and shutdown;
//! - [`builder`]: wires subscribers and the runtime handle.

mod builder;
mod config;
mod executor;
mod handle;
mod retrier;
mod scheduler;

pub use builder::RetrierBuilder;
pub use config::Config;
pub use handle::{CancelHandle, RetryHandle, Status};
pub use retrier::Retrier;
