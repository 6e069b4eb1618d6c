//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by retry runs, the attempt executor and
//! subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `core::scheduler::RetryRun`, `core::executor::run_attempt`,
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the retrier's subscriber listener (fans out to `SubscriberSet`)
//!   and any receiver from [`Retrier::subscribe`](crate::Retrier::subscribe).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
