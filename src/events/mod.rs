//! Lifecycle events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//! - `LogWriter` (feature `logging`) mirrors the bus into `tracing`
//!
//! ## Quick reference
//! - **Publishers**: `TaskHandle` (status changes, cycle outcome),
//!   `Registry` (added/removed/shutdown), `BoundedExecutor` (timeouts, worker replacement).
//! - **Consumers**: whatever owns persistence or UI push, via [`Bus::subscribe`].

mod bus;
mod event;
#[cfg(feature = "logging")]
mod log;

pub use bus::Bus;
pub use event::{Event, EventKind};
#[cfg(feature = "logging")]
pub use log::LogWriter;
