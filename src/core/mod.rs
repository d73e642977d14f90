//! Scheduling core: owns many task handles and decides when they run.
//!
//! The public API from this module is [`Registry`] plus the [`Schedule`]
//! describing how often a task repeats.
//!
//! Internal modules:
//! - [`actor`]: runs cycles of one task per its schedule, cancellable;
//! - [`registry`]: schedule / cancel / restart / reconcile, graceful shutdown;
//! - [`schedule`]: once, fixed delay, fixed rate.

mod actor;
mod registry;
mod schedule;

pub use registry::Registry;
pub use schedule::{Schedule, ScheduleType};
