//! Bounded calls: hard wall-clock limits over blocking work.
//!
//! ## Contents
//! - [`BoundedExecutor`] one dedicated worker thread, a deadline per call,
//!   replacement of the worker after a missed deadline
//! - [`ScriptRunner`], [`ScriptEngine`] the two-phase (compile / execute) script call site
//!
//! ## Rules
//! - The calling task is never blocked past the deadline, whatever the work does.
//! - A worker that missed a deadline never receives another job.

mod executor;
mod script;
mod worker;

pub use executor::BoundedExecutor;
pub(crate) use worker::panic_message;
pub use script::{ScriptEngine, ScriptParams, ScriptRunner};
