//! # Task abstractions and the lifecycle runner.
//!
//! This module provides the task-related types:
//! - [`Task`] - capability trait: work plus optional lifecycle hooks
//! - [`TaskFn`] - closure-backed task
//! - [`TaskHandle`] - identity, status and failure policy around one task
//! - [`Managed`] / [`HandleRef`] - type-erased handle for schedulers
//! - [`TaskLogger`], [`LogSink`], [`WriterSink`] - per-task log gating
//! - [`TaskInfo`] - snapshot for displays

mod handle;
mod info;
mod log;
mod managed;
mod task;
mod task_fn;

pub use handle::TaskHandle;
pub use info::TaskInfo;
pub use log::{LogSink, TaskLogger, WriterSink};
pub use managed::{HandleRef, Managed};
pub use task::Task;
pub use task_fn::TaskFn;
