//! # Task capabilities.
//!
//! A [`Task`] is the part of a background process that differs between
//! processes: the work itself plus a handful of optional hooks. Everything
//! common (status bookkeeping, hook failure handling, logging) lives in
//! [`TaskHandle`](crate::TaskHandle), which is the only thing that ever calls
//! these methods.
//!
//! Hooks return `Result`; the handle downgrades their failures to a warning
//! and a status change, so an implementation can use `?` freely.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// # Unit of background work with lifecycle hooks.
///
/// Only [`name`](Task::name) and [`work`](Task::work) are required.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use taskhub::{Task, TaskError};
///
/// struct Probe;
///
/// #[async_trait]
/// impl Task for Probe {
///     type Output = u32;
///
///     fn name(&self) -> &str { "probe" }
///
///     async fn work(&self, ctx: CancellationToken) -> Result<u32, TaskError> {
///         if ctx.is_cancelled() {
///             return Err(TaskError::Canceled);
///         }
///         Ok(7)
///     }
///
///     // swallow failures; the next cycle retries
///     fn on_exception(&self, _err: &TaskError) -> bool { false }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Value produced by one successful run cycle.
    type Output: Send + 'static;

    /// Returns a stable, human-readable name.
    fn name(&self) -> &str;

    /// Free-form description for status displays.
    fn description(&self) -> Option<String> {
        None
    }

    /// Executes one run cycle.
    ///
    /// `ctx` is cancelled when the owner cancels the handle.
    async fn work(&self, ctx: CancellationToken) -> Result<Self::Output, TaskError>;

    /// Decides what happens to a failed cycle.
    ///
    /// `true` releases resources and re-raises the error to the caller
    /// (a scheduler then stops the task); `false` swallows it.
    /// Never consulted for [`TaskError::Severe`].
    fn on_exception(&self, _err: &TaskError) -> bool {
        true
    }

    /// Whether the task is able to work right now (device present, config valid...).
    fn can_work(&self) -> Result<bool, TaskError> {
        Ok(true)
    }

    /// Human-readable reason the task cannot work, if any.
    fn why_cannot_work(&self) -> Option<String> {
        None
    }

    /// Whether a scheduler should start the task once nothing else prevents it.
    fn should_start_now(&self) -> bool {
        true
    }

    /// Called before the task enters `Running`.
    async fn before_start(&self) -> Result<(), TaskError> {
        Ok(())
    }

    /// Called when the owner stops the task.
    async fn after_stop(&self) -> Result<(), TaskError> {
        Ok(())
    }

    /// Releases anything the task holds (connections, subscriptions).
    ///
    /// May run more than once; must be idempotent.
    async fn release_resources(&self) -> Result<(), TaskError> {
        Ok(())
    }
}
