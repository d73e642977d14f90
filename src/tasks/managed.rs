//! Type-erased view of a [`TaskHandle`] for owners of many tasks.
//!
//! Handles are generic over their task (and its output type); the registry
//! keeps them side by side as [`HandleRef`]. Outputs are dropped on this
//! path, only status and errors matter to a scheduler.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{StateError, TaskError};
use crate::status::Status;
use crate::tasks::handle::TaskHandle;
use crate::tasks::info::TaskInfo;
use crate::tasks::task::Task;

/// Shared, type-erased task handle.
pub type HandleRef = Arc<dyn Managed>;

/// Operations a scheduler needs from a task handle.
#[async_trait]
pub trait Managed: Send + Sync + 'static {
    fn id(&self) -> &str;
    fn status(&self) -> Status;
    fn transition(&self, to: Status, error: Option<String>) -> Result<(), StateError>;
    fn fire_start_event(&self) -> bool;
    fn can_work_safe(&self) -> bool;
    fn should_start_now(&self) -> bool;
    fn info(&self) -> TaskInfo;

    /// `before_start` + enter `Running`.
    async fn start(&self) -> Result<(), StateError>;

    /// One run cycle with the output discarded.
    async fn run_cycle(&self) -> Result<(), TaskError>;

    /// Stop hooks, then `Stopped`; no-op when already stopped.
    async fn cancel(&self);

    /// Stop hooks, then `target` (`None` keeps the status).
    async fn halt(&self, target: Option<Status>);
}

#[async_trait]
impl<T: Task> Managed for TaskHandle<T> {
    fn id(&self) -> &str {
        TaskHandle::id(self)
    }

    fn status(&self) -> Status {
        TaskHandle::status(self)
    }

    fn transition(&self, to: Status, error: Option<String>) -> Result<(), StateError> {
        TaskHandle::transition(self, to, error)
    }

    fn fire_start_event(&self) -> bool {
        TaskHandle::fire_start_event(self)
    }

    fn can_work_safe(&self) -> bool {
        TaskHandle::can_work_safe(self)
    }

    fn should_start_now(&self) -> bool {
        TaskHandle::should_start_now(self)
    }

    fn info(&self) -> TaskInfo {
        TaskHandle::info(self)
    }

    async fn start(&self) -> Result<(), StateError> {
        TaskHandle::start(self).await
    }

    async fn run_cycle(&self) -> Result<(), TaskError> {
        TaskHandle::run(self).await.map(|_| ())
    }

    async fn cancel(&self) {
        TaskHandle::cancel(self).await
    }

    async fn halt(&self, target: Option<Status>) {
        TaskHandle::halt(self, target).await
    }
}
