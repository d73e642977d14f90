//! # Function-backed task (`TaskFn`)
//!
//! [`TaskFn`] wraps a closure `F: Fn(CancellationToken) -> Fut`, producing a fresh
//! future per run cycle. All hooks keep their defaults; failure handling is
//! chosen with [`TaskFn::swallow_errors`].
//!
//! ## Concurrency semantics
//! - Every cycle calls the closure again and gets a **new** future owning its state.
//! - Nothing is shared between cycles implicitly; capture an `Arc<...>` for that.
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use taskhub::{Task, TaskFn, TaskError};
//!
//! let t = TaskFn::new("tick", |ctx: CancellationToken| async move {
//!     if ctx.is_cancelled() {
//!         return Err(TaskError::Canceled);
//!     }
//!     Ok::<_, TaskError>("tock")
//! });
//!
//! assert_eq!(t.name(), "tick");
//! ```

use std::borrow::Cow;
use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::tasks::task::Task;

/// Function-backed task implementation.
#[derive(Debug)]
pub struct TaskFn<F> {
    name: Cow<'static, str>,
    description: Option<String>,
    reraise: bool,
    f: F,
}

impl<F> TaskFn<F> {
    /// Creates a task that re-raises failures.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            description: None,
            reraise: true,
            f,
        }
    }

    /// Sets the description shown in snapshots.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Makes failed cycles non-fatal: the status still becomes `Failed`,
    /// but the error is not returned to the caller.
    #[must_use]
    pub fn swallow_errors(mut self) -> Self {
        self.reraise = false;
        self
    }
}

#[async_trait]
impl<F, Fut, O> Task for TaskFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static, // Fn, not FnMut
    Fut: Future<Output = Result<O, TaskError>> + Send + 'static,
    O: Send + 'static,
{
    type Output = O;

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<String> {
        self.description.clone()
    }

    async fn work(&self, ctx: CancellationToken) -> Result<O, TaskError> {
        (self.f)(ctx).await
    }

    fn on_exception(&self, _err: &TaskError) -> bool {
        self.reraise
    }
}
