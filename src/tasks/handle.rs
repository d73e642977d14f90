//! # Task lifecycle runner.
//!
//! [`TaskHandle`] wraps one [`Task`] with identity, status and the uniform
//! failure policy. It is the only place a task's status changes, and every
//! change goes through the handle's [`TransitionTable`].
//!
//! ## Run cycle
//! ```text
//! run()
//!   ├─► status != Running ─► transition Running (illegal ─► StateError)
//!   ├─► work(ctx)
//!   │     ├─ Ok(v)            ─► Executed, error cleared   ─► Ok(Some(v))
//!   │     ├─ Err(Severe)      ─► Failed, logged            ─► Ok(None)
//!   │     └─ Err(e)           ─► Failed, logged
//!   │            ├─ on_exception(e) == true  ─► release_resources ─► Err(e)
//!   │            └─ on_exception(e) == false ─► Ok(None)
//! ```
//!
//! ## Hooks
//! - `start()`: `before_start` failure is a warning plus `release_resources`;
//!   the task still enters `Running`.
//! - `cancel()`: `after_stop` then `release_resources` (each called once)
//!   then `Stopped`; a failing hook ends in `Failed` instead, named in the
//!   error message, and is never returned.
//! - `can_work_safe()`: an erroring predicate counts as `false`.
//!
//! Equality, ordering and hashing use the id only.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use tokio_util::sync::CancellationToken;

use crate::error::{StateError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::status::{Status, TransitionTable};
use crate::tasks::info::TaskInfo;
use crate::tasks::log::TaskLogger;
use crate::tasks::task::Task;

struct Inner {
    status: Status,
    error: Option<String>,
    state: Option<String>,
    run_count: u64,
    token: CancellationToken,
}

/// Lifecycle runner around one [`Task`].
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use taskhub::{Status, TaskError, TaskFn, TaskHandle};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let h = TaskHandle::new("answer", TaskFn::new("answer", |_ctx: CancellationToken| async {
///     Ok::<_, TaskError>(42)
/// }));
/// assert_eq!(h.status(), Status::NeverRun);
///
/// assert_eq!(h.run().await, Ok(Some(42)));
/// assert_eq!(h.status(), Status::Executed);
/// # }
/// ```
pub struct TaskHandle<T: Task> {
    id: Arc<str>,
    task: T,
    created_at: SystemTime,
    table: TransitionTable,
    inner: Mutex<Inner>,
    bus: Option<Bus>,
    logger: TaskLogger,
}

impl<T: Task> TaskHandle<T> {
    /// Creates a handle in `NeverRun` using [`TransitionTable::LIFECYCLE`].
    pub fn new(id: impl Into<Arc<str>>, task: T) -> Self {
        let id = id.into();
        tracing::debug!(task = %id, name = task.name(), "task handle created");
        Self {
            id,
            task,
            created_at: SystemTime::now(),
            table: TransitionTable::default(),
            inner: Mutex::new(Inner {
                status: Status::NeverRun,
                error: None,
                state: None,
                run_count: 0,
                token: CancellationToken::new(),
            }),
            bus: None,
            logger: TaskLogger::default(),
        }
    }

    /// Uses `table` for every status change.
    #[must_use]
    pub fn with_table(mut self, table: TransitionTable) -> Self {
        self.table = table;
        self
    }

    /// Publishes status changes and cycle outcomes on `bus`.
    #[must_use]
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    #[must_use]
    pub fn with_logger(mut self, logger: TaskLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Starts from `status` instead of `NeverRun` (e.g. a passive `Listening` task).
    #[must_use]
    pub fn with_initial_status(self, status: Status) -> Self {
        self.lock().status = status;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        self.task.name()
    }

    pub fn task(&self) -> &T {
        &self.task
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn status(&self) -> Status {
        self.lock().status
    }

    /// Last error message; `None` after a successful cycle.
    pub fn error_message(&self) -> Option<String> {
        self.lock().error.clone()
    }

    /// Diagnostic state string set by the task or its owner.
    pub fn state(&self) -> Option<String> {
        self.lock().state.clone()
    }

    pub fn set_state(&self, state: impl Into<String>) {
        self.lock().state = Some(state.into());
    }

    /// Number of run cycles started.
    pub fn run_count(&self) -> u64 {
        self.lock().run_count
    }

    /// Per-task log gating (toggle file/process logging at runtime).
    pub fn logger(&self) -> &TaskLogger {
        &self.logger
    }

    /// Moves to `to`, recording `error` as the last error message.
    ///
    /// This is the only path that changes the status.
    ///
    /// ### Errors
    /// [`StateError`] if the handle's table has no `current -> to` edge;
    /// the status is left unchanged.
    pub fn transition(&self, to: Status, error: Option<String>) -> Result<(), StateError> {
        let from = {
            let mut inner = self.lock();
            let from = inner.status;
            self.table.check(from, to)?;
            inner.status = to;
            inner.error.clone_from(&error);
            from
        };
        if let Some(bus) = &self.bus {
            let mut ev = Event::status_changed(Arc::clone(&self.id), from, to);
            if let Some(reason) = error {
                ev = ev.with_reason(reason);
            }
            bus.publish(ev);
        }
        Ok(())
    }

    /// Executes one run cycle.
    ///
    /// Returns `Ok(None)` when the cycle failed but the error is not re-raised
    /// (severe errors, or `on_exception` returned `false`).
    ///
    /// ### Errors
    /// - the work error when `on_exception` asked for it;
    /// - [`TaskError::State`] when the handle cannot enter `Running` or `Executed`.
    pub async fn run(&self) -> Result<Option<T::Output>, TaskError> {
        let token = self.enter_cycle()?;
        self.publish(EventKind::TaskStarting, None);

        match self.task.work(token).await {
            Ok(out) => {
                self.transition(Status::Executed, None)?;
                self.publish(EventKind::TaskExecuted, None);
                Ok(Some(out))
            }
            Err(err) if err.is_severe() => {
                self.fail_cycle(&err, "severe error");
                Ok(None)
            }
            Err(err) => {
                self.fail_cycle(&err, "error while running");
                if self.task.on_exception(&err) {
                    self.release().await;
                    return Err(err);
                }
                Ok(None)
            }
        }
    }

    fn enter_cycle(&self) -> Result<CancellationToken, StateError> {
        if self.status() != Status::Running {
            self.transition(Status::Running, None)?;
        }
        let mut inner = self.lock();
        inner.run_count += 1;
        if inner.token.is_cancelled() {
            inner.token = CancellationToken::new();
        }
        Ok(inner.token.clone())
    }

    fn fail_cycle(&self, err: &TaskError, what: &str) {
        let msg = err.as_message();
        self.logger
            .error(&self.id, &format!("{what} '{}': {msg}", self.name()));
        self.force_failed(msg.clone());
        self.publish(EventKind::TaskFailed, Some(msg));
    }

    fn force_failed(&self, msg: String) {
        if let Err(e) = self.transition(Status::Failed, Some(msg)) {
            self.logger
                .error(&self.id, &format!("cannot mark '{}' failed: {e}", self.name()));
        }
    }

    /// Runs `before_start` and enters `Running`.
    ///
    /// A failing hook is logged as a warning and followed by
    /// `release_resources`; it does not prevent the transition.
    ///
    /// ### Errors
    /// [`StateError`] when the current status cannot move to `Running`.
    pub async fn start(&self) -> Result<(), StateError> {
        if let Err(e) = self.task.before_start().await {
            self.logger.warn(
                &self.id,
                &format!(
                    "error while calling before_start for '{}': {}",
                    self.name(),
                    e.as_message()
                ),
            );
            self.release().await;
        }
        {
            let mut inner = self.lock();
            if inner.token.is_cancelled() {
                inner.token = CancellationToken::new();
            }
            if inner.status == Status::Running {
                return Ok(());
            }
        }
        self.transition(Status::Running, None)
    }

    /// Stops the task: `after_stop`, `release_resources`, then `Stopped`.
    ///
    /// Never fails; problems end in `Failed` with the warning as the error
    /// message. No-op on a handle that is already `Stopped`.
    pub async fn cancel(&self) {
        if self.status() == Status::Stopped {
            return;
        }
        self.halt(Some(Status::Stopped)).await;
    }

    /// Runs the stop hooks and moves to `target`.
    ///
    /// `None` keeps the current status (a scheduler restarting the task, or
    /// stopping it after a failed cycle).
    pub async fn halt(&self, target: Option<Status>) {
        self.lock().token.cancel();

        let after_stop = self.task.after_stop().await.err();
        let release = self.task.release_resources().await.err();
        let failed = after_stop
            .map(|e| ("after_stop", e))
            .or(release.map(|e| ("release_resources", e)));

        if let Some((hook, e)) = failed {
            let warning = format!(
                "error while calling {hook} for '{}': {}",
                self.name(),
                e.as_message()
            );
            self.logger.warn(&self.id, &warning);
            self.force_failed(warning);
            return;
        }
        let Some(to) = target else {
            return;
        };
        if let Err(e) = self.transition(to, None) {
            let warning = format!("cannot stop '{}': {e}", self.name());
            self.logger.warn(&self.id, &warning);
            self.force_failed(warning);
        }
    }

    /// Moves `Restarting` to `Running`; no-op in any other status.
    ///
    /// Returns `true` if the status changed.
    pub fn fire_start_event(&self) -> bool {
        if self.status() != Status::Restarting {
            return false;
        }
        match self.transition(Status::Running, None) {
            Ok(()) => true,
            Err(e) => {
                self.logger
                    .warn(&self.id, &format!("cannot resume '{}': {e}", self.name()));
                false
            }
        }
    }

    /// `can_work()` with failures downgraded to a warning and `false`.
    pub fn can_work_safe(&self) -> bool {
        match self.task.can_work() {
            Ok(ok) => ok,
            Err(e) => {
                self.logger.warn(
                    &self.id,
                    &format!("error while calling can_work: {}", e.as_message()),
                );
                false
            }
        }
    }

    pub fn why_cannot_work(&self) -> Option<String> {
        self.task.why_cannot_work()
    }

    pub fn should_start_now(&self) -> bool {
        self.task.should_start_now()
    }

    /// Snapshot for displays.
    pub fn info(&self) -> TaskInfo {
        let inner = self.lock();
        TaskInfo {
            id: Arc::clone(&self.id),
            name: self.task.name().to_string(),
            description: self.task.description(),
            status: inner.status,
            error: inner.error.clone(),
            state: inner.state.clone(),
            created_at: self.created_at,
            run_count: inner.run_count,
            schedule: None,
            next_run_in: None,
        }
    }

    async fn release(&self) {
        if let Err(e) = self.task.release_resources().await {
            self.logger.warn(
                &self.id,
                &format!("error while releasing resources: {}", e.as_message()),
            );
        }
    }

    fn publish(&self, kind: EventKind, reason: Option<String>) {
        if let Some(bus) = &self.bus {
            let mut ev = Event::new(kind).with_task(Arc::clone(&self.id));
            if let Some(reason) = reason {
                ev = ev.with_reason(reason);
            }
            bus.publish(ev);
        }
    }
}

impl<T: Task> PartialEq for TaskHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T: Task> Eq for TaskHandle<T> {}

impl<T: Task> PartialOrd for TaskHandle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Task> Ord for TaskHandle<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl<T: Task> Hash for TaskHandle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T: Task> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("status", &self.status())
            .finish()
    }
}

impl<T: Task> fmt::Display for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
