//! # Task registry: owns scheduled task handles and their actors.
//!
//! ## Architecture
//! ```text
//! fire_if_need_restart(handle, schedule)
//!   ├─ scheduled:
//!   │    ├─ !can_work_safe || !should_start_now ─► cancel(id)        (Stopped)
//!   │    ├─ period changed                       ─► restart           (Restarting ─► Running)
//!   │    └─ otherwise                            ─► nothing
//!   └─ not scheduled:
//!        ├─ should_start_now && can_work_safe    ─► schedule(handle)
//!        └─ otherwise                            ─► Failed is reset to Stopped
//!
//! schedule(handle) ─► handle.start() ─► spawn TaskActor ─► fire_start_event ─► TaskAdded
//! actor exit:
//!   ├─ Finished  ─► entry removed                        ─► TaskRemoved
//!   └─ Failed    ─► entry removed, Failed, stop hooks    ─► TaskRemoved
//! ```
//!
//! ## Rules
//! - At most one actor per task id; an id is reserved while its handle starts.
//! - Task hooks never run under the entries lock.
//! - An actor only cleans up its own entry (epoch check), never a newer one
//!   registered by a restart.
//! - Status is never persisted here; collaborators observe `StatusChanged` on [`Registry::bus`].

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::RwLock;
use tokio::task::{AbortHandle, JoinHandle, JoinSet};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::actor::{ActorExit, NextRun, TaskActor};
use crate::core::schedule::Schedule;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::status::Status;
use crate::tasks::{HandleRef, TaskInfo};

/// A scheduled task.
struct Entry {
    handle: HandleRef,
    schedule: Schedule,
    epoch: u64,
    cancel: CancellationToken,
    join: JoinHandle<()>,
    next: Arc<NextRun>,
}

/// Owner of scheduled tasks.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
/// use taskhub::{Config, Registry, Schedule, TaskError, TaskFn, TaskHandle};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let registry = Registry::new(Config::default());
/// let hello = TaskHandle::new("hello", TaskFn::new("hello", |_ctx: CancellationToken| async {
///     Ok::<_, TaskError>(())
/// }))
/// .with_bus(registry.bus().clone());
///
/// registry.schedule(Arc::new(hello), Schedule::once()).await.unwrap();
/// registry.shutdown().await.unwrap();
/// # }
/// ```
pub struct Registry {
    cfg: Config,
    bus: Bus,
    entries: RwLock<HashMap<String, Entry>>,
    starting: Mutex<HashSet<String>>,
    epoch: AtomicU64,
    me: Weak<Registry>,
}

/// Holds an id in [`Registry::starting`] until dropped.
struct Reservation<'a> {
    starting: &'a Mutex<HashSet<String>>,
    id: String,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.starting
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&self.id);
    }
}

impl Registry {
    /// Creates a registry with its own event bus.
    pub fn new(cfg: Config) -> Arc<Self> {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        Self::with_bus(cfg, bus)
    }

    /// Creates a registry publishing on an existing bus.
    pub fn with_bus(cfg: Config, bus: Bus) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            cfg,
            bus,
            entries: RwLock::new(HashMap::new()),
            starting: Mutex::new(HashSet::new()),
            epoch: AtomicU64::new(0),
            me: me.clone(),
        })
    }

    /// Event bus shared with handles and collaborators.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Starts `handle` and spawns its actor.
    ///
    /// ### Errors
    /// - [`RuntimeError::PeriodTooShort`] for a repeat period below `min_period`;
    /// - [`RuntimeError::AlreadyExists`] if the id is already scheduled;
    /// - [`RuntimeError::State`] if the handle cannot enter `Running`.
    pub async fn schedule(&self, handle: HandleRef, schedule: Schedule) -> Result<(), RuntimeError> {
        if !self.cfg.period_allowed(schedule.period) {
            return Err(RuntimeError::PeriodTooShort {
                period: schedule.period,
                min: self.cfg.min_period,
            });
        }
        let id = handle.id().to_string();
        let reservation = self.reserve(&id).await?;

        if handle.status() == Status::Restarting {
            tracing::info!(task = %id, "restarting task");
        } else {
            tracing::info!(task = %id, ?schedule, "starting task");
        }
        handle.start().await?;

        // held until the entry is in place so an early actor exit finds it
        let mut entries = self.entries.write().await;
        let epoch = self.epoch.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let next = Arc::new(NextRun::default());
        let actor = TaskActor::new(Arc::clone(&handle), schedule, Arc::clone(&next));

        let token = cancel.clone();
        let registry = self.me.clone();
        let actor_id = id.clone();
        let join = tokio::spawn(async move {
            let exit = actor.run(token).await;
            if let Some(registry) = registry.upgrade() {
                registry.on_actor_exit(&actor_id, epoch, exit).await;
            }
        });

        handle.fire_start_event();
        entries.insert(
            id.clone(),
            Entry {
                handle,
                schedule,
                epoch,
                cancel,
                join,
                next,
            },
        );
        drop(entries);
        drop(reservation);

        self.bus.publish(Event::new(EventKind::TaskAdded).with_task(id));
        Ok(())
    }

    /// Claims `id` for a start in progress; released when the guard drops.
    async fn reserve(&self, id: &str) -> Result<Reservation<'_>, RuntimeError> {
        let entries = self.entries.read().await;
        let mut starting = self.starting.lock().unwrap_or_else(|p| p.into_inner());
        if entries.contains_key(id) || !starting.insert(id.to_string()) {
            return Err(RuntimeError::AlreadyExists { id: id.to_string() });
        }
        Ok(Reservation {
            starting: &self.starting,
            id: id.to_string(),
        })
    }

    /// Stops the actor of `id` and cancels its handle (ends `Stopped`).
    ///
    /// ### Errors
    /// [`RuntimeError::NotFound`] if `id` is not scheduled.
    pub async fn cancel(&self, id: &str) -> Result<(), RuntimeError> {
        let entry = self.take(id).await.ok_or_else(|| RuntimeError::NotFound {
            id: id.to_string(),
        })?;
        tracing::info!(task = %id, "cancel task");
        let handle = Self::stop_actor(entry).await;
        handle.cancel().await;
        self.bus.publish(Event::new(EventKind::TaskRemoved).with_task(id));
        Ok(())
    }

    /// Restarts `id` with its current schedule.
    ///
    /// ### Errors
    /// [`RuntimeError::NotFound`] if `id` is not scheduled.
    pub async fn restart(&self, id: &str) -> Result<(), RuntimeError> {
        let (handle, schedule) = {
            let entries = self.entries.read().await;
            let entry = entries.get(id).ok_or_else(|| RuntimeError::NotFound {
                id: id.to_string(),
            })?;
            (Arc::clone(&entry.handle), entry.schedule)
        };
        self.restart_with(handle, schedule).await
    }

    async fn restart_with(&self, handle: HandleRef, schedule: Schedule) -> Result<(), RuntimeError> {
        let id = handle.id().to_string();
        if let Some(entry) = self.take(&id).await {
            Self::stop_actor(entry).await;
        }
        if let Err(e) = handle.transition(Status::Restarting, None) {
            tracing::warn!(task = %id, error = %e, "restart without Restarting status");
        }
        handle.halt(None).await;
        self.schedule(handle, schedule).await
    }

    /// Reconciles a task with what it should be doing now.
    ///
    /// Call it whenever a task's configuration or environment changed.
    ///
    /// ### Errors
    /// Errors of [`Registry::schedule`] / [`Registry::cancel`].
    pub async fn fire_if_need_restart(
        &self,
        handle: HandleRef,
        schedule: Schedule,
    ) -> Result<(), RuntimeError> {
        let id = handle.id().to_string();
        if self.is_running(&id).await {
            if !handle.can_work_safe() || !handle.should_start_now() {
                tracing::info!(task = %id, "task should not run any more; stopping");
                return self.cancel(&id).await;
            }
            let current = self.entries.read().await.get(&id).map(|e| e.schedule);
            if current.is_some_and(|s| s.period != schedule.period) {
                return self.restart_with(handle, schedule).await;
            }
            return Ok(());
        }

        if handle.should_start_now() && handle.can_work_safe() {
            return self.schedule(handle, schedule).await;
        }
        // nothing to run: a stale Failed is reset
        if handle.status() == Status::Failed {
            handle.transition(Status::Stopped, None)?;
        }
        Ok(())
    }

    /// Returns true if `id` has a live actor.
    pub async fn is_running(&self, id: &str) -> bool {
        self.entries
            .read()
            .await
            .get(id)
            .is_some_and(|e| !e.join.is_finished())
    }

    /// Returns the scheduled handle for `id`.
    pub async fn get(&self, id: &str) -> Option<HandleRef> {
        self.entries.read().await.get(id).map(|e| Arc::clone(&e.handle))
    }

    /// Returns sorted list of scheduled task ids.
    pub async fn list(&self) -> Vec<String> {
        let entries = self.entries.read().await;
        let mut ids: Vec<String> = entries.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Returns a snapshot of every scheduled task, sorted by id.
    pub async fn snapshot(&self) -> Vec<TaskInfo> {
        let entries = self.entries.read().await;
        let mut out: Vec<TaskInfo> = entries
            .values()
            .map(|e| {
                let mut info = e.handle.info();
                info.schedule = Some(e.schedule);
                info.next_run_in = e.next.remaining();
                info
            })
            .collect();
        out.sort_unstable_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// Progress through the current period, `0..=100`.
    ///
    /// One-shot tasks report 0; `None` if `id` is not scheduled.
    pub async fn percent_to_next(&self, id: &str) -> Option<u8> {
        let entries = self.entries.read().await;
        let entry = entries.get(id)?;
        let period = entry.schedule.period.as_millis();
        if period == 0 {
            return Some(0);
        }
        let Some(remaining) = entry.next.remaining() else {
            return Some(100);
        };
        let left = (100 * remaining.as_millis() / period).min(100);
        Some((100 - left) as u8)
    }

    /// Stops every actor and cancels every handle within [`Config::grace`].
    ///
    /// ### Errors
    /// [`RuntimeError::GraceExceeded`] with the ids still stopping after the
    /// grace period; those actors are aborted.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        let drained: Vec<(String, Entry)> = self.entries.write().await.drain().collect();

        let mut aborts: HashMap<String, AbortHandle> = HashMap::new();
        let mut set = JoinSet::new();
        for (id, entry) in drained {
            entry.cancel.cancel();
            aborts.insert(id.clone(), entry.join.abort_handle());
            set.spawn(async move {
                let handle = Self::stop_actor(entry).await;
                handle.cancel().await;
                id
            });
        }

        let grace = self.cfg.grace;
        let mut done: HashSet<String> = HashSet::new();
        let all = async {
            while let Some(res) = set.join_next().await {
                if let Ok(id) = res {
                    done.insert(id);
                }
            }
        };
        match time::timeout(grace, all).await {
            Ok(()) => {
                for id in aborts.keys() {
                    self.bus.publish(Event::new(EventKind::TaskRemoved).with_task(id.as_str()));
                }
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_elapsed) => {
                set.abort_all();
                let mut stuck: Vec<String> = aborts
                    .into_iter()
                    .filter(|(id, _)| !done.contains(id))
                    .map(|(id, abort)| {
                        abort.abort();
                        id
                    })
                    .collect();
                stuck.sort_unstable();
                tracing::warn!(?grace, ?stuck, "tasks did not stop within grace; aborting");
                self.bus
                    .publish(Event::new(EventKind::GraceExceeded).with_reason(stuck.join(",")));
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }

    async fn take(&self, id: &str) -> Option<Entry> {
        self.entries.write().await.remove(id)
    }

    /// Cancels the actor and waits for it; returns its handle.
    async fn stop_actor(entry: Entry) -> HandleRef {
        entry.cancel.cancel();
        if let Err(e) = entry.join.await {
            if e.is_panic() {
                tracing::error!(task = entry.handle.id(), "actor panicked");
            }
        }
        entry.handle
    }

    async fn on_actor_exit(&self, id: &str, epoch: u64, exit: ActorExit) {
        let handle = {
            let mut entries = self.entries.write().await;
            match entries.get(id) {
                Some(e) if e.epoch == epoch => entries.remove(id).map(|e| e.handle),
                _ => None,
            }
        };
        let Some(handle) = handle else {
            return;
        };

        match exit {
            ActorExit::Finished | ActorExit::Cancelled => {}
            ActorExit::Failed(msg) => {
                tracing::warn!(task = %id, error = %msg, "task stopped after failed cycle");
                if handle.status() != Status::Failed {
                    if let Err(e) = handle.transition(Status::Failed, Some(msg)) {
                        tracing::error!(task = %id, error = %e, "cannot mark task failed");
                    }
                }
                handle.halt(None).await;
            }
        }
        self.bus.publish(Event::new(EventKind::TaskRemoved).with_task(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::error::TaskError;
    use crate::tasks::{Task, TaskHandle};

    #[derive(Default)]
    struct Counter {
        runs: AtomicU32,
        stops: AtomicU32,
        fail: AtomicBool,
        panic: bool,
        cannot_work: AtomicBool,
        not_now: AtomicBool,
        slow_stop: Option<Duration>,
        slow_start: Option<Duration>,
    }

    #[async_trait]
    impl Task for Counter {
        type Output = u32;

        fn name(&self) -> &str {
            "counter"
        }

        async fn work(&self, _ctx: CancellationToken) -> Result<u32, TaskError> {
            let n = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            if self.panic {
                panic!("counter overflow");
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(TaskError::fail("sensor offline"));
            }
            Ok(n)
        }

        fn can_work(&self) -> Result<bool, TaskError> {
            Ok(!self.cannot_work.load(Ordering::SeqCst))
        }

        fn should_start_now(&self) -> bool {
            !self.not_now.load(Ordering::SeqCst)
        }

        async fn before_start(&self) -> Result<(), TaskError> {
            if let Some(d) = self.slow_start {
                time::sleep(d).await;
            }
            Ok(())
        }

        async fn after_stop(&self) -> Result<(), TaskError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            if let Some(d) = self.slow_stop {
                time::sleep(d).await;
            }
            Ok(())
        }
    }

    fn handle(id: &str, task: Counter) -> Arc<TaskHandle<Counter>> {
        Arc::new(TaskHandle::new(id, task))
    }

    fn runs(h: &TaskHandle<Counter>) -> u32 {
        h.task().runs.load(Ordering::SeqCst)
    }

    #[tokio::test(start_paused = true)]
    async fn once_runs_a_single_cycle_and_leaves() {
        let reg = Registry::new(Config::default());
        let h = handle("once", Counter::default());

        reg.schedule(h.clone(), Schedule::once()).await.unwrap();
        time::sleep(Duration::from_millis(10)).await;

        assert_eq!(runs(&h), 1);
        assert_eq!(h.status(), Status::Executed);
        assert!(reg.list().await.is_empty());
        assert!(!reg.is_running("once").await);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_schedule_repeats() {
        let reg = Registry::new(Config::default());
        let h = handle("tick", Counter::default());

        reg.schedule(h.clone(), Schedule::with_delay(Duration::from_millis(100)))
            .await
            .unwrap();
        time::sleep(Duration::from_millis(350)).await;

        assert_eq!(runs(&h), 4);
        assert!(reg.is_running("tick").await);
        assert_eq!(reg.list().await, vec!["tick".to_string()]);

        reg.cancel("tick").await.unwrap();
        assert_eq!(h.status(), Status::Stopped);
        assert_eq!(h.task().stops.load(Ordering::SeqCst), 1);
        assert!(reg.list().await.is_empty());
    }

    #[tokio::test]
    async fn rejects_short_period_and_duplicates() {
        let reg = Registry::new(Config::default());

        let err = reg
            .schedule(
                handle("fast", Counter::default()),
                Schedule::at_rate(Duration::from_millis(10)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::PeriodTooShort { .. }));

        let every = Schedule::with_delay(Duration::from_secs(60));
        reg.schedule(handle("dup", Counter::default()), every).await.unwrap();
        let err = reg
            .schedule(handle("dup", Counter::default()), every)
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::AlreadyExists { id } if id == "dup"));

        assert!(matches!(
            reg.cancel("missing").await,
            Err(RuntimeError::NotFound { .. })
        ));
        reg.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn reraised_failure_stops_the_schedule() {
        let reg = Registry::new(Config::default());
        let h = handle("bad", Counter::default());
        h.task().fail.store(true, Ordering::SeqCst);

        reg.schedule(h.clone(), Schedule::with_delay(Duration::from_millis(100)))
            .await
            .unwrap();
        time::sleep(Duration::from_millis(500)).await;

        assert_eq!(runs(&h), 1);
        assert_eq!(h.status(), Status::Failed);
        assert_eq!(h.error_message().as_deref(), Some("sensor offline"));
        assert_eq!(h.task().stops.load(Ordering::SeqCst), 1);
        assert!(!reg.is_running("bad").await);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_cycle_marks_failed() {
        let reg = Registry::new(Config::default());
        let h = handle("boom", Counter {
            panic: true,
            ..Counter::default()
        });

        reg.schedule(h.clone(), Schedule::once()).await.unwrap();
        time::sleep(Duration::from_millis(10)).await;

        assert_eq!(h.status(), Status::Failed);
        assert_eq!(
            h.error_message().as_deref(),
            Some("cycle panicked: counter overflow")
        );
        assert!(reg.list().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn fire_if_need_restart_reconciles() {
        let reg = Registry::new(Config::default());
        let every = Schedule::with_delay(Duration::from_millis(200));

        // not running, blocked: a stale Failed becomes Stopped
        let h = handle("r", Counter::default());
        h.transition(Status::Failed, Some("old".into())).unwrap();
        h.task().cannot_work.store(true, Ordering::SeqCst);
        reg.fire_if_need_restart(h.clone(), every).await.unwrap();
        assert_eq!(h.status(), Status::Stopped);
        assert!(!reg.is_running("r").await);

        // not running, allowed: scheduled
        h.task().cannot_work.store(false, Ordering::SeqCst);
        reg.fire_if_need_restart(h.clone(), every).await.unwrap();
        assert!(reg.is_running("r").await);

        // running, same period: untouched
        reg.fire_if_need_restart(h.clone(), every).await.unwrap();
        assert_eq!(h.task().stops.load(Ordering::SeqCst), 0);

        // running, should not start now: stopped
        h.task().not_now.store(true, Ordering::SeqCst);
        reg.fire_if_need_restart(h.clone(), every).await.unwrap();
        assert!(!reg.is_running("r").await);
        assert_eq!(h.status(), Status::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn period_change_restarts_through_restarting() {
        let reg = Registry::new(Config::default());
        let mut rx = reg.bus().subscribe();
        let h = Arc::new(TaskHandle::new("p", Counter::default()).with_bus(reg.bus().clone()));

        reg.schedule(h.clone(), Schedule::with_delay(Duration::from_millis(200)))
            .await
            .unwrap();
        time::sleep(Duration::from_millis(50)).await;

        let slower = Schedule::with_delay(Duration::from_secs(1));
        reg.fire_if_need_restart(h.clone(), slower).await.unwrap();
        time::sleep(Duration::from_millis(10)).await;

        assert!(reg.is_running("p").await);
        assert_eq!(h.task().stops.load(Ordering::SeqCst), 1);
        assert_eq!(reg.snapshot().await[0].schedule, Some(slower));

        let mut restarting = false;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::StatusChanged && ev.status == Some(Status::Restarting) {
                restarting = true;
            }
        }
        assert!(restarting);

        reg.restart("p").await.unwrap();
        assert!(reg.is_running("p").await);
        reg.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn percent_to_next_tracks_the_period() {
        let reg = Registry::new(Config::default());
        let h = handle("pct", Counter::default());
        reg.schedule(h.clone(), Schedule::with_delay(Duration::from_secs(1)))
            .await
            .unwrap();

        time::sleep(Duration::from_millis(250)).await;
        let pct = reg.percent_to_next("pct").await.unwrap();
        assert!((24..=26).contains(&pct), "got {pct}");

        let info = &reg.snapshot().await[0];
        assert_eq!(info.run_count, 1);
        assert!(info.next_run_in.is_some());
        assert_eq!(reg.percent_to_next("missing").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_within_grace_stops_everything() {
        let reg = Registry::new(Config::default());
        let mut rx = reg.bus().subscribe();
        let a = handle("a", Counter::default());
        let b = handle("b", Counter::default());
        let every = Schedule::at_rate(Duration::from_millis(100));
        reg.schedule(a.clone(), every).await.unwrap();
        reg.schedule(b.clone(), every).await.unwrap();

        reg.shutdown().await.unwrap();

        assert_eq!(a.status(), Status::Stopped);
        assert_eq!(b.status(), Status::Stopped);
        assert!(reg.list().await.is_empty());

        let mut last = None;
        while let Ok(ev) = rx.try_recv() {
            last = Some(ev.kind);
        }
        assert_eq!(last, Some(EventKind::AllStoppedWithin));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_reports_tasks_stuck_past_grace() {
        let cfg = Config {
            grace: Duration::from_secs(1),
            ..Config::default()
        };
        let reg = Registry::new(cfg);
        let slow = handle("slow", Counter {
            slow_stop: Some(Duration::from_secs(60)),
            ..Counter::default()
        });
        let quick = handle("quick", Counter::default());
        let every = Schedule::with_delay(Duration::from_secs(5));
        reg.schedule(slow, every).await.unwrap();
        reg.schedule(quick.clone(), every).await.unwrap();

        let err = reg.shutdown().await.unwrap_err();
        match err {
            RuntimeError::GraceExceeded { grace, stuck } => {
                assert_eq!(grace, Duration::from_secs(1));
                assert_eq!(stuck, vec!["slow".to_string()]);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(quick.status(), Status::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_before_start_does_not_block_other_calls() {
        let reg = Registry::new(Config::default());
        let every = Schedule::with_delay(Duration::from_secs(1));
        reg.schedule(handle("other", Counter::default()), every).await.unwrap();

        let slow = handle(
            "slow",
            Counter {
                slow_start: Some(Duration::from_secs(2)),
                ..Counter::default()
            },
        );
        let pending = {
            let reg = Arc::clone(&reg);
            let slow = slow.clone();
            tokio::spawn(async move { reg.schedule(slow, Schedule::once()).await })
        };
        time::sleep(Duration::from_millis(10)).await;

        let asked = time::Instant::now();
        assert_eq!(reg.list().await, vec!["other".to_string()]);
        assert!(reg.is_running("other").await);
        assert_eq!(reg.snapshot().await.len(), 1);
        assert!(asked.elapsed() < Duration::from_millis(100));

        let dup = reg.schedule(handle("slow", Counter::default()), Schedule::once()).await;
        assert!(matches!(dup, Err(RuntimeError::AlreadyExists { .. })));

        pending.await.unwrap().unwrap();
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(runs(&slow), 1);
        reg.shutdown().await.unwrap();
    }
}
