//! # Bounded execution with worker replacement.
//!
//! ## Flow
//! ```text
//! run(timeout, work)
//!   ├─► submit job to current worker (spawn one if none)
//!   ├─► wait for the result up to `timeout`
//!   │     ├─ result ready ─► return it unchanged, worker kept
//!   │     ├─ worker abandoned, job not started ─► resubmit to the new worker
//!   │     └─ deadline hit  ─► discard the job if not started, cancel worker token
//!   │                          ├─ drop worker (never joined)
//!   │                          ├─ spawn generation + 1
//!   │                          └─ return TaskError::Timeout
//! ```
//!
//! ## Rules
//! - Exactly one worker is active at a time; jobs are served FIFO.
//! - A worker that missed a deadline is never handed another job, and the
//!   jobs queued on it never run there.
//! - Work never starts after its caller got [`TaskError::Timeout`].
//! - Cancellation is not cooperative: the executor does not wait for the
//!   abandoned work to notice its token.

use std::borrow::Cow;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::select;
use tokio::sync::oneshot;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::bounded::worker::{call_isolated, Job, Worker};
use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};

/// Work and its result channel; taken by whichever worker starts it first.
type Claim<T, F> = Arc<Mutex<Option<(F, oneshot::Sender<Result<T, TaskError>>)>>>;

fn lock_claim<X>(claim: &Mutex<X>) -> MutexGuard<'_, X> {
    claim.lock().unwrap_or_else(|p| p.into_inner())
}

/// Wraps a claim into a job; an abandoned worker leaves the claim untouched.
fn job_for<T, F>(claim: &Claim<T, F>) -> Job
where
    T: Send + 'static,
    F: FnOnce(CancellationToken) -> Result<T, TaskError> + Send + 'static,
{
    let claim = Arc::clone(claim);
    Box::new(move |token: CancellationToken| {
        let taken = {
            let mut slot = lock_claim(&claim);
            if token.is_cancelled() {
                None
            } else {
                slot.take()
            }
        };
        if let Some((work, tx)) = taken {
            let _ = tx.send(call_isolated(work, token));
        }
    })
}

struct Slot {
    worker: Option<Worker>,
    generation: u64,
}

/// Runs blocking work on a dedicated worker thread under a hard deadline.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use taskhub::{BoundedExecutor, TaskError};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let exec = BoundedExecutor::new("probe");
/// let n = exec
///     .run(Duration::from_secs(1), |_token| Ok::<_, TaskError>(6 * 7))
///     .await;
/// assert_eq!(n, Ok(42));
/// # }
/// ```
pub struct BoundedExecutor {
    operation: Cow<'static, str>,
    slot: Mutex<Slot>,
    bus: Option<Bus>,
}

impl BoundedExecutor {
    /// Creates an executor; `operation` names the bounded call in errors and thread names.
    ///
    /// The first worker is started on the first submission.
    pub fn new(operation: impl Into<Cow<'static, str>>) -> Self {
        Self {
            operation: operation.into(),
            slot: Mutex::new(Slot {
                worker: None,
                generation: 0,
            }),
            bus: None,
        }
    }

    /// Publishes `TimeoutHit` / `WorkerReplaced` on `bus`.
    #[must_use]
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Human description of the bounded operation.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Number of workers started so far (the current one included).
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Runs `work` on the worker and waits at most `timeout` for it.
    ///
    /// `work` receives a token that is cancelled if the deadline passes; well
    /// behaved work may poll it, but nothing relies on that.
    ///
    /// ### Errors
    /// - [`TaskError::Timeout`] when no result arrived in time (always propagated);
    /// - [`TaskError::Fail`] when the work panicked or no worker could be started;
    /// - whatever `work` itself returned.
    pub async fn run<T, F>(&self, timeout: Duration, work: F) -> Result<T, TaskError>
    where
        T: Send + 'static,
        F: FnOnce(CancellationToken) -> Result<T, TaskError> + Send + 'static,
    {
        let deadline = Instant::now() + timeout;
        let (tx, mut rx) = oneshot::channel();
        let claim: Claim<T, F> = Arc::new(Mutex::new(Some((work, tx))));
        let (mut generation, mut abandoned) = self.submit(job_for(&claim))?;
        let mut follow = true;

        loop {
            select! {
                res = &mut rx => {
                    return match res {
                        Ok(res) => res,
                        Err(_dropped) => Err(TaskError::fail(format!(
                            "{} worker exited before finishing the job",
                            self.operation
                        ))),
                    };
                }
                _ = abandoned.cancelled(), if follow => {
                    // started jobs stay with their worker; queued ones move on
                    if lock_claim(&claim).is_none() {
                        follow = false;
                        continue;
                    }
                    (generation, abandoned) = self.submit(job_for(&claim))?;
                    tracing::debug!(
                        operation = %self.operation,
                        generation,
                        "queued job moved to replacement worker"
                    );
                }
                _ = time::sleep_until(deadline) => break,
            }
        }

        // a job still queued must never run once its caller gave up
        lock_claim(&claim).take();
        tracing::warn!(
            operation = %self.operation,
            ?timeout,
            generation,
            "bounded call stuck; replacing worker"
        );
        if let Some(bus) = &self.bus {
            bus.publish(
                Event::new(EventKind::TimeoutHit)
                    .with_task(&*self.operation)
                    .with_timeout(timeout),
            );
        }
        self.replace(generation);
        Err(TaskError::Timeout {
            timeout,
            operation: self.operation.to_string(),
        })
    }

    /// Queues `job`; returns the generation of the worker that took it and
    /// the token cancelled when that worker is abandoned.
    fn submit(&self, job: Job) -> Result<(u64, CancellationToken), TaskError> {
        let mut slot = self.lock();
        let mut job = job;
        // a dead thread hands the job back; one fresh worker gets one retry
        for _ in 0..2 {
            if slot.worker.is_none() {
                let generation = slot.generation + 1;
                let worker = Worker::spawn(&self.operation, generation).map_err(|e| {
                    TaskError::fail(format!("cannot start {} worker: {e}", self.operation))
                })?;
                slot.worker = Some(worker);
                slot.generation = generation;
            }
            let Some(worker) = slot.worker.as_ref() else {
                break;
            };
            match worker.submit(job) {
                Ok(()) => return Ok((worker.generation(), worker.token())),
                Err(returned) => {
                    job = returned;
                    slot.worker = None;
                }
            }
        }
        Err(TaskError::fail(format!(
            "{} worker is not accepting jobs",
            self.operation
        )))
    }

    /// Discards the worker of `generation` (if still current) and starts the next one.
    fn replace(&self, generation: u64) {
        let mut slot = self.lock();
        let is_current = matches!(&slot.worker, Some(w) if w.generation() == generation);
        if !is_current {
            return;
        }
        if let Some(stuck) = slot.worker.take() {
            stuck.abandon();
        }

        let next = slot.generation + 1;
        match Worker::spawn(&self.operation, next) {
            Ok(worker) => {
                slot.worker = Some(worker);
                slot.generation = next;
                if let Some(bus) = &self.bus {
                    bus.publish(
                        Event::new(EventKind::WorkerReplaced)
                            .with_task(&*self.operation)
                            .with_generation(next),
                    );
                }
            }
            Err(e) => {
                // the next submission retries the spawn
                tracing::error!(operation = %self.operation, error = %e, "cannot start replacement worker");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    #[tokio::test]
    async fn fast_work_returns_result_and_keeps_worker() {
        let exec = BoundedExecutor::new("probe");
        let a = exec.run(Duration::from_secs(2), |_| Ok(1)).await;
        let b = exec.run(Duration::from_secs(2), |_| Ok(2)).await;

        assert_eq!(a, Ok(1));
        assert_eq!(b, Ok(2));
        assert_eq!(exec.generation(), 1);
    }

    #[tokio::test]
    async fn work_error_is_returned_unchanged() {
        let exec = BoundedExecutor::new("probe");
        let res: Result<(), _> = exec
            .run(Duration::from_secs(2), |_| Err(TaskError::fail("bad input")))
            .await;
        assert_eq!(res, Err(TaskError::fail("bad input")));
        assert_eq!(exec.generation(), 1);
    }

    #[tokio::test]
    async fn stuck_work_times_out_and_worker_is_replaced() {
        let exec = BoundedExecutor::new("script compile");

        let started = Instant::now();
        let res: Result<(), _> = exec
            .run(Duration::from_millis(100), |_ignored| {
                std::thread::sleep(Duration::from_secs(3));
                Ok(())
            })
            .await;
        let waited = started.elapsed();

        assert_eq!(
            res,
            Err(TaskError::Timeout {
                timeout: Duration::from_millis(100),
                operation: "script compile".into()
            })
        );
        assert!(waited >= Duration::from_millis(100), "returned early: {waited:?}");
        assert!(waited < Duration::from_millis(1000), "returned late: {waited:?}");
        assert_eq!(exec.generation(), 2);

        // the stuck thread is still sleeping; a fresh worker must serve this
        let started = Instant::now();
        let next = exec.run(Duration::from_millis(500), |_| Ok("fresh")).await;
        assert_eq!(next, Ok("fresh"));
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(exec.generation(), 2);
    }

    #[tokio::test]
    async fn timeout_cancels_the_work_token() {
        let exec = BoundedExecutor::new("probe");
        let saw_cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&saw_cancel);

        let res: Result<(), _> = exec
            .run(Duration::from_millis(50), move |token| {
                while !token.is_cancelled() {
                    std::thread::sleep(Duration::from_millis(5));
                }
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(res.unwrap_err().is_timeout());

        let deadline = Instant::now() + Duration::from_secs(2);
        while !saw_cancel.load(Ordering::SeqCst) && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(saw_cancel.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn panic_is_isolated_and_worker_survives() {
        let exec = BoundedExecutor::new("probe");
        let res: Result<(), _> = exec
            .run(Duration::from_secs(2), |_| panic!("kaboom"))
            .await;
        assert_eq!(res, Err(TaskError::fail("worker panicked: kaboom")));

        assert_eq!(exec.run(Duration::from_secs(2), |_| Ok(5)).await, Ok(5));
        assert_eq!(exec.generation(), 1);
    }

    #[tokio::test]
    async fn timeout_publishes_events() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let exec = BoundedExecutor::new("ping batch").with_bus(bus);

        let _ = exec
            .run(Duration::from_millis(20), |_| {
                std::thread::sleep(Duration::from_millis(500));
                Ok(())
            })
            .await;

        let hit = rx.recv().await.unwrap();
        assert_eq!(hit.kind, EventKind::TimeoutHit);
        assert_eq!(hit.timeout_ms, Some(20));
        let replaced = rx.recv().await.unwrap();
        assert_eq!(replaced.kind, EventKind::WorkerReplaced);
        assert_eq!(replaced.generation, Some(2));
    }

    #[tokio::test]
    async fn job_queued_behind_stuck_work_moves_to_the_new_worker() {
        let exec = Arc::new(BoundedExecutor::new("script execution"));
        let ran = Arc::new(AtomicUsize::new(0));

        let stuck = {
            let exec = Arc::clone(&exec);
            tokio::spawn(async move {
                exec.run(Duration::from_millis(200), |_| {
                    std::thread::sleep(Duration::from_millis(600));
                    Ok(())
                })
                .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let started = Instant::now();
        let hits = Arc::clone(&ran);
        let fast = exec
            .run(Duration::from_millis(300), move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok("served")
            })
            .await;

        assert_eq!(fast, Ok("served"));
        assert!(started.elapsed() < Duration::from_millis(300));
        assert!(stuck.await.unwrap().unwrap_err().is_timeout());
        assert_eq!(exec.generation(), 2);

        // the abandoned thread wakes up and must not run the moved job again
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timed_out_queued_job_never_runs() {
        let exec = Arc::new(BoundedExecutor::new("probe"));
        let ran = Arc::new(AtomicBool::new(false));

        let slow = {
            let exec = Arc::clone(&exec);
            tokio::spawn(async move {
                exec.run(Duration::from_secs(2), |_| {
                    std::thread::sleep(Duration::from_millis(300));
                    Ok(7)
                })
                .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let flag = Arc::clone(&ran);
        let queued: Result<(), _> = exec
            .run(Duration::from_millis(80), move |_| {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(queued.unwrap_err().is_timeout());

        // the slow job already started, so it finishes on its own worker
        assert_eq!(slow.await.unwrap(), Ok(7));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!ran.load(Ordering::SeqCst));
    }
}
