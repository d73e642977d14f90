//! # Dedicated worker thread.
//!
//! A [`Worker`] is one OS thread draining a job queue. It exists so that a
//! bounded call can be abandoned even when the work never yields: the owner
//! drops the queue, cancels the token and walks away. Jobs still queued on an
//! abandoned worker are discarded, never run. The thread exits on its own once
//! the stuck job returns, if it ever does.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Unit of work shipped to the worker thread.
pub(crate) type Job = Box<dyn FnOnce(CancellationToken) + Send + 'static>;

/// Handle to one worker thread.
pub(crate) struct Worker {
    generation: u64,
    jobs: mpsc::UnboundedSender<Job>,
    token: CancellationToken,
}

impl Worker {
    /// Starts a named worker thread.
    pub(crate) fn spawn(name: &str, generation: u64) -> io::Result<Self> {
        let (jobs, mut rx) = mpsc::unbounded_channel::<Job>();
        let token = CancellationToken::new();
        let thread_token = token.clone();

        thread::Builder::new()
            .name(format!("{name}-{generation}"))
            .spawn(move || {
                while let Some(job) = rx.blocking_recv() {
                    if thread_token.is_cancelled() {
                        continue;
                    }
                    job(thread_token.clone());
                }
            })?;

        Ok(Self {
            generation,
            jobs,
            token,
        })
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Cancelled once the worker is abandoned.
    pub(crate) fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Queues a job; hands it back if the thread is gone.
    pub(crate) fn submit(&self, job: Job) -> Result<(), Job> {
        self.jobs.send(job).map_err(|e| e.0)
    }

    /// Signals interruption to everything queued on this worker and closes the queue.
    pub(crate) fn abandon(self) {
        self.token.cancel();
    }
}

/// Runs `work` with panic isolation; a panic becomes [`TaskError::Fail`].
pub(crate) fn call_isolated<T, F>(work: F, token: CancellationToken) -> Result<T, TaskError>
where
    F: FnOnce(CancellationToken) -> Result<T, TaskError>,
{
    match panic::catch_unwind(AssertUnwindSafe(|| work(token))) {
        Ok(res) => res,
        Err(payload) => Err(TaskError::fail(format!(
            "worker panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
