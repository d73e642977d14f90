//! Keyed wait/signal registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{self, Instant};

/// How long a reply that arrived before its waiter stays deliverable.
pub const PENDING_GRACE: Duration = Duration::from_millis(2000);

enum Slot<T> {
    Waiting { id: u64, tx: oneshot::Sender<T> },
    Pending { value: T, at: Instant },
}

/// Matches asynchronous replies to the callers waiting for them.
///
/// All slots live behind a single mutex that is never held across an `.await`.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use taskhub::Correlator;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let replies: Arc<Correlator<u32>> = Arc::new(Correlator::new());
///
/// let inbound = Arc::clone(&replies);
/// let reply = replies
///     .await_reply("ping-7", Duration::from_secs(1), move || {
///         // the request is sent only once the waiter is armed
///         tokio::spawn(async move { inbound.signal("ping-7", 42) });
///     })
///     .await;
/// assert_eq!(reply, Some(42));
/// # }
/// ```
pub struct Correlator<T> {
    slots: Mutex<HashMap<String, Slot<T>>>,
    next_id: AtomicU64,
}

impl<T: Send> Correlator<T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot<T>>> {
        self.slots.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Delivers `value` for `key`.
    ///
    /// Wakes the registered waiter if there is one; otherwise stores the value
    /// as pending, replacing any older pending value for the same key.
    pub fn signal(&self, key: &str, value: T) {
        let waiting = {
            let mut slots = self.lock();
            match slots.remove(key) {
                Some(Slot::Waiting { tx, .. }) => Some(tx),
                _ => {
                    slots.insert(key.to_string(), Slot::Pending {
                        value,
                        at: Instant::now(),
                    });
                    return;
                }
            }
        };

        if let Some(tx) = waiting {
            if let Err(value) = tx.send(value) {
                // the waiter gave up between removal and send
                tracing::debug!(key, "waiter gone; keeping reply as pending");
                self.lock().entry(key.to_string()).or_insert(Slot::Pending {
                    value,
                    at: Instant::now(),
                });
            }
        }
    }

    /// Takes a fresh pending reply or registers a waiter for `key`.
    ///
    /// Use this directly when the outbound request is async: arm first,
    /// send, then [`Waiter::wait`].
    pub fn arm(&self, key: &str) -> Armed<'_, T> {
        let mut slots = self.lock();
        match slots.remove(key) {
            Some(Slot::Pending { value, at }) if at.elapsed() < PENDING_GRACE => {
                return Armed::Ready(value);
            }
            Some(Slot::Pending { at, .. }) => {
                tracing::debug!(key, age = ?at.elapsed(), "discarding stale reply");
            }
            Some(Slot::Waiting { id, .. }) => {
                // dropping the old sender releases that caller with `None`
                tracing::warn!(key, replaced = id, "second waiter on key; previous released");
            }
            None => {}
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        slots.insert(key.to_string(), Slot::Waiting { id, tx });
        Armed::Waiting(Waiter {
            owner: self,
            key: key.to_string(),
            id,
            rx,
        })
    }

    /// Waits up to `timeout` for the reply to `key`.
    ///
    /// A fresh pending reply is returned at once and `before_wait` is not called.
    /// Otherwise `before_wait` runs after the waiter is armed, so a reply that
    /// races the request cannot be lost.
    pub async fn await_reply<F>(&self, key: &str, timeout: Duration, before_wait: F) -> Option<T>
    where
        F: FnOnce(),
    {
        match self.arm(key) {
            Armed::Ready(value) => Some(value),
            Armed::Waiting(waiter) => {
                before_wait();
                waiter.wait(timeout).await
            }
        }
    }

    /// Releases the waiter registered for `key`, if any. Its wait yields `None`.
    pub fn cancel(&self, key: &str) -> bool {
        let mut slots = self.lock();
        if matches!(slots.get(key), Some(Slot::Waiting { .. })) {
            slots.remove(key);
            true
        } else {
            false
        }
    }

    /// Number of replies stored without a waiter (stale ones included).
    pub fn pending_len(&self) -> usize {
        self.lock()
            .values()
            .filter(|s| matches!(s, Slot::Pending { .. }))
            .count()
    }

    /// Number of registered waiters.
    pub fn waiting_len(&self) -> usize {
        self.lock()
            .values()
            .filter(|s| matches!(s, Slot::Waiting { .. }))
            .count()
    }

    fn forget(&self, key: &str, id: u64) {
        let mut slots = self.lock();
        if matches!(slots.get(key), Some(Slot::Waiting { id: current, .. }) if *current == id) {
            slots.remove(key);
        }
    }
}

impl<T: Send> Default for Correlator<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of [`Correlator::arm`].
pub enum Armed<'a, T: Send> {
    /// A fresh reply was already pending.
    Ready(T),
    /// A waiter is registered.
    Waiting(Waiter<'a, T>),
}

impl<T: Send> Armed<'_, T> {
    /// Resolves to the reply, or `None` after `timeout`.
    pub async fn wait(self, timeout: Duration) -> Option<T> {
        match self {
            Armed::Ready(value) => Some(value),
            Armed::Waiting(waiter) => waiter.wait(timeout).await,
        }
    }
}

/// A registered waiter. Dropping it unregisters the key.
pub struct Waiter<'a, T: Send> {
    owner: &'a Correlator<T>,
    key: String,
    id: u64,
    rx: oneshot::Receiver<T>,
}

impl<T: Send> Waiter<'_, T> {
    /// Correlation key this waiter is registered under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Blocks until signalled, cancelled or `timeout` elapses.
    pub async fn wait(mut self, timeout: Duration) -> Option<T> {
        match time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(_released)) => None,
            Err(_elapsed) => {
                self.owner.forget(&self.key, self.id);
                // a signal may have landed right at the deadline
                self.rx.try_recv().ok()
            }
        }
    }
}

impl<T: Send> Drop for Waiter<'_, T> {
    fn drop(&mut self) {
        self.owner.forget(&self.key, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Paused clock: timers fire on the millisecond tick at or after their deadline.
    fn assert_near(waited: Duration, expected: Duration) {
        assert!(
            waited >= expected && waited < expected + Duration::from_millis(5),
            "waited {waited:?}, expected about {expected:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn early_reply_is_returned_without_blocking() {
        let c: Correlator<&str> = Correlator::new();
        c.signal("k", "v");
        time::sleep(Duration::from_millis(1500)).await;

        let started = Instant::now();
        let mut called = false;
        let got = c
            .await_reply("k", Duration::from_secs(3), || called = true)
            .await;

        assert_eq!(got, Some("v"));
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert!(!called, "request must not be re-sent when a reply is pending");
        assert_eq!(c.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_reply_is_discarded_and_wait_runs_full_timeout() {
        let c: Correlator<u8> = Correlator::new();
        c.signal("k", 7);
        time::sleep(PENDING_GRACE + Duration::from_millis(1)).await;

        let started = Instant::now();
        let got = c.await_reply("k", Duration::from_secs(1), || {}).await;

        assert_eq!(got, None);
        assert_near(started.elapsed(), Duration::from_secs(1));
        assert_eq!(c.pending_len(), 0);
        assert_eq!(c.waiting_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reply_triggered_from_before_wait_is_delivered() {
        let c: Arc<Correlator<u32>> = Arc::new(Correlator::new());
        let inbound = Arc::clone(&c);

        let started = Instant::now();
        let got = c
            .await_reply("ping-1-msg7", Duration::from_secs(3), move || {
                tokio::spawn(async move {
                    time::sleep(Duration::from_millis(250)).await;
                    inbound.signal("ping-1-msg7", 99);
                });
            })
            .await;

        assert_eq!(got, Some(99));
        assert_near(started.elapsed(), Duration::from_millis(250));
        assert_eq!(c.waiting_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_signal_overwrites_pending_value() {
        let c: Correlator<u8> = Correlator::new();
        c.signal("k", 1);
        c.signal("k", 2);
        assert_eq!(c.pending_len(), 1);
        assert_eq!(c.arm("k").wait(Duration::from_millis(10)).await, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_releases_waiter_with_none() {
        let c: Arc<Correlator<u8>> = Arc::new(Correlator::new());
        let canceller = Arc::clone(&c);
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(100)).await;
            assert!(canceller.cancel("k"));
        });

        let started = Instant::now();
        let got = c.await_reply("k", Duration::from_secs(5), || {}).await;
        assert_eq!(got, None);
        assert_near(started.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_waiter_unregisters_and_late_reply_becomes_pending() {
        let c: Correlator<u8> = Correlator::new();
        {
            let armed = c.arm("k");
            assert!(matches!(armed, Armed::Waiting(_)));
            assert_eq!(c.waiting_len(), 1);
        }
        assert_eq!(c.waiting_len(), 0);

        c.signal("k", 5);
        assert_eq!(c.pending_len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn second_waiter_releases_the_first() {
        let c: Correlator<u8> = Correlator::new();
        let first = match c.arm("k") {
            Armed::Waiting(w) => w,
            Armed::Ready(_) => panic!("nothing pending"),
        };
        let second = c.arm("k");
        assert_eq!(c.waiting_len(), 1);

        assert_eq!(first.wait(Duration::from_secs(1)).await, None);
        c.signal("k", 3);
        assert_eq!(second.wait(Duration::from_secs(1)).await, Some(3));
    }
}
