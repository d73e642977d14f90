//! # Per-task log gating.
//!
//! Every record a task handle emits goes through a [`TaskLogger`], which
//! decides where it lands:
//!
//! ```text
//! TaskLogger::warn(task, msg)
//!   ├─ to_process_log (default on)  ─► tracing::warn!(task, msg)
//!   └─ to_sink        (default off) ─► LogSink::write(Level::WARN, task, msg)
//! ```
//!
//! The logger never formats beyond one line and never rotates; that belongs
//! to whatever sits behind the sink.

use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::Level;

/// Destination for per-task records (file, buffer, remote appender).
pub trait LogSink: Send + Sync + 'static {
    /// Writes one record.
    fn write(&self, level: Level, task: &str, message: &str);
}

/// [`LogSink`] writing one line per record into any [`Write`].
///
/// Line format: `LEVEL [task] message`.
pub struct WriterSink<W> {
    out: Mutex<W>,
}

impl<W: Write + Send + 'static> WriterSink<W> {
    /// Wraps a writer.
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Consumes the sink and returns the writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|p| p.into_inner())
    }
}

impl<W: Write + Send + 'static> LogSink for WriterSink<W> {
    fn write(&self, level: Level, task: &str, message: &str) {
        let mut out = self.out.lock().unwrap_or_else(|p| p.into_inner());
        if let Err(e) = writeln!(out, "{level} [{task}] {message}") {
            tracing::debug!(task, error = %e, "task log sink write failed");
        }
    }
}

/// Routes task records to the process log and/or a dedicated sink.
///
/// Both destinations are independently toggleable at runtime.
pub struct TaskLogger {
    to_process_log: AtomicBool,
    to_sink: AtomicBool,
    sink: Option<Arc<dyn LogSink>>,
}

impl Default for TaskLogger {
    fn default() -> Self {
        Self {
            to_process_log: AtomicBool::new(true),
            to_sink: AtomicBool::new(false),
            sink: None,
        }
    }
}

impl fmt::Debug for TaskLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskLogger")
            .field("to_process_log", &self.to_process_log())
            .field("to_sink", &self.to_sink())
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl TaskLogger {
    /// Process log on, no sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a sink and enables writing to it.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self.to_sink = AtomicBool::new(true);
        self
    }

    /// Toggles mirroring into `tracing`.
    pub fn set_to_process_log(&self, on: bool) {
        self.to_process_log.store(on, Ordering::Relaxed);
    }

    /// Toggles writing to the sink (no effect without one).
    pub fn set_to_sink(&self, on: bool) {
        self.to_sink.store(on, Ordering::Relaxed);
    }

    pub fn to_process_log(&self) -> bool {
        self.to_process_log.load(Ordering::Relaxed)
    }

    pub fn to_sink(&self) -> bool {
        self.to_sink.load(Ordering::Relaxed)
    }

    pub fn info(&self, task: &str, message: &str) {
        self.log(Level::INFO, task, message);
    }

    pub fn warn(&self, task: &str, message: &str) {
        self.log(Level::WARN, task, message);
    }

    pub fn error(&self, task: &str, message: &str) {
        self.log(Level::ERROR, task, message);
    }

    /// Emits one record to every enabled destination.
    pub fn log(&self, level: Level, task: &str, message: &str) {
        if self.to_sink() {
            if let Some(sink) = &self.sink {
                sink.write(level, task, message);
            }
        }
        if self.to_process_log() {
            match level {
                Level::ERROR => tracing::error!(task, "{message}"),
                Level::WARN => tracing::warn!(task, "{message}"),
                Level::INFO => tracing::info!(task, "{message}"),
                Level::DEBUG => tracing::debug!(task, "{message}"),
                _ => tracing::trace!(task, "{message}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Capture(Mutex<Vec<(Level, String)>>);

    impl LogSink for Capture {
        fn write(&self, level: Level, task: &str, message: &str) {
            self.0.lock().unwrap().push((level, format!("{task}: {message}")));
        }
    }

    #[test]
    fn sink_is_off_by_default() {
        let logger = TaskLogger::new();
        assert!(logger.to_process_log());
        assert!(!logger.to_sink());
        logger.info("t", "nothing to capture");
    }

    #[test]
    fn sink_receives_records_only_while_enabled() {
        let cap = Arc::new(Capture::default());
        let logger = TaskLogger::new().with_sink(cap.clone());
        logger.set_to_process_log(false);

        logger.warn("ping-1", "slow reply");
        logger.set_to_sink(false);
        logger.error("ping-1", "dropped");

        let got = cap.0.lock().unwrap().clone();
        assert_eq!(got, vec![(Level::WARN, "ping-1: slow reply".to_string())]);
    }

    #[test]
    fn writer_sink_writes_one_line_per_record() {
        let sink = WriterSink::new(Vec::new());
        sink.write(Level::INFO, "a", "first");
        sink.write(Level::ERROR, "a", "second");

        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text, "INFO [a] first\nERROR [a] second\n");
    }
}
