//! # Runtime configuration.
//!
//! [`Config`] centralizes the bounds used by the registry and the script call site.
//!
//! Config is used in three ways:
//! 1. **Registry creation**: `Registry::new(config)`
//! 2. **Script runner**: `ScriptRunner::new(engine, &config)`
//! 3. **Task handles**: `TaskHandle::new(task).with_table(config.transitions())`
//!
//! ## Sentinel values
//! - `bus_capacity = 0` → clamped to 1 by the bus
//! - `min_period = 0s` → any repeat period is accepted
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use taskhub::{Config, ListeningPolicy, Status};
//!
//! let mut cfg = Config::default();
//! cfg.compile_timeout = Duration::from_secs(2);
//! cfg.listening = ListeningPolicy::LikeRunning;
//!
//! assert!(cfg.transitions().allows(Status::Listening, Status::Stopped));
//! ```

use std::time::Duration;

use crate::status::{ListeningPolicy, TransitionTable};

/// Runtime settings.
///
/// ## Field semantics
/// - `compile_timeout`: Hard bound on compiling/parsing one script
/// - `execute_timeout`: Hard bound on one execution of a compiled script
/// - `min_period`: Shortest repeat period a schedule may request
/// - `grace`: Maximum wait for scheduled tasks to stop on shutdown
/// - `bus_capacity`: Event bus ring buffer size (min 1)
/// - `listening`: Outgoing transitions of the `Listening` status
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time a script may spend compiling before its worker is replaced.
    pub compile_timeout: Duration,

    /// Maximum time one script execution may take before its worker is replaced.
    pub execute_timeout: Duration,

    /// Shortest period accepted by `Registry::schedule` for repeating tasks.
    ///
    /// `Duration::ZERO` periods (run once) are always accepted.
    pub min_period: Duration,

    /// Maximum time to wait for scheduled tasks on shutdown.
    ///
    /// Actors still running afterwards are aborted and shutdown returns
    /// `RuntimeError::GraceExceeded`.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel.
    ///
    /// Slow receivers that lag behind more than `bus_capacity` messages
    /// receive `Lagged` and skip older items.
    pub bus_capacity: usize,

    /// Whether `Listening` is terminal or behaves like `Running`.
    pub listening: ListeningPolicy,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the transition table task handles should use.
    ///
    /// The run-cycle table with the configured `Listening` row.
    #[inline]
    pub fn transitions(&self) -> TransitionTable {
        TransitionTable::LIFECYCLE.with_listening(self.listening)
    }

    /// Returns `true` when `period` is acceptable as a repeat period.
    #[inline]
    pub fn period_allowed(&self, period: Duration) -> bool {
        period.is_zero() || period >= self.min_period
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `compile_timeout = 5s`
    /// - `execute_timeout = 60s`
    /// - `min_period = 100ms`
    /// - `grace = 10s`
    /// - `bus_capacity = 1024`
    /// - `listening = ListeningPolicy::Terminal`
    fn default() -> Self {
        Self {
            compile_timeout: Duration::from_secs(5),
            execute_timeout: Duration::from_secs(60),
            min_period: Duration::from_millis(100),
            grace: Duration::from_secs(10),
            bus_capacity: 1024,
            listening: ListeningPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Status;

    #[test]
    fn defaults_keep_listening_terminal() {
        let cfg = Config::default();
        assert_eq!(cfg.listening, ListeningPolicy::Terminal);
        assert!(cfg.transitions().targets(Status::Listening).next().is_none());
        assert!(cfg.transitions().allows(Status::Running, Status::Executed));
    }

    #[test]
    fn period_bounds() {
        let cfg = Config::default();
        assert!(cfg.period_allowed(Duration::ZERO));
        assert!(cfg.period_allowed(Duration::from_millis(100)));
        assert!(!cfg.period_allowed(Duration::from_millis(99)));
    }

    #[test]
    fn bus_capacity_is_clamped() {
        let cfg = Config {
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
