//! # Script call site.
//!
//! Scripts go through two bounded phases, each with its own executor and
//! deadline:
//!
//! ```text
//! run_once(source, params)
//!   ├─► compile  on "script compile"   worker, bounded by compile_timeout
//!   └─► eval     on "script execution" worker, bounded by execute_timeout
//! ```
//!
//! A stuck phase surfaces as [`TaskError::Timeout`] and only that phase's
//! worker is replaced; the other keeps serving.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::bounded::BoundedExecutor;
use crate::config::Config;
use crate::error::TaskError;
use crate::events::Bus;

/// Parameters passed to a script evaluation.
pub type ScriptParams = HashMap<String, String>;

/// Blocking script engine.
///
/// Both methods run on a dedicated worker thread and may block or spin;
/// `token` is cancelled when the deadline passes.
pub trait ScriptEngine: Send + Sync + 'static {
    /// Compiled form of a script.
    type Compiled: Send + Sync + 'static;

    /// Parses/compiles `source`.
    fn compile(&self, source: &str, token: &CancellationToken) -> Result<Self::Compiled, TaskError>;

    /// Evaluates a compiled script once.
    fn eval(
        &self,
        script: &Self::Compiled,
        params: &ScriptParams,
        token: &CancellationToken,
    ) -> Result<String, TaskError>;
}

/// Runs scripts on an engine with separate compile and execution bounds.
pub struct ScriptRunner<E: ScriptEngine> {
    engine: Arc<E>,
    compiler: BoundedExecutor,
    executor: BoundedExecutor,
    compile_timeout: Duration,
    execute_timeout: Duration,
}

impl<E: ScriptEngine> ScriptRunner<E> {
    /// Creates a runner using the timeouts from `cfg`.
    pub fn new(engine: E, cfg: &Config) -> Self {
        Self {
            engine: Arc::new(engine),
            compiler: BoundedExecutor::new("script compile"),
            executor: BoundedExecutor::new("script execution"),
            compile_timeout: cfg.compile_timeout,
            execute_timeout: cfg.execute_timeout,
        }
    }

    /// Publishes timeout and worker replacement events of both phases on `bus`.
    #[must_use]
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.compiler = self.compiler.with_bus(bus.clone());
        self.executor = self.executor.with_bus(bus);
        self
    }

    /// Compiles `source` under the compile bound.
    pub async fn compile(&self, source: impl Into<String>) -> Result<Arc<E::Compiled>, TaskError> {
        let engine = Arc::clone(&self.engine);
        let source = source.into();
        let compiled = self
            .compiler
            .run(self.compile_timeout, move |token| {
                engine.compile(&source, &token)
            })
            .await?;
        Ok(Arc::new(compiled))
    }

    /// Evaluates an already compiled script under the execution bound.
    pub async fn execute(
        &self,
        script: Arc<E::Compiled>,
        params: ScriptParams,
    ) -> Result<String, TaskError> {
        let engine = Arc::clone(&self.engine);
        self.executor
            .run(self.execute_timeout, move |token| {
                engine.eval(&script, &params, &token)
            })
            .await
    }

    /// Compiles and evaluates `source` once.
    pub async fn run_once(
        &self,
        source: impl Into<String>,
        params: ScriptParams,
    ) -> Result<String, TaskError> {
        let script = self.compile(source).await?;
        self.execute(script, params).await
    }

    /// Compile-phase executor (diagnostics).
    pub fn compiler(&self) -> &BoundedExecutor {
        &self.compiler
    }

    /// Execution-phase executor (diagnostics).
    pub fn executor(&self) -> &BoundedExecutor {
        &self.executor
    }
}
