//! # Example: ping
//!
//! A device ping task scheduled every second, plus a script run that hangs.
//!
//! Demonstrates how to:
//! - Correlate a device reply with [`Correlator`] (the ack arrives on another task).
//! - Schedule a [`TaskHandle`] in the [`Registry`] and watch it through the bus.
//! - Bound a stuck script with [`ScriptRunner`] and keep using it afterwards.
//!
//! ## Flow
//! ```text
//! Registry::schedule(ping-1, every 1s)
//!   └─► TaskHandle::run()
//!         └─► Correlator::await_reply("ping-1-msgN", 3s, send)
//!               └─► fake device: signal("ping-1-msgN", "pong") after 200ms
//!                   (every third ping is lost ─► timeout ─► Failed, swallowed)
//!
//! ScriptRunner::run_once("forever") ─► TaskError::Timeout after 500ms, worker replaced
//! ScriptRunner::run_once("2+2")     ─► "4"
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example ping --features logging
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use taskhub::{
    Config, Correlator, LogWriter, Registry, Schedule, ScriptEngine, ScriptParams, ScriptRunner,
    Task, TaskError, TaskHandle,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

struct Ping {
    replies: Arc<Correlator<String>>,
    seq: AtomicU32,
}

#[async_trait]
impl Task for Ping {
    type Output = String;

    fn name(&self) -> &str {
        "ping"
    }

    fn description(&self) -> Option<String> {
        Some("round-trip probe of device 1".into())
    }

    async fn work(&self, _ctx: CancellationToken) -> Result<String, TaskError> {
        let n = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let key = format!("ping-1-msg{n}");
        let timeout = Duration::from_secs(3);

        let device = Arc::clone(&self.replies);
        let reply_key = key.clone();
        let send = move || {
            if n % 3 == 0 {
                return; // lost on the air
            }
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                device.signal(&reply_key, "pong".to_string());
            });
        };

        self.replies
            .await_reply(&key, timeout, send)
            .await
            .ok_or(TaskError::Timeout {
                timeout,
                operation: format!("ack for {key}"),
            })
    }

    fn on_exception(&self, _err: &TaskError) -> bool {
        false
    }
}

/// Evaluates sums like `2+2`; `forever` never finishes.
struct Adder;

impl ScriptEngine for Adder {
    type Compiled = Vec<i64>;

    fn compile(&self, source: &str, _token: &CancellationToken) -> Result<Vec<i64>, TaskError> {
        if source == "forever" {
            return Ok(Vec::new());
        }
        source
            .split('+')
            .map(|t| t.trim().parse::<i64>().map_err(|e| TaskError::fail(e.to_string())))
            .collect()
    }

    fn eval(
        &self,
        script: &Vec<i64>,
        _params: &ScriptParams,
        _token: &CancellationToken,
    ) -> Result<String, TaskError> {
        if script.is_empty() {
            loop {
                std::thread::sleep(Duration::from_secs(1));
            }
        }
        Ok(script.iter().sum::<i64>().to_string())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cfg = Config {
        execute_timeout: Duration::from_millis(500),
        ..Config::default()
    };
    let registry = Registry::new(cfg.clone());
    let _writer = LogWriter::new().spawn(registry.bus());

    let ping = TaskHandle::new(
        "ping-1",
        Ping {
            replies: Arc::new(Correlator::new()),
            seq: AtomicU32::new(0),
        },
    )
    .with_table(cfg.transitions())
    .with_bus(registry.bus().clone());
    let ping = Arc::new(ping);

    registry
        .schedule(ping.clone(), Schedule::with_delay(Duration::from_secs(1)))
        .await?;

    let runner = ScriptRunner::new(Adder, &cfg).with_bus(registry.bus().clone());
    match runner.run_once("forever", ScriptParams::new()).await {
        Err(e) => tracing::warn!(error = %e.as_message(), "script stuck"),
        Ok(out) => tracing::info!(%out, "unexpected result"),
    }
    let out = runner.run_once("2+2", ScriptParams::new()).await?;
    tracing::info!(%out, generation = runner.executor().generation(), "script evaluated");

    tokio::time::sleep(Duration::from_secs(5)).await;
    for info in registry.snapshot().await {
        tracing::info!(
            task = %info.id,
            status = %info.status,
            runs = info.run_count,
            error = ?info.error,
            "snapshot"
        );
    }

    registry.shutdown().await?;
    Ok(())
}
