//! # Demo: heartbeat
//!
//! Hosts two workers in one group:
//! - `heartbeat` logs a beat every `--interval-ms`;
//! - `flaky` fails every third cycle with a recoverable error, which the
//!   harness logs at Warning before retrying after the failure interval.
//!
//! ## Flow
//! ```text
//! ProcessEntry::run
//!   └─► ControlManager (mode from --mode, or detected)
//!         └─► WorkerGroup "demo"
//!               ├─► Worker "heartbeat": Ok every cycle
//!               └─► Worker "flaky":     Ok, Ok, Recoverable, ...
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example heartbeat -- --mode console
//! RUST_LOG=debug cargo run --example heartbeat -- --mode service -- --region eu
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use workvisor::{
    ControlManager, HostConfig, HostMode, Intervals, ProcessEntry, WorkError, WorkFn, Worker,
    WorkerGroup,
};

#[derive(Debug, Parser)]
#[command(name = "heartbeat", about = "workvisor demo host")]
struct Args {
    /// Hosting mode: service, interactive or console (detected when omitted).
    #[arg(long)]
    mode: Option<HostMode>,

    /// Enables the telemetry mirror under this key.
    #[arg(long)]
    instrumentation_key: Option<String>,

    /// Wait between successful cycles, in milliseconds.
    #[arg(long, default_value_t = 1_000)]
    interval_ms: u64,

    /// Arguments forwarded to every worker's start hook.
    #[arg(last = true)]
    worker_args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    let beats = Arc::new(AtomicU64::new(0));
    let heartbeat = Worker::new(
        "heartbeat",
        Intervals::from_millis(args.interval_ms, 5_000),
        WorkFn::arc({
            let beats = beats.clone();
            move |_ctx: CancellationToken| {
                let n = beats.fetch_add(1, Ordering::Relaxed) + 1;
                async move {
                    tracing::info!(beat = n, "heartbeat");
                    Ok::<(), WorkError>(())
                }
            }
        }),
    );

    let cycles = Arc::new(AtomicU64::new(0));
    let flaky = Worker::new(
        "flaky",
        Intervals::from_millis(args.interval_ms, args.interval_ms * 2),
        WorkFn::arc(move |ctx: CancellationToken| {
            let n = cycles.fetch_add(1, Ordering::Relaxed) + 1;
            async move {
                tokio::select! {
                    _ = ctx.cancelled() => return Err(WorkError::Canceled),
                    _ = tokio::time::sleep(Duration::from_millis(50)) => {}
                }
                if n % 3 == 0 {
                    return Err(WorkError::recoverable(format!("upstream timed out (cycle {n})")));
                }
                Ok(())
            }
        }),
    );

    let group = WorkerGroup::new("demo", vec![heartbeat, flaky])?;
    let manager = ControlManager::new(HostConfig {
        mode: args.mode,
        args: args.worker_args,
        ..HostConfig::default()
    });

    ProcessEntry::new()
        .run(vec![group], Some(manager), args.instrumentation_key)
        .await?;

    println!("{} heartbeats", beats.load(Ordering::Relaxed));
    Ok(())
}
