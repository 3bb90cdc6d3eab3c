//! # Polling loop of a single worker.
//!
//! Runs on the worker's own thread, inside a current-thread tokio runtime.
//!
//! ## Flow
//! ```text
//! loop {
//!   ├─► token cancelled? ──────────────────────────► exit (clean)
//!   ├─► run_cycle(work, token)
//!   │       ├─ Ok              ─► delay = success
//!   │       ├─ Canceled        ─► exit (clean)
//!   │       ├─ Recoverable     ─► work.on_failure()
//!   │       │                      ├─ Retry    ─► log Warning, delay = failure
//!   │       │                      └─ Escalate ─► exit (fatal)
//!   │       └─ Fatal / panic   ─► exit (fatal)
//!   └─► wait_or_cancel(delay) ── cancelled ─────────► exit (clean)
//! }
//! ```
//!
//! ## Rules
//! - Cycles run **sequentially**; never two at once for one worker
//! - Cancellation is checked **before** every cycle and **during** every wait
//! - Fatal results are never retried

use std::any::Any;
use std::cell::Cell;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::time;
use tokio_util::sync::CancellationToken;

use super::core::WorkerInner;
use super::work::{Handling, Work};
use crate::error::{FatalError, WorkError};
use crate::log::Severity;

thread_local! {
    static IN_CYCLE: Cell<bool> = const { Cell::new(false) };
}

/// Whether the current thread is inside a polling cycle.
///
/// Panics raised there are converted into fatal results by [`run_cycle`], so
/// the process-wide panic hook leaves them to the worker's own fatal path.
pub(crate) fn in_cycle() -> bool {
    IN_CYCLE.with(Cell::get)
}

/// Drives `inner.work` until cancellation, a clean stop, or a fatal failure.
pub(crate) async fn poll_loop(inner: &WorkerInner) -> Result<(), FatalError> {
    let token = inner.token();
    let intervals = inner.intervals();
    let mut cycle: u64 = 0;

    loop {
        if token.is_cancelled() {
            return Ok(());
        }
        cycle += 1;

        let delay = match run_cycle(inner.work(), token).await {
            Ok(()) => intervals.success,
            Err(WorkError::Canceled) => return Ok(()),
            Err(err) if err.is_retryable() => match inner.work().on_failure(&err) {
                Handling::Retry => {
                    inner.log(
                        format!(
                            "Worker ({}) cycle {cycle} failed, retrying in {:?}: {err}",
                            inner.name(),
                            intervals.failure
                        ),
                        Severity::Warning,
                    );
                    intervals.failure
                }
                Handling::Escalate => return Err(FatalError::new(inner.name(), err.to_string())),
            },
            Err(err) => return Err(FatalError::new(inner.name(), err.to_string())),
        };

        if !wait_or_cancel(token, delay).await {
            return Ok(());
        }
    }
}

/// Executes one cycle, converting a panic in the body into [`WorkError::Fatal`].
pub(crate) async fn run_cycle(work: &dyn Work, token: &CancellationToken) -> Result<(), WorkError> {
    let ctx = token.clone();
    // the async block defers the call so a panic while building the future is caught too
    let cycle = AssertUnwindSafe(async move { work.poll(ctx).await });

    IN_CYCLE.with(|c| c.set(true));
    let res = cycle.catch_unwind().await;
    IN_CYCLE.with(|c| c.set(false));

    match res {
        Ok(r) => r,
        Err(panic_err) => Err(WorkError::fatal(format!(
            "panicked: {}",
            panic_message(&*panic_err)
        ))),
    }
}

/// Waits for `delay` unless cancellation arrives first.
///
/// Returns `true` when the full delay elapsed, `false` when cancelled.
pub(crate) async fn wait_or_cancel(token: &CancellationToken, delay: Duration) -> bool {
    if delay.is_zero() {
        return !token.is_cancelled();
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        _ = time::sleep(delay) => true,
    }
}

pub(crate) fn panic_message(any: &(dyn Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
