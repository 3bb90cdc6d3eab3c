//! # Worker body contract.
//!
//! A [`Work`] value is what a worker polls. It receives a [`CancellationToken`]
//! and should check it (or await `ctx.cancelled()`) inside long cycles so that
//! shutdown is not delayed. The harness cannot preempt a body that ignores it.
//!
//! The tagged result of one cycle decides what happens next:
//!
//! | Result                          | Harness reaction                              |
//! |---------------------------------|-----------------------------------------------|
//! | `Ok(())`                        | wait success interval, poll again             |
//! | `Err(WorkError::Canceled)`      | clean stop                                    |
//! | `Err(WorkError::Recoverable)`   | [`Work::on_failure`]: retry or escalate       |
//! | `Err(WorkError::Fatal)` / panic | log, terminate the thread, escalate           |
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use workvisor::{WorkError, WorkFn, WorkRef};
//!
//! let body: WorkRef = WorkFn::arc(|ctx: CancellationToken| async move {
//!     if ctx.is_cancelled() {
//!         return Err(WorkError::Canceled);
//!     }
//!     // one polling cycle...
//!     Ok(())
//! });
//! # let _ = body;
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::WorkError;

/// Shared handle to a worker body.
pub type WorkRef = Arc<dyn Work>;

/// Verdict for a recoverable failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handling {
    /// Log at Warning and retry after the failure interval.
    Retry,
    /// Treat the failure as fatal.
    Escalate,
}

/// # Repeatable, cancelable unit of work.
///
/// Only [`poll`](Work::poll) is required; the hooks default to no-ops and to
/// retrying every recoverable failure.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use workvisor::{Handling, Work, WorkError};
///
/// struct Feed;
///
/// #[async_trait]
/// impl Work for Feed {
///     async fn poll(&self, _ctx: CancellationToken) -> Result<(), WorkError> {
///         Err(WorkError::recoverable("upstream closed"))
///     }
///
///     fn on_failure(&self, error: &WorkError) -> Handling {
///         match error {
///             WorkError::Recoverable { error } if error.contains("auth") => Handling::Escalate,
///             _ => Handling::Retry,
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Work: Send + Sync + 'static {
    /// Runs one polling cycle.
    async fn poll(&self, ctx: CancellationToken) -> Result<(), WorkError>;

    /// Called by `Worker::start` on the caller's thread, before the worker
    /// thread exists. An error aborts the start.
    fn on_start(&self, _args: &[String]) -> Result<(), WorkError> {
        Ok(())
    }

    /// Called once, just before cancellation is requested.
    fn on_stop(&self) {}

    /// Decides whether a recoverable failure is retried.
    fn on_failure(&self, _error: &WorkError) -> Handling {
        Handling::Retry
    }
}

/// Closure-backed work body.
///
/// Wraps `F: Fn(CancellationToken) -> Fut`, producing a fresh future per cycle.
/// State shared between cycles must live in an explicit `Arc<...>` captured by
/// the closure.
pub struct WorkFn<F> {
    f: F,
}

impl<F> WorkFn<F> {
    /// Creates a closure-backed body.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the body and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Work for WorkFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), WorkError>> + Send + 'static,
{
    async fn poll(&self, ctx: CancellationToken) -> Result<(), WorkError> {
        (self.f)(ctx).await
    }
}
