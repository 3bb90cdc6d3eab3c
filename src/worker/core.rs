//! # Worker: one body, one thread.
//!
//! A [`Worker`] pairs a [`Work`] body with its [`Intervals`] and owns exactly
//! one OS thread once started. The thread builds a current-thread tokio
//! runtime and drives [`poll_loop`](super::runner::poll_loop) until
//! cancellation or a fatal failure.
//!
//! ## Lifecycle
//! ```text
//!            start()            request_stop()              thread exits
//! Created ───────────► Running ───────────────► StopRequested ───────────► Stopped
//!    │                    │                                                  ▲
//!    │ request_stop()     └──────────── clean stop / fatal failure ──────────┘
//!    └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//! - `start` returns as soon as the thread is spawned; it never waits for a cycle
//! - `request_stop` never blocks; `wait_for_exit` blocks until the thread is gone
//! - `wait_for_exit` may be called any number of times, from any thread
//! - `dispose` is idempotent; `start`/`request_stop` fail afterwards

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::thread::{self, JoinHandle};

use tokio_util::sync::CancellationToken;

use super::runner;
use super::work::{Work, WorkRef};
use crate::config::Intervals;
use crate::error::{FatalError, HostError};
use crate::group::WorkerGroup;
use crate::log::{EventLog, LogEntry, LogSink, Severity};

/// Observable lifecycle state of a [`Worker`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    /// Constructed, no thread yet.
    Created,
    /// Thread spawned and polling.
    Running,
    /// Cancellation requested, thread not yet gone.
    StopRequested,
    /// Thread terminated (or never started and stopped).
    Stopped,
}

/// State shared between the [`Worker`] handle and its thread.
pub(crate) struct WorkerInner {
    name: Arc<str>,
    intervals: Intervals,
    work: WorkRef,
    token: CancellationToken,
    owner: OnceLock<Weak<WorkerGroup>>,
    state: Mutex<WorkerState>,
    stop_requested: AtomicBool,
    disposed: AtomicBool,
}

impl WorkerInner {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn intervals(&self) -> Intervals {
        self.intervals
    }

    pub(crate) fn work(&self) -> &dyn Work {
        self.work.as_ref()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    fn lock_state(&self) -> MutexGuard<'_, WorkerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn owner(&self) -> Option<Arc<WorkerGroup>> {
        self.owner.get().and_then(Weak::upgrade)
    }

    /// Logs through the owning group, or straight to the host log when detached.
    pub(crate) fn log(&self, message: impl Into<String>, severity: Severity) {
        match self.owner() {
            Some(group) => group.log_message(message, severity),
            None => EventLog::new().write(&LogEntry::new(self.name.clone(), message, severity)),
        }
    }

    /// Reports a fatal failure and hands it to the process trap, if any.
    fn escalate(&self, fatal: FatalError) {
        self.log(fatal.to_string(), Severity::Error);
        if let Some(group) = self.owner() {
            group.escalate(&fatal);
        }
    }
}

/// Supervised unit of repeated background work.
///
/// Cloning a `Worker` yields another handle to the same worker and thread.
///
/// # Example
/// ```no_run
/// use tokio_util::sync::CancellationToken;
/// use workvisor::{Intervals, WorkError, WorkFn, Worker};
///
/// let worker = Worker::new(
///     "quotes",
///     Intervals::from_millis(500, 5_000),
///     WorkFn::arc(|_ctx: CancellationToken| async { Ok::<_, WorkError>(()) }),
/// );
/// worker.start(&[]).unwrap();
/// worker.stop().unwrap();
/// ```
#[derive(Clone)]
pub struct Worker {
    inner: Arc<WorkerInner>,
    thread: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Worker {
    /// Creates a worker in the `Created` state. No thread is spawned yet.
    pub fn new(name: impl Into<Arc<str>>, intervals: Intervals, work: WorkRef) -> Self {
        Self {
            inner: Arc::new(WorkerInner {
                name: name.into(),
                intervals,
                work,
                token: CancellationToken::new(),
                owner: OnceLock::new(),
                state: Mutex::new(WorkerState::Created),
                stop_requested: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
            }),
            thread: Arc::new(Mutex::new(None)),
        }
    }

    /// Worker name (also the name of its OS thread).
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Success/failure intervals.
    pub fn intervals(&self) -> Intervals {
        self.inner.intervals
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        *self.inner.lock_state()
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Runs the start hook, then spawns the worker thread and returns.
    ///
    /// ### Errors
    /// - [`HostError::Disposed`] after `dispose`
    /// - [`HostError::AlreadyStarted`] unless the worker is `Created`
    /// - [`HostError::StartHook`] when [`Work::on_start`] fails (state stays `Created`)
    /// - [`HostError::Spawn`] when the OS refuses the thread (state stays `Created`)
    pub fn start(&self, args: &[String]) -> Result<(), HostError> {
        self.ensure_live()?;
        let mut slot = self.lock_thread();
        self.transition(WorkerState::Created, WorkerState::Running)?;

        if let Err(error) = self.inner.work.on_start(args) {
            self.set_state(WorkerState::Created);
            return Err(HostError::StartHook {
                worker: self.name().to_string(),
                error,
            });
        }

        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name(self.name().to_string())
            .spawn(move || thread_main(inner));

        match spawned {
            Ok(handle) => {
                *slot = Some(handle);
                Ok(())
            }
            Err(source) => {
                self.set_state(WorkerState::Created);
                Err(HostError::Spawn {
                    worker: self.name().to_string(),
                    source,
                })
            }
        }
    }

    /// Runs the stop hook and requests cancellation. Does not wait.
    ///
    /// Repeated calls are no-ops: the hook runs and the signal is raised once.
    pub fn request_stop(&self) -> Result<(), HostError> {
        self.ensure_live()?;
        if self.inner.stop_requested.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.inner.work.on_stop();
        self.inner.token.cancel();

        let mut state = self.inner.lock_state();
        *state = match *state {
            WorkerState::Created => WorkerState::Stopped,
            WorkerState::Running => WorkerState::StopRequested,
            other => other,
        };
        Ok(())
    }

    /// Blocks until the worker thread has terminated.
    ///
    /// Returns at once for a worker that was never started or already joined.
    /// There is no timeout: a body that ignores cancellation blocks forever.
    pub fn wait_for_exit(&self) {
        let mut slot = self.lock_thread();
        if let Some(handle) = slot.take() {
            // thread_main catches the loop's panics; only a panicking sink during
            // escalation ends up here, and the panic hook has reported it already
            if handle.join().is_err() {
                tracing::error!(worker = self.name(), "worker thread panicked while reporting a failure");
            }
        }
    }

    /// [`request_stop`](Self::request_stop) followed by [`wait_for_exit`](Self::wait_for_exit).
    pub fn stop(&self) -> Result<(), HostError> {
        self.request_stop()?;
        self.wait_for_exit();
        Ok(())
    }

    /// Marks the worker disposed and releases its cancellation token.
    ///
    /// A running thread observes the released token as a stop request.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.token.cancel();
    }

    /// Binds the worker to its owning group; allowed once.
    pub(crate) fn set_owner(&self, group: Weak<WorkerGroup>) -> Result<(), HostError> {
        self.inner
            .owner
            .set(group)
            .map_err(|_| HostError::OwnerAlreadySet {
                worker: self.name().to_string(),
            })
    }

    pub(crate) fn has_owner(&self) -> bool {
        self.inner.owner.get().is_some()
    }

    /// Whether both handles refer to the same worker.
    pub(crate) fn same_as(&self, other: &Worker) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn ensure_live(&self) -> Result<(), HostError> {
        if self.is_disposed() {
            return Err(HostError::disposed(format!("worker {:?}", self.name())));
        }
        Ok(())
    }

    fn transition(&self, from: WorkerState, to: WorkerState) -> Result<(), HostError> {
        let mut state = self.inner.lock_state();
        if *state != from {
            return Err(HostError::AlreadyStarted {
                worker: self.name().to_string(),
            });
        }
        *state = to;
        Ok(())
    }

    fn set_state(&self, to: WorkerState) {
        *self.inner.lock_state() = to;
    }

    fn lock_thread(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.thread.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name())
            .field("intervals", &self.intervals())
            .field("state", &self.state())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Body of the worker thread.
fn thread_main(inner: Arc<WorkerInner>) {
    let outcome = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => panic::catch_unwind(AssertUnwindSafe(|| rt.block_on(runner::poll_loop(&inner))))
            .unwrap_or_else(|panic_err| {
                Err(FatalError::new(
                    inner.name(),
                    format!("panicked: {}", runner::panic_message(&*panic_err)),
                ))
            }),
        Err(e) => Err(FatalError::new(
            inner.name(),
            format!("cannot build worker runtime: {e}"),
        )),
    };

    *inner.lock_state() = WorkerState::Stopped;
    if let Err(fatal) = outcome {
        inner.escalate(fatal);
    }
}
