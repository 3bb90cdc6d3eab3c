//! # Process entry and the fatal trap.
//!
//! [`ProcessEntry`] is the top of the stack: it prepares a [`ControlManager`],
//! installs the process-wide fatal trap and runs the manager until shutdown.
//!
//! ## Fatal path
//! ```text
//! worker thread: Fatal / Escalate / panic in cycle
//!   └─► group log (Error) ─► WorkerGroup::escalate ─► FatalTrap::fire
//! any other thread: panic
//!   └─► panic hook ──────────────────────────────────► FatalTrap::fire
//!
//! FatalTrap::fire (first call only)
//!   ├─► broadcast "Unhandled failure in host process: …" (Error)
//!   └─► exit(FATAL_EXIT_CODE)
//! ```
//!
//! ## Rules
//! - The trap fires at most once; later failures are ignored
//! - Panics inside a worker cycle are left to the worker's own fatal path,
//!   so its Error entry is written before the broadcast
//! - Graceful shutdown returns `Ok(())` and never touches the trap

use std::fmt;
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::config::HostConfig;
use crate::error::HostError;
use crate::group::WorkerGroup;
use crate::log::Severity;
use crate::manager::{ControlManager, ManagerShared};
use crate::worker::runner;

/// Exit code used after an unhandled failure (`EX_SOFTWARE`).
pub const FATAL_EXIT_CODE: i32 = 70;

type ExitFn = Arc<dyn Fn(i32) + Send + Sync>;

/// Last-resort handler: broadcasts the failure and ends the process.
pub(crate) struct FatalTrap {
    manager: Weak<ManagerShared>,
    exit: ExitFn,
    fired: AtomicBool,
}

impl FatalTrap {
    fn new(manager: Weak<ManagerShared>, exit: ExitFn) -> Self {
        Self {
            manager,
            exit,
            fired: AtomicBool::new(false),
        }
    }

    /// Reports `cause` to every managed group and exits. Only the first call acts.
    pub(crate) fn fire(&self, cause: &str) {
        if self.fired.swap(true, Ordering::AcqRel) {
            return;
        }
        let message = format!("Unhandled failure in host process: {cause}");
        match self.manager.upgrade() {
            Some(manager) => manager.broadcast(&message, Severity::Error),
            None => tracing::error!(target: "workvisor::event_log", "{message}"),
        }
        (self.exit)(FATAL_EXIT_CODE);
    }
}

/// Entry point of a hosted process.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
/// use workvisor::{Intervals, ProcessEntry, WorkError, WorkFn, Worker, WorkerGroup};
///
/// #[tokio::main]
/// async fn main() -> Result<(), workvisor::HostError> {
///     let tick = Worker::new(
///         "tick",
///         Intervals::from_millis(1_000, 10_000),
///         WorkFn::arc(|_ctx: CancellationToken| async { Ok::<_, WorkError>(()) }),
///     );
///     let group = WorkerGroup::new("main", vec![tick])?;
///     ProcessEntry::new().run(vec![group], None, None).await
/// }
/// ```
pub struct ProcessEntry {
    exit: ExitFn,
    panic_hook: bool,
}

impl ProcessEntry {
    /// Entry that exits through [`std::process::exit`] and installs a panic hook.
    pub fn new() -> Self {
        Self {
            exit: Arc::new(|code: i32| {
                std::process::exit(code);
            }),
            panic_hook: true,
        }
    }

    /// Replaces the exit function called by the fatal trap.
    #[must_use]
    pub fn with_exit(mut self, exit: impl Fn(i32) + Send + Sync + 'static) -> Self {
        self.exit = Arc::new(exit);
        self
    }

    /// Skips the process-wide panic hook; only worker failures reach the trap.
    #[must_use]
    pub fn without_panic_hook(mut self) -> Self {
        self.panic_hook = false;
        self
    }

    /// Runs `groups` under `manager` (a default manager when `None`) until shutdown.
    ///
    /// A non-blank `instrumentation_key` enables the telemetry mirror.
    pub async fn run(
        &self,
        groups: Vec<Arc<WorkerGroup>>,
        manager: Option<ControlManager>,
        instrumentation_key: Option<String>,
    ) -> Result<(), HostError> {
        let manager = manager.unwrap_or_else(|| ControlManager::new(HostConfig::default()));
        if let Some(key) = instrumentation_key {
            manager.set_instrumentation_key(key)?;
        }

        let trap = Arc::new(FatalTrap::new(manager.downgrade(), self.exit.clone()));
        manager.install_trap(trap.clone())?;
        if self.panic_hook {
            install_panic_hook(trap);
        }

        tracing::info!(mode = %manager.mode(), "host starting");
        let res = manager.run(groups).await;
        if let Err(e) = &res {
            tracing::error!(error = %e, label = e.as_label(), "host stopped with error");
        }
        res
    }
}

impl Default for ProcessEntry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProcessEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessEntry")
            .field("panic_hook", &self.panic_hook)
            .finish_non_exhaustive()
    }
}

/// Chains a hook that sends panics outside worker cycles to `trap`.
fn install_panic_hook(trap: Arc<FatalTrap>) {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        previous(info);
        if runner::in_cycle() {
            return;
        }
        trap.fire(&info.to_string());
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HostMode, Intervals};
    use crate::error::WorkError;
    use crate::testing::{wait_until_async, MemoryLog};
    use crate::worker::{WorkFn, Worker};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn service(event: &Arc<MemoryLog>) -> ControlManager {
        ControlManager::builder(HostConfig {
            mode: Some(HostMode::Service),
            ..HostConfig::default()
        })
        .with_event_log(event.clone())
        .build()
    }

    fn recording() -> (ProcessEntry, Arc<Mutex<Vec<i32>>>) {
        let codes = Arc::new(Mutex::new(Vec::new()));
        let c = codes.clone();
        let entry = ProcessEntry::new()
            .without_panic_hook()
            .with_exit(move |code| c.lock().unwrap().push(code));
        (entry, codes)
    }

    fn failing(name: &str, error: &'static str) -> Worker {
        Worker::new(
            name,
            Intervals::from_millis(10, 10),
            WorkFn::arc(move |_ctx: CancellationToken| async move {
                Err::<(), WorkError>(WorkError::fatal(error))
            }),
        )
    }

    fn ticking(name: &str) -> Worker {
        Worker::new(
            name,
            Intervals::from_millis(10, 10),
            WorkFn::arc(|_ctx: CancellationToken| async { Ok::<(), WorkError>(()) }),
        )
    }

    /// Runs the entry until `codes` is non-empty, then stops the host.
    async fn run_until_exit(
        entry: ProcessEntry,
        manager: ControlManager,
        groups: Vec<Arc<WorkerGroup>>,
        codes: &Arc<Mutex<Vec<i32>>>,
    ) {
        let stop = manager.stop_token();
        let host = tokio::spawn(async move { entry.run(groups, Some(manager), None).await });

        assert!(
            wait_until_async(Duration::from_secs(5), || !codes.lock().unwrap().is_empty()).await
        );
        // give a second failing worker the chance to reach the trap
        tokio::time::sleep(Duration::from_millis(100)).await;
        stop.cancel();
        host.await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_fatal_worker_trips_trap_once() {
        let event = MemoryLog::new();
        let manager = service(&event);
        let (entry, codes) = recording();

        let broken = WorkerGroup::new("broken", vec![failing("disk", "disk gone")]).unwrap();
        let fine = WorkerGroup::new("fine", vec![ticking("tick")]).unwrap();
        run_until_exit(entry, manager, vec![broken, fine], &codes).await;

        assert_eq!(*codes.lock().unwrap(), vec![FATAL_EXIT_CODE]);

        let errors: Vec<_> = event
            .entries()
            .into_iter()
            .filter(|e| e.severity == Severity::Error)
            .collect();
        assert_eq!(errors.len(), 3);
        assert_eq!(&*errors[0].source, "broken");
        assert!(errors[0].message.contains("disk gone"));
        assert!(errors[1..]
            .iter()
            .all(|e| e.message.starts_with("Unhandled failure in host process:")));
        let sources: Vec<String> = errors[1..].iter().map(|e| e.source.to_string()).collect();
        assert_eq!(sources, vec!["broken", "fine"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_two_fatal_workers_exit_once() {
        let event = MemoryLog::new();
        let manager = service(&event);
        let (entry, codes) = recording();

        let group = WorkerGroup::new(
            "twins",
            vec![failing("left", "left gone"), failing("right", "right gone")],
        )
        .unwrap();
        run_until_exit(entry, manager, vec![group], &codes).await;

        assert_eq!(codes.lock().unwrap().len(), 1);
        let broadcasts = event
            .messages()
            .iter()
            .filter(|m| m.starts_with("Unhandled failure in host process:"))
            .count();
        assert_eq!(broadcasts, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_worker_reaches_trap() {
        let event = MemoryLog::new();
        let manager = service(&event);
        let (entry, codes) = recording();

        let worker = Worker::new(
            "boom",
            Intervals::from_millis(10, 10),
            WorkFn::arc(|_ctx: CancellationToken| async {
                if true {
                    panic!("index out of range");
                }
                Ok::<(), WorkError>(())
            }),
        );
        let group = WorkerGroup::new("g", vec![worker]).unwrap();
        run_until_exit(entry, manager, vec![group], &codes).await;

        assert_eq!(*codes.lock().unwrap(), vec![FATAL_EXIT_CODE]);
        let messages = event.messages();
        let worker_error = messages
            .iter()
            .position(|m| m.contains("panicked: index out of range"))
            .unwrap();
        let broadcast = messages
            .iter()
            .position(|m| m.starts_with("Unhandled failure in host process:"))
            .unwrap();
        assert!(worker_error < broadcast);
    }

    #[tokio::test]
    async fn test_empty_group_list_is_rejected() {
        let event = MemoryLog::new();
        let (entry, codes) = recording();
        let err = entry
            .run(Vec::new(), Some(service(&event)), Some("key".into()))
            .await
            .unwrap_err();

        assert_eq!(err.as_label(), "host_no_groups");
        assert!(codes.lock().unwrap().is_empty());
    }
}
