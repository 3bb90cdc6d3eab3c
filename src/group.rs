//! # WorkerGroup: a fixed set of workers started and stopped together.
//!
//! The group is the unit a host starts and stops. It owns its workers: it is
//! their log source, their route to the control manager, and their disposer.
//!
//! ## Start / stop
//! ```text
//! start(args):                         stop():
//!   for w in workers (declared order)    for w in workers (declared order)
//!     "Starting worker (w)..."             "Stopping worker (w)..."
//!     w.start(args)?                       w.request_stop()
//!     "Worker (w) started successfully."  JoinSet: spawn_blocking(w.wait_for_exit) per worker
//!                                         "Worker (w) stopped successfully."  (completion order)
//! ```
//!
//! ## Rules
//! - Membership is fixed at construction; a worker belongs to one group only
//! - `start` aborts at the first worker that fails; later workers stay `Created`
//! - Messages go through the control manager when one is attached, otherwise
//!   to the group's fallback sink (the host log by default)
//! - Dropping the last handle disposes the group (and its workers)

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use tokio::task::JoinSet;

use crate::error::{FatalError, HostError};
use crate::log::{EventLog, LogEntry, LogSink, Severity};
use crate::manager::ManagerShared;
use crate::worker::Worker;

/// Ordered, fixed set of workers.
pub struct WorkerGroup {
    name: Arc<str>,
    workers: Vec<Worker>,
    fallback: Arc<dyn LogSink>,
    manager: OnceLock<Weak<ManagerShared>>,
    auto_log: bool,
    disposed: AtomicBool,
}

impl WorkerGroup {
    /// Starts building a group called `name`.
    pub fn builder(name: impl Into<Arc<str>>) -> WorkerGroupBuilder {
        WorkerGroupBuilder::new(name)
    }

    /// Creates a group logging to the host log until a manager is attached.
    ///
    /// Fails with [`HostError::OwnerAlreadySet`] if a worker already belongs to a group.
    pub fn new(name: impl Into<Arc<str>>, workers: Vec<Worker>) -> Result<Arc<Self>, HostError> {
        Self::builder(name).workers(workers).build()
    }

    /// Creates a group with an explicit fallback sink.
    pub fn with_log(
        name: impl Into<Arc<str>>,
        workers: Vec<Worker>,
        log: Arc<dyn LogSink>,
    ) -> Result<Arc<Self>, HostError> {
        Self::builder(name).workers(workers).log(log).build()
    }

    /// Group name; the `source` of every entry the group logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Members in declaration order.
    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Starts every worker in declaration order.
    ///
    /// Returns the first worker error; the remaining workers are not started.
    pub fn start(&self, args: &[String]) -> Result<(), HostError> {
        self.ensure_live()?;
        for w in &self.workers {
            self.status(format!("Starting worker ({})...", w.name()));
            w.start(args)?;
            self.status(format!("Worker ({}) started successfully.", w.name()));
        }
        Ok(())
    }

    /// Requests cancellation of every worker in declaration order. Does not wait.
    ///
    /// A worker that refuses the request does not shield the ones after it;
    /// the first refusal is returned once every worker has been asked.
    pub fn request_stop(&self) -> Result<(), HostError> {
        self.ensure_live()?;
        let mut first_err = None;
        for w in &self.workers {
            self.status(format!("Stopping worker ({})...", w.name()));
            if let Err(e) = w.request_stop() {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Waits for every worker thread, joining them concurrently on the
    /// blocking pool. Each completion is logged as it happens.
    pub async fn wait_for_exit(&self) {
        let mut joins = JoinSet::new();
        for w in &self.workers {
            let w = w.clone();
            joins.spawn_blocking(move || {
                w.wait_for_exit();
                w
            });
        }

        while let Some(res) = joins.join_next().await {
            match res {
                Ok(w) => self.status(format!("Worker ({}) stopped successfully.", w.name())),
                Err(e) => self.log_message(format!("Worker join failed: {e}"), Severity::Error),
            }
        }
    }

    /// [`request_stop`](Self::request_stop) followed by [`wait_for_exit`](Self::wait_for_exit).
    pub async fn stop(&self) -> Result<(), HostError> {
        self.request_stop()?;
        self.wait_for_exit().await;
        Ok(())
    }

    /// Interactive start: [`start`](Self::start) framed by group-level messages.
    pub fn manual_start(&self, args: &[String]) -> Result<(), HostError> {
        self.status("Starting group...");
        self.start(args)?;
        self.status("Group started.");
        Ok(())
    }

    /// Interactive stop: [`stop`](Self::stop) framed by group-level messages.
    pub async fn manual_stop(&self) -> Result<(), HostError> {
        self.status("Stopping group...");
        self.stop().await?;
        self.status("Group stopped.");
        Ok(())
    }

    /// Logs a message attributed to this group.
    pub fn log_message(&self, message: impl Into<String>, severity: Severity) {
        match self.manager() {
            Some(manager) => manager.log(&self.name, message.into(), severity),
            None => self
                .fallback
                .write(&LogEntry::new(self.name.clone(), message, severity)),
        }
    }

    /// Disposes every worker. Idempotent; `start` fails afterwards.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        for w in &self.workers {
            w.dispose();
        }
    }

    pub(crate) fn set_manager(&self, manager: Weak<ManagerShared>) -> Result<(), HostError> {
        self.manager
            .set(manager)
            .map_err(|_| HostError::ManagerAlreadySet {
                group: self.name.to_string(),
            })
    }

    pub(crate) fn has_manager(&self) -> bool {
        self.manager.get().is_some()
    }

    /// Hands a worker's fatal failure to the process trap, if one is installed.
    pub(crate) fn escalate(&self, fatal: &FatalError) {
        if let Some(trap) = self.manager().and_then(|m| m.trap().cloned()) {
            trap.fire(&fatal.to_string());
        }
    }

    fn manager(&self) -> Option<Arc<ManagerShared>> {
        self.manager.get().and_then(Weak::upgrade)
    }

    fn status(&self, message: impl Into<String>) {
        if self.auto_log {
            self.log_message(message, Severity::Information);
        }
    }

    fn ensure_live(&self) -> Result<(), HostError> {
        if self.is_disposed() {
            return Err(HostError::disposed(format!("group {:?}", self.name())));
        }
        Ok(())
    }
}

impl Drop for WorkerGroup {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for WorkerGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerGroup")
            .field("name", &self.name)
            .field("workers", &self.workers)
            .field("managed", &self.has_manager())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Builder for [`WorkerGroup`].
pub struct WorkerGroupBuilder {
    name: Arc<str>,
    workers: Vec<Worker>,
    log: Option<Arc<dyn LogSink>>,
    auto_log: bool,
}

impl WorkerGroupBuilder {
    fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            workers: Vec::new(),
            log: None,
            auto_log: true,
        }
    }

    /// Appends one worker.
    pub fn worker(mut self, worker: Worker) -> Self {
        self.workers.push(worker);
        self
    }

    /// Appends several workers, keeping their order.
    pub fn workers(mut self, workers: impl IntoIterator<Item = Worker>) -> Self {
        self.workers.extend(workers);
        self
    }

    /// Sink used while no control manager is attached (default: [`EventLog`]).
    pub fn log(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log = Some(sink);
        self
    }

    /// Enables or disables the lifecycle status messages (default: enabled).
    pub fn auto_log(mut self, enabled: bool) -> Self {
        self.auto_log = enabled;
        self
    }

    /// Builds the group and binds it as owner of every worker.
    pub fn build(self) -> Result<Arc<WorkerGroup>, HostError> {
        for (i, w) in self.workers.iter().enumerate() {
            let listed_twice = self.workers[..i].iter().any(|o| o.same_as(w));
            if w.has_owner() || listed_twice {
                return Err(HostError::OwnerAlreadySet {
                    worker: w.name().to_string(),
                });
            }
        }

        let group = Arc::new(WorkerGroup {
            name: self.name,
            workers: self.workers,
            fallback: self
                .log
                .unwrap_or_else(|| Arc::new(EventLog::new()) as Arc<dyn LogSink>),
            manager: OnceLock::new(),
            auto_log: self.auto_log,
            disposed: AtomicBool::new(false),
        });

        for w in &group.workers {
            if let Err(e) = w.set_owner(Arc::downgrade(&group)) {
                // another group claimed the worker meanwhile; leave the workers untouched on drop
                group.disposed.store(true, Ordering::Release);
                return Err(e);
            }
        }
        Ok(group)
    }
}
