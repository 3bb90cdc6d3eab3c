//! Error types used by the workvisor harness and by worker bodies.
//!
//! This module defines three error types:
//!
//! - [`WorkError`] - the tagged outcome of one polling cycle.
//! - [`HostError`] - usage and runtime errors raised by workers, groups and the manager.
//! - [`FatalError`] - an unrecoverable worker failure on its way to the process trap.
//!
//! The enums provide `as_label` helpers for logs, and [`WorkError::is_retryable`]
//! tells the polling loop whether a failure may be retried at all.

use thiserror::Error;

/// # Errors produced by one polling cycle.
///
/// A work body returns `Ok(())` for a clean cycle, or one of these variants.
/// Only [`WorkError::Recoverable`] is ever retried.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkError {
    /// The cycle failed but the worker may retry after its failure interval.
    #[error("recoverable failure: {error}")]
    Recoverable {
        /// The underlying error message.
        error: String,
    },

    /// Non-recoverable failure; terminates the worker thread.
    #[error("fatal failure: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// The body observed cancellation and stopped cleanly.
    #[error("cancellation honored")]
    Canceled,
}

impl WorkError {
    /// Shorthand for [`WorkError::Recoverable`].
    pub fn recoverable(error: impl Into<String>) -> Self {
        WorkError::Recoverable {
            error: error.into(),
        }
    }

    /// Shorthand for [`WorkError::Fatal`].
    pub fn fatal(error: impl Into<String>) -> Self {
        WorkError::Fatal {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use workvisor::WorkError;
    ///
    /// assert_eq!(WorkError::recoverable("io").as_label(), "work_recoverable");
    /// assert_eq!(WorkError::Canceled.as_label(), "work_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkError::Recoverable { .. } => "work_recoverable",
            WorkError::Fatal { .. } => "work_fatal",
            WorkError::Canceled => "work_canceled",
        }
    }

    /// Indicates whether the polling loop may retry after this error.
    ///
    /// # Example
    /// ```
    /// use workvisor::WorkError;
    ///
    /// assert!(WorkError::recoverable("timeout").is_retryable());
    /// assert!(!WorkError::fatal("corrupt state").is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkError::Recoverable { .. })
    }
}

/// # Errors produced by the harness itself.
///
/// Usage errors (disposed workers, owners set twice, empty group lists, invalid
/// enumeration text) are returned synchronously at the call site.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HostError {
    /// The worker or group was disposed before the call.
    #[error("{what} has been disposed")]
    Disposed {
        /// Name of the disposed object.
        what: String,
    },

    /// `start` was called on a worker that already left the `Created` state.
    #[error("worker {worker:?} was already started")]
    AlreadyStarted {
        /// Worker name.
        worker: String,
    },

    /// The worker already belongs to a group.
    #[error("worker {worker:?} already has an owning group")]
    OwnerAlreadySet {
        /// Worker name.
        worker: String,
    },

    /// The group is already bound to a control manager.
    #[error("group {group:?} is already bound to a control manager")]
    ManagerAlreadySet {
        /// Group name.
        group: String,
    },

    /// `run` was called with an empty group list.
    #[error("no worker groups to run")]
    NoGroups,

    /// The worker's start hook refused to start.
    #[error("worker {worker:?} failed to start: {error}")]
    StartHook {
        /// Worker name.
        worker: String,
        /// Error reported by the hook.
        error: WorkError,
    },

    /// The OS refused to spawn the worker thread.
    #[error("failed to spawn thread for worker {worker:?}: {source}")]
    Spawn {
        /// Worker name.
        worker: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Text did not name a valid severity.
    #[error("invalid severity {value:?}")]
    InvalidSeverity {
        /// Offending input.
        value: String,
    },

    /// Text did not name a valid host mode.
    #[error("invalid host mode {value:?}")]
    InvalidMode {
        /// Offending input.
        value: String,
    },

    /// Registering OS shutdown signal handlers failed.
    #[error("failed to listen for shutdown signals: {0}")]
    Signal(#[source] std::io::Error),

    /// A set-once manager setting was assigned twice.
    #[error("{setting} is already configured")]
    AlreadyConfigured {
        /// Name of the setting.
        setting: &'static str,
    },
}

impl HostError {
    pub(crate) fn disposed(what: impl Into<String>) -> Self {
        HostError::Disposed { what: what.into() }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use workvisor::HostError;
    ///
    /// assert_eq!(HostError::NoGroups.as_label(), "host_no_groups");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            HostError::Disposed { .. } => "host_disposed",
            HostError::AlreadyStarted { .. } => "host_already_started",
            HostError::OwnerAlreadySet { .. } => "host_owner_already_set",
            HostError::ManagerAlreadySet { .. } => "host_manager_already_set",
            HostError::NoGroups => "host_no_groups",
            HostError::StartHook { .. } => "host_start_hook",
            HostError::Spawn { .. } => "host_spawn",
            HostError::InvalidSeverity { .. } => "host_invalid_severity",
            HostError::InvalidMode { .. } => "host_invalid_mode",
            HostError::Signal(_) => "host_signal",
            HostError::AlreadyConfigured { .. } => "host_already_configured",
        }
    }
}

/// An unrecoverable worker failure.
///
/// Carries the worker name so the process trap can attribute the failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unhandled failure in worker {worker:?}: {cause}")]
pub struct FatalError {
    /// Name of the worker whose thread terminated.
    pub worker: String,
    /// Description of what went wrong.
    pub cause: String,
}

impl FatalError {
    pub(crate) fn new(worker: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            worker: worker.into(),
            cause: cause.into(),
        }
    }
}
