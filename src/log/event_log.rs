//! # Host log sinks
//!
//! [`EventLog`] writes entries as `tracing` events, which is how a service
//! process reaches the host log (journald, a log file, or whatever subscriber
//! the binary installs). [`TelemetrySink`] mirrors entries as trace records
//! tagged with an instrumentation key.
//!
//! ## Example output (with a `fmt` subscriber)
//! ```text
//! INFO workvisor::event_log: Worker (quotes) started successfully. source="feeds"
//! WARN workvisor::event_log: recoverable failure: upstream closed source="feeds"
//! ```

use std::sync::Arc;

use super::entry::{LogEntry, Severity};
use super::sink::LogSink;

/// Host log writer.
#[derive(Clone, Debug, Default)]
pub struct EventLog;

impl EventLog {
    /// Construct a new [`EventLog`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl LogSink for EventLog {
    fn write(&self, e: &LogEntry) {
        let source = &*e.source;
        match e.severity {
            Severity::Information => {
                tracing::info!(target: "workvisor::event_log", source, "{}", e.message);
            }
            Severity::Warning => {
                tracing::warn!(target: "workvisor::event_log", source, "{}", e.message);
            }
            Severity::Error => {
                tracing::error!(target: "workvisor::event_log", source, "{}", e.message);
            }
        }
    }

    fn name(&self) -> &'static str {
        "EventLog"
    }
}

/// Trace mirror for service-mode entries.
#[derive(Clone, Debug)]
pub struct TelemetrySink {
    key: Arc<str>,
}

impl TelemetrySink {
    /// Creates a mirror that tags every record with `key`.
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self { key: key.into() }
    }

    /// The instrumentation key records are tagged with.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl LogSink for TelemetrySink {
    fn write(&self, e: &LogEntry) {
        let key = &*self.key;
        let source = &*e.source;
        let at = e.timestamp.to_rfc3339();
        match e.severity {
            Severity::Information => {
                tracing::info!(target: "workvisor::telemetry", instrumentation_key = key, source, at = %at, "{}", e.message);
            }
            Severity::Warning => {
                tracing::warn!(target: "workvisor::telemetry", instrumentation_key = key, source, at = %at, "{}", e.message);
            }
            Severity::Error => {
                tracing::error!(target: "workvisor::telemetry", instrumentation_key = key, source, at = %at, "{}", e.message);
            }
        }
    }

    fn name(&self) -> &'static str {
        "TelemetrySink"
    }
}
