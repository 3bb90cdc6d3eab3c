//! Log entries and the sinks that receive them.
//!
//! Every status message produced by the harness becomes a [`LogEntry`] and is
//! written to one [`LogSink`]. The [`ControlManager`](crate::ControlManager)
//! picks the sink according to the hosting mode.
//!
//! ## Contents
//! - [`Severity`], [`LogEntry`] entry data model
//! - [`LogSink`] sink contract
//! - [`EventLog`] host log written through `tracing`
//! - [`TelemetrySink`] trace mirror keyed by an instrumentation key
//! - [`ConsoleLog`], [`ConsoleStyle`], [`EntryStyle`] colored console output
//!
//! ## Routing
//! ```text
//! Worker ──► WorkerGroup::log_message ──► ControlManager::log_message
//!                                               │
//!                         ┌─────────────────────┼────────────────────┐
//!                         ▼                     ▼                    ▼
//!                 Service: EventLog   (+ TelemetrySink)   Interactive: ConsoleLog
//! ```

mod console;
mod entry;
mod event_log;
mod sink;

pub use console::{ConsoleLog, ConsoleStyle, ConsoleTarget, EntryStyle};
pub use entry::{LogEntry, Severity};
pub use event_log::{EventLog, TelemetrySink};
pub use sink::LogSink;
