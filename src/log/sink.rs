//! # Log sink trait
//!
//! `LogSink` is the extension point for plugging a log destination into the
//! harness. Sinks are called synchronously from worker threads and from the
//! manager, so implementations serialize their own output.
//!
//! ## Example
//! ```rust
//! use workvisor::{LogEntry, LogSink};
//!
//! struct Stdout;
//!
//! impl LogSink for Stdout {
//!     fn write(&self, entry: &LogEntry) {
//!         println!("{}: {}", entry.source, entry.message);
//!     }
//!     fn name(&self) -> &'static str { "stdout" }
//! }
//! ```

use super::entry::LogEntry;

/// Contract for log destinations.
///
/// Called from worker threads, group shutdown tasks and the manager. A sink
/// must not block for long: a slow sink delays the worker that logged.
pub trait LogSink: Send + Sync + 'static {
    /// Writes a single entry.
    fn write(&self, entry: &LogEntry);

    /// Human-readable name (for diagnostics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
