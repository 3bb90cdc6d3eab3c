//! # workvisor
//!
//! **Workvisor** hosts long-running background workers inside a process that
//! runs either as an OS-managed service or interactively in a console.
//!
//! Each worker owns one OS thread and polls its body repeatedly, waiting a
//! success or failure interval between cycles. Workers are started and
//! stopped in groups; a control manager binds the groups to a hosting mode
//! and decides where their status messages go.
//!
//! ## Architecture
//! ### Overview
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  ProcessEntry                                                     │
//! │  - FatalTrap (broadcast + exit 70, fires once)                    │
//! │  - panic hook (chained, skips panics inside worker cycles)        │
//! └────────────────────────────────┬──────────────────────────────────┘
//!                                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  ControlManager (HostMode::Service | HostMode::Interactive)       │
//! │  - routes messages: EventLog (+ TelemetrySink) | ConsoleLog       │
//! │  - waits for: OS signal | stop token | Enter (interactive)        │
//! └──────┬──────────────────────────────────────────────┬─────────────┘
//!        ▼                                              ▼
//! ┌──────────────────────────┐                ┌──────────────────────────┐
//! │  WorkerGroup "feeds"     │                │  WorkerGroup "reports"   │
//! │  start: sequential       │                │  start: sequential       │
//! │  stop:  JoinSet joins    │                │  stop:  JoinSet joins    │
//! └──────┬───────────┬───────┘                └──────┬───────────────────┘
//!        ▼           ▼                               ▼
//!   ┌─────────┐ ┌─────────┐                     ┌─────────┐
//!   │ Worker  │ │ Worker  │                     │ Worker  │
//!   │ thread  │ │ thread  │                     │ thread  │
//!   └─────────┘ └─────────┘                     └─────────┘
//! ```
//!
//! ### Worker cycle
//! ```text
//! loop {
//!   ├─► cancelled? ─► exit
//!   ├─► work.poll(ctx)
//!   │       ├─ Ok          ─► wait success interval
//!   │       ├─ Canceled    ─► exit
//!   │       ├─ Recoverable ─► on_failure: Retry ─► Warning, wait failure interval
//!   │       │                             Escalate ─► fatal
//!   │       └─ Fatal/panic ─► Error entry, FatalTrap
//!   └─► (waits end early on cancellation)
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                               | Key types / traits                          |
//! |-------------------|-----------------------------------------------------------|---------------------------------------------|
//! | **Work**          | Define worker bodies as trait impls or closures.          | [`Work`], [`WorkFn`], [`WorkRef`]           |
//! | **Workers**       | Thread-per-worker polling with cooperative cancellation.  | [`Worker`], [`WorkerState`], [`Intervals`]  |
//! | **Groups**        | Ordered start, concurrent shutdown.                       | [`WorkerGroup`]                             |
//! | **Hosting**       | Service or interactive hosting, message routing.          | [`ControlManager`], [`HostConfig`]          |
//! | **Logging**       | Pluggable sinks, colored console output.                  | [`LogSink`], [`EventLog`], [`ConsoleLog`]   |
//! | **Errors**        | Tagged cycle outcomes and harness errors.                 | [`WorkError`], [`HostError`]                |
//!
//! ## Example
//! ```no_run
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use workvisor::{
//!     ControlManager, HostConfig, HostMode, Intervals, ProcessEntry, WorkError, WorkFn, Worker,
//!     WorkerGroup,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let quotes = Worker::new(
//!         "quotes",
//!         Intervals::new(Duration::from_secs(1), Duration::from_secs(30)),
//!         WorkFn::arc(|ctx: CancellationToken| async move {
//!             if ctx.is_cancelled() {
//!                 return Err(WorkError::Canceled);
//!             }
//!             // fetch and store one batch...
//!             Ok(())
//!         }),
//!     );
//!     let group = WorkerGroup::new("feeds", vec![quotes])?;
//!
//!     let manager = ControlManager::new(HostConfig {
//!         mode: Some(HostMode::Interactive),
//!         args: std::env::args().skip(1).collect(),
//!         ..HostConfig::default()
//!     });
//!
//!     ProcessEntry::new().run(vec![group], Some(manager), None).await?;
//!     Ok(())
//! }
//! ```
mod config;
mod error;
mod group;
mod log;
mod manager;
mod process;
mod worker;

#[cfg(test)]
mod testing;

// ---- Public re-exports ----

pub use config::{HostConfig, HostMode, Intervals};
pub use error::{FatalError, HostError, WorkError};
pub use group::{WorkerGroup, WorkerGroupBuilder};
pub use log::{
    ConsoleLog, ConsoleStyle, ConsoleTarget, EntryStyle, EventLog, LogEntry, LogSink, Severity,
    TelemetrySink,
};
pub use manager::{wait_for_shutdown_signal, ControlManager, ControlManagerBuilder};
pub use process::{ProcessEntry, FATAL_EXIT_CODE};
pub use worker::{Handling, Work, WorkFn, WorkRef, Worker, WorkerState};
