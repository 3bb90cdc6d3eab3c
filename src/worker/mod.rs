//! Workers: the work contract and the thread-per-worker polling harness.
//!
//! - [`Work`] - trait implemented by worker bodies (poll + lifecycle hooks)
//! - [`WorkFn`] - closure-backed [`Work`]
//! - [`WorkRef`] - shared handle to a body (`Arc<dyn Work>`)
//! - [`Handling`] - verdict of [`Work::on_failure`]
//! - [`Worker`] - owns one OS thread that drives the polling loop
//! - [`WorkerState`] - `Created → Running → StopRequested → Stopped`

mod core;
pub(crate) mod runner;
mod work;

pub use self::core::{Worker, WorkerState};
pub use work::{Handling, Work, WorkFn, WorkRef};
