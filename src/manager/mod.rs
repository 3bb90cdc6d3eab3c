//! # Control manager: hosting mode, startup/shutdown, log routing.
//!
//! ```text
//!                 ControlManager::run(groups)
//!                            │
//!          ┌─────────────────┴──────────────────┐
//!          ▼                                    ▼
//!   HostMode::Service                    HostMode::Interactive
//!   start all groups                     "Starting groups..."
//!   wait: signal | stop token            manual_start each, elapsed time
//!   stop all groups                      "Press Enter or Ctrl-C to stop..."
//!                                        wait: Enter | signal | stop token
//!                                        manual_stop each, elapsed time
//! ```
//!
//! Every group bound to a manager sends its messages through
//! [`ControlManager::log_message`]; see [`crate::log`] for the routing table.

mod core;
mod host;
mod shutdown;

pub use self::core::{ControlManager, ControlManagerBuilder};
pub(crate) use self::core::ManagerShared;
pub use shutdown::wait_for_shutdown_signal;
