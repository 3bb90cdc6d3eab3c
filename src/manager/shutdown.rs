//! # Shutdown triggers.
//!
//! The host waits for the first of:
//! - an OS termination signal ([`wait_for_shutdown_signal`]);
//! - the manager's stop token;
//! - (interactive only) the operator pressing Enter.
//!
//! Whichever fires first, the host stops every group the same way.
//!
//! ## Signals treated as a stop
//! - unix: `SIGINT`, `SIGTERM` (how a service manager stops the host) and `SIGQUIT`
//! - elsewhere: Ctrl-C only

use std::future;
use std::io::{self, BufRead};
use std::thread;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::HostError;

/// What ended the wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StopReason {
    /// The manager's stop token was cancelled.
    Requested,
    /// An OS termination signal arrived.
    Signal,
    /// The operator pressed Enter.
    Operator,
}

/// Resolves when the OS asks the host to stop.
///
/// This is the signal leg of the host's stop wait; the manager's stop token
/// and the operator line are the other two. It is public so an embedding
/// process that runs groups without [`ControlManager`](crate::ControlManager)
/// can stop them on the same signals.
///
/// ### Errors
/// An `io::Error` when a listener cannot be registered. The host reports it
/// as [`HostError::Signal`] and stops its groups.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Resolves when the OS asks the host to stop (Ctrl-C on this platform).
///
/// See the unix variant for how the host combines it with its other stop triggers.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Waits for the first shutdown trigger.
///
/// With `operator` set, a line on stdin also counts. A closed stdin never
/// does: the host then keeps running until a signal or the stop token.
pub(crate) async fn wait_for_stop(
    token: &CancellationToken,
    operator: bool,
) -> Result<StopReason, HostError> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Ok(StopReason::Requested),
        res = wait_for_shutdown_signal() => res.map(|()| StopReason::Signal).map_err(HostError::Signal),
        _ = operator_line(), if operator => Ok(StopReason::Operator),
    }
}

/// Completes when the operator enters a line.
///
/// Stdin is read on a detached thread: a blocking read cannot be cancelled,
/// and the runtime must not wait for it on shutdown.
async fn operator_line() {
    let (tx, rx) = oneshot::channel();
    let reader = thread::Builder::new()
        .name("workvisor-stdin".into())
        .spawn(move || {
            let mut line = String::new();
            if let Ok(n) = io::stdin().lock().read_line(&mut line) {
                if n > 0 {
                    let _ = tx.send(());
                }
            }
        });

    if let Err(e) = reader {
        tracing::warn!(error = %e, "cannot read operator input; waiting for a signal instead");
        return future::pending().await;
    }
    if rx.await.is_err() {
        future::pending::<()>().await;
    }
}
