//! Hosting-mode loops behind [`ControlManager::run`].
//!
//! Both loops start groups in order and stop every group they started,
//! including on a start failure. The service loop talks only to the log;
//! the interactive loop also prints progress for the operator.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;

use super::core::ControlManager;
use super::shutdown::{self, StopReason};
use crate::error::HostError;
use crate::group::WorkerGroup;
use crate::log::Severity;

/// Service host: start, wait for a signal or the stop token, stop.
pub(super) async fn run_service(manager: &ControlManager) -> Result<(), HostError> {
    let groups = manager.groups();
    start_groups(groups, |g| g.start(manager.args()), false).await?;

    let waited = shutdown::wait_for_stop(&manager.stop_token(), false).await;
    if let Ok(reason) = &waited {
        tracing::debug!(?reason, "service stopping");
    }
    stop_groups(groups, false).await;
    waited.map(|_| ())
}

/// Interactive host: like the service host, with operator prompts and timings.
pub(super) async fn run_interactive(manager: &ControlManager) -> Result<(), HostError> {
    let groups = manager.groups();

    let started = Instant::now();
    println!("Starting groups...");
    start_groups(groups, |g| g.manual_start(manager.args()), true).await?;
    println!("Groups started in {:.2}s.", started.elapsed().as_secs_f64());
    println!("Press Enter or Ctrl-C to stop...");

    let waited = shutdown::wait_for_stop(&manager.stop_token(), true).await;
    if let Ok(StopReason::Signal) = waited {
        // keep the prompt line clean after ^C
        println!();
    }

    let stopping = Instant::now();
    println!("Stopping groups...");
    stop_groups(groups, true).await;
    println!("Groups stopped in {:.2}s.", stopping.elapsed().as_secs_f64());
    waited.map(|_| ())
}

/// Starts `groups` in order. On the first failure, logs it, stops every group
/// touched so far (the failing one included) and returns the error.
async fn start_groups<F>(groups: &[Arc<WorkerGroup>], start: F, manual: bool) -> Result<(), HostError>
where
    F: Fn(&WorkerGroup) -> Result<(), HostError>,
{
    for (i, g) in groups.iter().enumerate() {
        if let Err(e) = start(g.as_ref()) {
            g.log_message(format!("Group failed to start: {e}"), Severity::Error);
            stop_groups(&groups[..=i], manual).await;
            return Err(e);
        }
    }
    Ok(())
}

/// Requests a stop of every group, then waits for all of them together.
async fn stop_groups(groups: &[Arc<WorkerGroup>], manual: bool) {
    if manual {
        let stops = groups.iter().map(|g| g.manual_stop());
        for (g, res) in groups.iter().zip(join_all(stops).await) {
            report(g, res);
        }
        return;
    }

    for g in groups {
        report(g, g.request_stop());
    }
    join_all(groups.iter().map(|g| g.wait_for_exit())).await;
}

fn report(group: &WorkerGroup, res: Result<(), HostError>) {
    if let Err(e) = res {
        group.log_message(format!("Group failed to stop: {e}"), Severity::Error);
    }
}
