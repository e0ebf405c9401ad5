//! Exit watching and termination.

use std::sync::Arc;
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::{SupervisorInner, TrackedProcess};
use crate::millis;
use crate::process::{ExitInfo, request_graceful_exit};

/// Own `child` until it exits, killing it on request.
///
/// The exit is reported to the supervisor state first and then published on
/// `exit_tx`, so anyone woken by the publication sees a settled state.
pub(super) async fn watch(
    inner: Arc<SupervisorInner>,
    generation: u64,
    pid: u32,
    mut child: Child,
    mut force_kill: mpsc::Receiver<()>,
    exit_tx: watch::Sender<Option<ExitInfo>>,
) {
    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            Some(()) = force_kill.recv() => {
                warn!(pid = %pid, "Killing backend process");
                if let Err(e) = child.start_kill() {
                    warn!(pid = %pid, error = %e, "Failed to kill backend process");
                }
            }
        }
    };

    let exit = ExitInfo::from_wait(&status);
    inner.handle_exit(generation, pid, &exit);
    exit_tx.send_replace(Some(exit));
}

/// Wait until the watcher publishes the exit.
pub(super) async fn wait_for_exit(exited: &mut watch::Receiver<Option<ExitInfo>>) -> ExitInfo {
    match exited.wait_for(Option::is_some).await {
        Ok(seen) => (*seen).clone().unwrap_or_default(),
        // Watcher gone without publishing: the child was dropped and killed
        Err(_) => ExitInfo::default(),
    }
}

/// Terminate `process`: graceful signal, `grace` to comply, then kill.
///
/// Every wait is bounded, so this always resolves.
pub(super) async fn terminate(process: &TrackedProcess, grace: Duration) -> ExitInfo {
    let pid = process.pid;
    let mut exited = process.exited.clone();

    let already = (*exited.borrow()).clone();
    if let Some(exit) = already {
        debug!(pid = %pid, %exit, "Backend already exited");
        return exit;
    }

    match request_graceful_exit(pid) {
        Ok(true) => match timeout(grace, wait_for_exit(&mut exited)).await {
            Ok(exit) => {
                info!(pid = %pid, %exit, "Backend exited after termination signal");
                return exit;
            }
            Err(_) => {
                warn!(
                    pid = %pid,
                    grace_ms = %millis(grace),
                    "Backend ignored termination signal, killing"
                );
            }
        },
        Ok(false) => debug!(pid = %pid, "No termination signal delivered, killing"),
        Err(e) => warn!(pid = %pid, error = %e, "Failed to signal backend, killing"),
    }

    // A full channel means a kill is already queued
    let _ = process.force_kill.try_send(());

    match timeout(grace, wait_for_exit(&mut exited)).await {
        Ok(exit) => exit,
        Err(_) => {
            error!(pid = %pid, "Backend did not exit after kill");
            ExitInfo::default()
        }
    }
}

/// Kill and reap a child that was never handed to a watcher.
pub(super) async fn reap_untracked(mut child: Child, pid: u32) {
    if let Err(e) = child.start_kill() {
        debug!(pid = %pid, error = %e, "Failed to kill untracked backend");
    }
    let exit = ExitInfo::from_wait(&child.wait().await);
    debug!(pid = %pid, %exit, "Untracked backend reaped");
}
