//! The startup sequence: spawn, wait for `PORT:<n>`, probe until healthy.

use std::sync::Arc;

use tokio::process::{ChildStderr, ChildStdout};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use unsub_core::domain::base_url_for_port;
use unsub_core::{BackendEvent, BackendStatus, LifecyclePhase};

use super::error::{SupervisorError, SupervisorResult};
use super::exit;
use super::{PortRecord, SupervisorInner, TrackedProcess};
use crate::millis;
use crate::probe::wait_until_ready;
use crate::process::{
    ExitInfo, LaunchedProcess, OutputStream, launch, parse_port_announcement, spawn_stream_reader,
};

/// Run start attempt `generation` to completion and settle the shared state.
pub(super) async fn run(
    inner: Arc<SupervisorInner>,
    generation: u64,
    cancel: CancellationToken,
) -> SupervisorResult<BackendStatus> {
    let outcome = sequence(&inner, generation, &cancel).await;
    finish(&inner, generation, outcome).await
}

async fn sequence(
    inner: &Arc<SupervisorInner>,
    generation: u64,
    cancel: &CancellationToken,
) -> SupervisorResult<u16> {
    let config = &inner.config;
    let deadline = Instant::now() + config.startup_timeout;
    let timeout_ms = millis(config.startup_timeout);

    let LaunchedProcess {
        child,
        pid,
        stdout,
        stderr,
    } = launch(config).map_err(|e| {
        error!(
            executable = %config.executable.display(),
            error = %e,
            "Failed to spawn backend"
        );
        SupervisorError::SpawnFailure {
            executable: config.executable.display().to_string(),
            reason: e.to_string(),
        }
    })?;

    let (kill_tx, kill_rx) = mpsc::channel(1);
    let (exit_tx, mut exited) = watch::channel(None);

    let tracked = {
        let mut state = inner.lock();
        if cancel.is_cancelled() {
            false
        } else {
            state.process = Some(TrackedProcess {
                generation,
                pid,
                force_kill: kill_tx,
                exited: exited.clone(),
            });
            true
        }
    };
    if !tracked {
        debug!(pid = %pid, "Start aborted before the backend was tracked");
        exit::reap_untracked(child, pid).await;
        return Err(SupervisorError::StartupAborted);
    }
    inner.emit(BackendEvent::Starting { process_id: pid });
    info!(pid = %pid, "Backend process started, waiting for port announcement");

    let port_rx = spawn_output_readers(inner, pid, stdout, stderr);
    tokio::spawn(exit::watch(
        Arc::clone(inner),
        generation,
        pid,
        child,
        kill_rx,
        exit_tx,
    ));

    let port = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(SupervisorError::StartupAborted),
        info = exit::wait_for_exit(&mut exited) => return Err(exited_during_startup(pid, &info)),
        announced = timeout_at(deadline, announced_port(port_rx)) => match announced {
            Ok(port) => port,
            Err(_) => {
                warn!(pid = %pid, timeout_ms = %timeout_ms, "Backend did not announce a port in time");
                return Err(SupervisorError::StartupTimeout { timeout_ms });
            }
        },
    };

    let recorded = inner.lock().record_port(generation, port);
    match recorded {
        PortRecord::Recorded => {}
        PortRecord::Stopping => {
            debug!(pid = %pid, port = %port, "Stop requested as the port was announced");
            return Err(SupervisorError::StartupAborted);
        }
        PortRecord::Untracked => {
            let info = exit::wait_for_exit(&mut exited).await;
            return Err(exited_during_startup(pid, &info));
        }
    }

    let base_url = base_url_for_port(port);
    debug!(pid = %pid, %base_url, "Probing backend readiness");
    {
        let mut state = inner.lock();
        if state.phase == LifecyclePhase::PortAnnounced {
            state.phase = LifecyclePhase::Probing;
        }
    }

    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(SupervisorError::StartupAborted),
        info = exit::wait_for_exit(&mut exited) => Err(exited_during_startup(pid, &info)),
        ready = timeout_at(
            deadline,
            wait_until_ready(Arc::clone(&inner.probe), &base_url, config.probe_interval),
        ) => match ready {
            Ok(_) => Ok(port),
            Err(_) => {
                warn!(pid = %pid, port = %port, timeout_ms = %timeout_ms, "Backend never reported healthy");
                Err(SupervisorError::HealthCheckTimeout { port, timeout_ms })
            }
        },
    }
}

/// Publish the outcome of attempt `generation`.
///
/// A failed attempt tears down its own process before resolving, unless a
/// stop already owns the teardown.
async fn finish(
    inner: &SupervisorInner,
    generation: u64,
    outcome: SupervisorResult<u16>,
) -> SupervisorResult<BackendStatus> {
    if let Err(err) = &outcome {
        let leftover = {
            let state = inner.lock();
            if state.phase != LifecyclePhase::Stopping && state.owns(generation) {
                state.process.clone()
            } else {
                None
            }
        };
        if let Some(process) = leftover {
            debug!(pid = %process.pid, error = %err, "Terminating backend after failed start");
            exit::terminate(&process, inner.config.shutdown_grace).await;
        }
    }

    let mut state = inner.lock();
    state.settle(generation);

    match outcome {
        Ok(port) if state.phase != LifecyclePhase::Stopping && state.owns(generation) => {
            state.phase = LifecyclePhase::Ready;
            let status = state.snapshot();
            let process_id = status.process_id.unwrap_or_default();
            info!(pid = %process_id, port = %port, "Backend is running");
            inner.emit(BackendEvent::Running { port, process_id });
            Ok(status)
        }
        outcome => {
            let err = match outcome {
                Err(err) => err,
                Ok(_) if state.phase == LifecyclePhase::Stopping => SupervisorError::StartupAborted,
                Ok(_) => SupervisorError::ExitedDuringStartup {
                    code: None,
                    exit: "exited before startup completed".to_string(),
                },
            };

            if state.phase != LifecyclePhase::Stopping {
                state.phase = LifecyclePhase::Idle;
                state.port = None;
                if state.owns(generation) {
                    state.process = None;
                }
            }

            if err == SupervisorError::StartupAborted {
                debug!("Backend start aborted");
            } else {
                error!(error = %err, "Backend failed to start");
                state.last_error = Some(err.to_string());
                inner.emit(BackendEvent::Failed {
                    error: err.to_string(),
                });
            }
            Err(err)
        }
    }
}

/// Start the output readers; the returned receiver yields the first
/// announced port.
fn spawn_output_readers(
    inner: &SupervisorInner,
    pid: u32,
    stdout: ChildStdout,
    stderr: ChildStderr,
) -> oneshot::Receiver<u16> {
    let (port_tx, port_rx) = oneshot::channel();
    let mut port_tx = Some(port_tx);

    let logs = Arc::clone(&inner.logs);
    spawn_stream_reader(stdout, pid, OutputStream::Stdout, move |line| {
        if let Some(port) = parse_port_announcement(&line) {
            match port_tx.take() {
                Some(tx) => {
                    info!(pid = %pid, port = %port, "Backend announced port");
                    let _ = tx.send(port);
                }
                None => warn!(pid = %pid, port = %port, "Ignoring repeated port announcement"),
            }
        } else {
            debug!(pid = %pid, "backend: {line}");
        }
        logs.push(OutputStream::Stdout, line);
    });

    let logs = Arc::clone(&inner.logs);
    spawn_stream_reader(stderr, pid, OutputStream::Stderr, move |line| {
        error!(pid = %pid, "backend stderr: {line}");
        logs.push(OutputStream::Stderr, line);
    });

    port_rx
}

/// Resolves with the announced port; stays pending if stdout closed without one.
async fn announced_port(rx: oneshot::Receiver<u16>) -> u16 {
    match rx.await {
        Ok(port) => port,
        Err(_) => std::future::pending().await,
    }
}

fn exited_during_startup(pid: u32, exit: &ExitInfo) -> SupervisorError {
    warn!(pid = %pid, %exit, "Backend exited before it became ready");
    SupervisorError::ExitedDuringStartup {
        code: exit.code,
        exit: exit.to_string(),
    }
}
