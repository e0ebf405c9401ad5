//! Backend supervisor for the external backend service.
//!
//! The `BackendSupervisor` owns the backend process from spawn to exit and
//! offers a single idempotent handle for "is the backend ready to serve".
//!
//! Key design decisions:
//! - **Shared start**: the startup sequence runs on its own task and every
//!   concurrent `start()` caller awaits a clone of the same result
//! - **Watcher owns the child**: one task reaps the process, so exits are
//!   observed in exactly one place whether requested or not
//! - **Phase decides blame**: an exit while `Stopping` completes a stop, an
//!   exit while `Ready` is a crash
//! - **No auto-restart**: a crash resets to idle; restarting is the caller's call

mod error;
mod exit;
mod startup;

pub use error::{SupervisorError, SupervisorResult};

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use unsub_core::domain::base_url_for_port;
use unsub_core::ports::{BackendUrlSource, HealthProbe};
use unsub_core::{BackendConfig, BackendEvent, BackendStatus, LifecyclePhase};

use crate::probe::HttpHealthProbe;
use crate::process::{BackendLogBuffer, BackendLogEntry, ExitInfo};

/// Broadcast channel capacity for lifecycle events
const EVENT_CHANNEL_CAPACITY: usize = 64;

type StartFuture = Shared<BoxFuture<'static, SupervisorResult<BackendStatus>>>;

/// Handles to a backend process that is (or was until just now) alive.
#[derive(Clone)]
pub(crate) struct TrackedProcess {
    /// Start attempt that spawned the process.
    pub(crate) generation: u64,
    pub(crate) pid: u32,
    /// Asks the exit watcher to kill the child.
    pub(crate) force_kill: mpsc::Sender<()>,
    /// Set once by the exit watcher after the child is reaped.
    pub(crate) exited: watch::Receiver<Option<ExitInfo>>,
}

struct InFlightStart {
    generation: u64,
    cancel: CancellationToken,
    result: StartFuture,
}

/// Outcome of [`SupervisorState::record_port`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PortRecord {
    Recorded,
    /// A stop took over the process.
    Stopping,
    /// The process is gone or belongs to another attempt.
    Untracked,
}

#[derive(Default)]
pub(crate) struct SupervisorState {
    pub(crate) phase: LifecyclePhase,
    pub(crate) port: Option<u16>,
    pub(crate) last_error: Option<String>,
    pub(crate) process: Option<TrackedProcess>,
    in_flight: Option<InFlightStart>,
    generation: u64,
}

impl SupervisorState {
    fn snapshot(&self) -> BackendStatus {
        BackendStatus {
            is_running: self.phase == LifecyclePhase::Ready && self.process.is_some(),
            port: self.port,
            process_id: self.process.as_ref().map(|p| p.pid),
            error: self.last_error.clone(),
        }
    }

    /// Whether the tracked process belongs to start attempt `generation`.
    pub(crate) fn owns(&self, generation: u64) -> bool {
        self.process
            .as_ref()
            .is_some_and(|p| p.generation == generation)
    }

    /// Record the announced port for start attempt `generation`.
    ///
    /// Only a start still in `Starting` moves on; a concurrent `stop()` keeps
    /// its `Stopping` phase.
    pub(crate) fn record_port(&mut self, generation: u64, port: u16) -> PortRecord {
        if !self.owns(generation) {
            PortRecord::Untracked
        } else if self.phase == LifecyclePhase::Starting {
            self.port = Some(port);
            self.phase = LifecyclePhase::PortAnnounced;
            PortRecord::Recorded
        } else {
            PortRecord::Stopping
        }
    }

    /// Forget the in-flight start if it is attempt `generation`.
    fn settle(&mut self, generation: u64) {
        if self
            .in_flight
            .as_ref()
            .is_some_and(|f| f.generation == generation)
        {
            self.in_flight = None;
        }
    }
}

pub(crate) struct SupervisorInner {
    pub(crate) config: BackendConfig,
    pub(crate) probe: Arc<dyn HealthProbe>,
    pub(crate) logs: Arc<BackendLogBuffer>,
    state: Mutex<SupervisorState>,
    events: broadcast::Sender<BackendEvent>,
}

impl SupervisorInner {
    /// Lock the state. Never held across an `.await`.
    pub(crate) fn lock(&self) -> MutexGuard<'_, SupervisorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn emit(&self, event: BackendEvent) {
        // Only log if there are receivers (avoid spam with no presentation attached)
        if self.events.receiver_count() > 0 {
            debug!(event = event.name(), "Broadcasting backend event");
            let _ = self.events.send(event);
        }
    }

    /// Called by the exit watcher once the child has been reaped.
    pub(crate) fn handle_exit(&self, generation: u64, pid: u32, exit: &ExitInfo) {
        let mut state = self.lock();
        if !state.owns(generation) {
            debug!(pid = %pid, %exit, "Untracked backend process exited");
            return;
        }

        state.process = None;
        let port = state.port.take();

        match state.phase {
            LifecyclePhase::Stopping => {
                debug!(pid = %pid, %exit, "Backend exited after stop request");
            }
            LifecyclePhase::Ready => {
                error!(pid = %pid, port = ?port, %exit, "Backend process exited unexpectedly");
                let message = format!("backend process exited unexpectedly ({exit})");
                state.phase = LifecyclePhase::Idle;
                state.last_error = Some(message.clone());
                self.emit(BackendEvent::Crashed {
                    port,
                    exit_code: exit.code,
                    error: message,
                });
            }
            phase => {
                // The startup sequence observes this exit and reports it
                debug!(pid = %pid, %phase, %exit, "Backend exited during startup");
            }
        }
    }
}

/// Supervisor for the backend process.
///
/// Cheap to clone; clones share the same process and state.
///
/// # Example
///
/// ```ignore
/// let supervisor = BackendSupervisor::new(BackendConfig::from_env()?)?;
/// let status = supervisor.start().await?;
/// println!("backend at {:?}", supervisor.base_url());
/// supervisor.stop().await;
/// ```
#[derive(Clone)]
pub struct BackendSupervisor {
    inner: Arc<SupervisorInner>,
}

impl BackendSupervisor {
    /// Create a supervisor that probes readiness over HTTP.
    pub fn new(config: BackendConfig) -> reqwest::Result<Self> {
        let probe = HttpHealthProbe::new(config.health_path.clone(), config.probe_timeout)?;
        Ok(Self::with_probe(config, Arc::new(probe)))
    }

    /// Create a supervisor with a custom readiness probe.
    pub fn with_probe(config: BackendConfig, probe: Arc<dyn HealthProbe>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let logs = Arc::new(BackendLogBuffer::new(config.log_buffer_lines));
        Self {
            inner: Arc::new(SupervisorInner {
                config,
                probe,
                logs,
                state: Mutex::new(SupervisorState::default()),
                events,
            }),
        }
    }

    /// Start the backend and wait until it is ready.
    ///
    /// - joins the in-flight start if there is one (no second spawn)
    /// - returns the current status if the backend is already running
    /// - otherwise spawns, waits for `PORT:<n>`, and probes until healthy
    ///
    /// A failure is also recorded in `status().error`.
    pub async fn start(&self) -> SupervisorResult<BackendStatus> {
        let pending = {
            let mut state = self.inner.lock();

            if let Some(in_flight) = &state.in_flight {
                debug!(generation = %in_flight.generation, "Start already in progress, joining it");
                in_flight.result.clone()
            } else {
                match state.phase {
                    LifecyclePhase::Ready => return Ok(state.snapshot()),
                    LifecyclePhase::Stopping => return Err(SupervisorError::ShuttingDown),
                    _ => {}
                }

                state.generation += 1;
                let generation = state.generation;
                let cancel = CancellationToken::new();
                state.phase = LifecyclePhase::Starting;
                state.last_error = None;

                info!(
                    generation = %generation,
                    executable = %self.inner.config.executable.display(),
                    "Starting backend"
                );

                let task = tokio::spawn(startup::run(
                    Arc::clone(&self.inner),
                    generation,
                    cancel.clone(),
                ));
                let result: StartFuture = async move {
                    task.await
                        .unwrap_or_else(|e| Err(SupervisorError::internal(e)))
                }
                .boxed()
                .shared();

                state.in_flight = Some(InFlightStart {
                    generation,
                    cancel,
                    result: result.clone(),
                });
                result
            }
        };

        pending.await
    }

    /// Stop the backend.
    ///
    /// Sends a graceful termination signal, waits up to the configured grace
    /// period, then kills. Resolves once the exit is confirmed. Safe in any
    /// state: an in-flight start is aborted, and with nothing tracked this
    /// returns immediately.
    pub async fn stop(&self) {
        let (process, pending) = {
            let mut state = self.inner.lock();
            let pending = state.in_flight.as_ref().map(|in_flight| {
                in_flight.cancel.cancel();
                in_flight.result.clone()
            });

            let process = state.process.clone();
            if process.is_some() && state.phase != LifecyclePhase::Stopping {
                state.phase = LifecyclePhase::Stopping;
                self.inner.emit(BackendEvent::Stopping { port: state.port });
            }
            (process, pending)
        };

        let Some(process) = process else {
            if let Some(pending) = pending {
                debug!("Stop requested before the backend was tracked, aborting start");
                let _ = pending.await;
            } else {
                debug!("Stop requested with no backend process tracked");
            }
            return;
        };

        info!(pid = %process.pid, "Stopping backend process");
        let exit = exit::terminate(&process, self.inner.config.shutdown_grace).await;

        if let Some(pending) = pending {
            let _ = pending.await;
        }

        let mut state = self.inner.lock();
        if state.owns(process.generation) {
            state.process = None;
        }
        if state.phase == LifecyclePhase::Stopping && state.process.is_none() {
            state.phase = LifecyclePhase::Idle;
            state.port = None;
            info!(pid = %process.pid, %exit, "Backend stopped");
            self.inner.emit(BackendEvent::Stopped);
        }
    }

    /// Snapshot of the current status. No side effects.
    pub fn status(&self) -> BackendStatus {
        self.inner.lock().snapshot()
    }

    /// `http://127.0.0.1:<port>` while a port is known.
    pub fn base_url(&self) -> Option<String> {
        self.inner.lock().port.map(base_url_for_port)
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> LifecyclePhase {
        self.inner.lock().phase
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<BackendEvent> {
        self.inner.events.subscribe()
    }

    /// Up to `limit` most recent backend output lines.
    pub fn logs(&self, limit: usize) -> Vec<BackendLogEntry> {
        self.inner.logs.recent(limit)
    }

    pub fn config(&self) -> &BackendConfig {
        &self.inner.config
    }
}

impl BackendUrlSource for BackendSupervisor {
    fn base_url(&self) -> Option<String> {
        Self::base_url(self)
    }
}

impl fmt::Debug for BackendSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("BackendSupervisor")
            .field("phase", &state.phase)
            .field("port", &state.port)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use unsub_core::HealthResponse;
    use unsub_core::ports::HealthCheckError;

    struct AlwaysHealthy;

    #[async_trait]
    impl HealthProbe for AlwaysHealthy {
        async fn probe(&self, _base_url: &str) -> Result<HealthResponse, HealthCheckError> {
            Ok(HealthResponse::healthy())
        }
    }

    fn supervisor(config: BackendConfig) -> BackendSupervisor {
        BackendSupervisor::with_probe(config, Arc::new(AlwaysHealthy))
    }

    fn tracked_state(generation: u64, phase: LifecyclePhase) -> SupervisorState {
        let (force_kill, _) = mpsc::channel(1);
        let (_, exited) = watch::channel(None);
        SupervisorState {
            phase,
            process: Some(TrackedProcess {
                generation,
                pid: 4242,
                force_kill,
                exited,
            }),
            generation,
            ..SupervisorState::default()
        }
    }

    #[test]
    fn test_port_recorded_while_starting() {
        let mut state = tracked_state(1, LifecyclePhase::Starting);
        assert_eq!(state.record_port(1, 50_001), PortRecord::Recorded);
        assert_eq!(state.phase, LifecyclePhase::PortAnnounced);
        assert_eq!(state.port, Some(50_001));
    }

    #[test]
    fn test_port_does_not_override_stopping() {
        let mut state = tracked_state(1, LifecyclePhase::Stopping);
        assert_eq!(state.record_port(1, 50_001), PortRecord::Stopping);
        assert_eq!(state.phase, LifecyclePhase::Stopping);
        assert_eq!(state.port, None);
    }

    #[test]
    fn test_port_for_other_attempt_is_untracked() {
        let mut state = tracked_state(2, LifecyclePhase::Starting);
        assert_eq!(state.record_port(1, 50_001), PortRecord::Untracked);
        assert_eq!(state.phase, LifecyclePhase::Starting);

        state.process = None;
        assert_eq!(state.record_port(2, 50_001), PortRecord::Untracked);
    }

    #[test]
    fn test_initial_status() {
        let supervisor = supervisor(BackendConfig::new("backend"));
        assert_eq!(supervisor.status(), BackendStatus::default());
        assert_eq!(supervisor.phase(), LifecyclePhase::Idle);
        assert_eq!(supervisor.base_url(), None);
        assert_eq!(BackendUrlSource::base_url(&supervisor), None);
    }

    #[tokio::test]
    async fn test_stop_without_process_is_noop() {
        let supervisor = supervisor(BackendConfig::new("backend"));
        supervisor.stop().await;
        supervisor.stop().await;
        assert_eq!(supervisor.phase(), LifecyclePhase::Idle);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let supervisor = supervisor(BackendConfig::new("/definitely/not/a/backend"));
        let mut events = supervisor.subscribe();

        let err = supervisor.start().await.unwrap_err();
        assert!(matches!(err, SupervisorError::SpawnFailure { .. }));

        let status = supervisor.status();
        assert!(!status.is_running);
        assert_eq!(status.port, None);
        assert!(status.error.unwrap().contains("failed to spawn backend"));
        assert!(matches!(events.recv().await, Ok(BackendEvent::Failed { .. })));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_exit_before_announcement() {
        let config = BackendConfig::new("/bin/sh").with_args(["-c", "echo booting; exit 7"]);
        let supervisor = supervisor(config);

        let err = supervisor.start().await.unwrap_err();
        assert_eq!(
            err,
            SupervisorError::ExitedDuringStartup {
                code: Some(7),
                exit: "exit status: 7".to_string(),
            }
        );
        assert_eq!(supervisor.phase(), LifecyclePhase::Idle);
        assert!(supervisor.status().process_id.is_none());
    }
}
