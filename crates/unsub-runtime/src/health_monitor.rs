//! Continuous health monitoring of the running backend.
//!
//! The monitor polls the backend's health endpoint on a fixed interval,
//! counts consecutive failures and escalates exactly once when the count
//! reaches the configured threshold. Escalation stops the schedule: a
//! backend declared dead is not polled again until `start()` is called anew.
//!
//! Checks never overlap. They run one after another inside the schedule
//! task, and a tick that came due while a check was still running is skipped
//! rather than queued.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::time::{Instant, MissedTickBehavior, interval, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use unsub_core::ports::{
    BackendUrlSource, CriticalFailureNotifier, HealthCheckError, HealthObserver, HealthProbe,
    probe_backend,
};
use unsub_core::{HealthMonitorConfig, HealthResponse, HealthStatus};

use crate::millis;

#[derive(Default)]
struct MonitorState {
    status: HealthStatus,
    /// Present while the schedule is running.
    schedule: Option<CancellationToken>,
    /// Bumped by every `start()` and `stop()`; outcomes from an older
    /// schedule are discarded.
    generation: u64,
}

struct MonitorInner {
    config: HealthMonitorConfig,
    urls: Arc<dyn BackendUrlSource>,
    probe: Arc<dyn HealthProbe>,
    observer: Arc<dyn HealthObserver>,
    notifier: Arc<dyn CriticalFailureNotifier>,
    state: Mutex<MonitorState>,
    /// Held while an outcome is applied and observers are notified.
    delivery: Mutex<()>,
}

/// Periodic health checker for the backend.
///
/// Cheap to clone; clones share one schedule and one status.
#[derive(Clone)]
pub struct HealthMonitor {
    inner: Arc<MonitorInner>,
}

impl HealthMonitor {
    pub fn new(
        config: HealthMonitorConfig,
        urls: Arc<dyn BackendUrlSource>,
        probe: Arc<dyn HealthProbe>,
        observer: Arc<dyn HealthObserver>,
        notifier: Arc<dyn CriticalFailureNotifier>,
    ) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                config,
                urls,
                probe,
                observer,
                notifier,
                state: Mutex::new(MonitorState::default()),
                delivery: Mutex::new(()),
            }),
        }
    }

    /// Start polling. The first check runs immediately.
    ///
    /// No-op while already running. Must be called within a tokio runtime.
    pub fn start(&self) {
        let mut state = self.inner.lock();
        if state.schedule.is_some() {
            debug!("Health monitor already running");
            return;
        }

        state.generation += 1;
        state.status.consecutive_failures = 0;
        state.status.is_healthy = true;
        state.status.error = None;

        let cancel = CancellationToken::new();
        state.schedule = Some(cancel.clone());

        info!(
            interval_ms = %millis(self.inner.config.check_interval),
            threshold = %self.inner.config.failure_threshold,
            "Health monitor started"
        );
        tokio::spawn(run_schedule(
            Arc::clone(&self.inner),
            state.generation,
            cancel,
        ));
    }

    /// Stop polling. Idempotent; the last known status is kept.
    ///
    /// Once this returns no further outcome is applied or reported, including
    /// the acknowledgment of a pending critical notification. Must not be
    /// called from inside a `HealthObserver` callback.
    pub fn stop(&self) {
        {
            let mut state = self.inner.lock();
            state.generation += 1;
            if let Some(cancel) = state.schedule.take() {
                cancel.cancel();
                info!("Health monitor stopped");
            }
        }
        // Wait out a delivery that began before the cancellation
        drop(self.inner.deliver());
    }

    /// Snapshot of the current health status.
    pub fn status(&self) -> HealthStatus {
        self.inner.lock().status.clone()
    }

    /// Whether the schedule is running.
    pub fn is_running(&self) -> bool {
        self.inner.lock().schedule.is_some()
    }

    pub fn config(&self) -> &HealthMonitorConfig {
        &self.inner.config
    }
}

impl MonitorInner {
    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self) -> MutexGuard<'_, ()> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// One check cycle, bounded by the check timeout.
    async fn check_once(&self) -> Result<HealthResponse, HealthCheckError> {
        let budget = self.config.check_timeout;
        timeout(
            budget,
            probe_backend(self.urls.as_ref(), self.probe.as_ref()),
        )
        .await
        .unwrap_or_else(|_| {
            Err(HealthCheckError::Timeout {
                timeout_ms: millis(budget),
            })
        })
    }

    /// Apply one check outcome and notify the observer.
    ///
    /// Returns the status to escalate with when this outcome reached the
    /// failure threshold.
    fn apply(
        &self,
        generation: u64,
        outcome: Result<HealthResponse, HealthCheckError>,
    ) -> Option<HealthStatus> {
        let _delivery = self.deliver();

        let (status, critical) = {
            let mut state = self.lock();
            if state.generation != generation {
                debug!("Discarding health check outcome from a stopped schedule");
                return None;
            }

            let threshold = self.config.failure_threshold;
            let status = &mut state.status;
            status.last_checked_at = Some(Utc::now());

            let critical = match outcome {
                Ok(_) => {
                    if !status.is_healthy || status.consecutive_failures > 0 {
                        info!(
                            previous_failures = %status.consecutive_failures,
                            "Backend health recovered"
                        );
                    }
                    status.consecutive_failures = 0;
                    status.is_healthy = true;
                    status.error = None;
                    false
                }
                Err(e) => {
                    status.consecutive_failures = status.consecutive_failures.saturating_add(1);
                    status.error = Some(e.to_string());
                    warn!(
                        failures = %status.consecutive_failures,
                        threshold = %threshold,
                        error = %e,
                        "Backend health check failed"
                    );
                    status.consecutive_failures >= threshold
                }
            };

            if critical {
                status.is_healthy = false;
                if let Some(cancel) = state.schedule.take() {
                    cancel.cancel();
                }
            }
            (state.status.clone(), critical)
        };

        self.observer.on_status(&status);
        critical.then_some(status)
    }

    /// Critical path: tell the user, wait for acknowledgment, report once more.
    async fn escalate(&self, generation: u64, status: HealthStatus) {
        error!(
            failures = %status.consecutive_failures,
            error = status.error.as_deref().unwrap_or("unknown"),
            "Backend declared unhealthy, health checks stopped"
        );

        self.notifier.notify_critical(&status).await;

        let _delivery = self.deliver();
        if self.lock().generation != generation {
            debug!("Critical failure acknowledged after the monitor was stopped");
            return;
        }
        info!("Critical backend failure acknowledged");
        self.observer.on_critical_acknowledged(&status);
    }
}

async fn run_schedule(inner: Arc<MonitorInner>, generation: u64, cancel: CancellationToken) {
    let mut ticker = interval(inner.config.check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_finished: Option<Instant> = None;

    loop {
        let due = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            due = ticker.tick() => due,
        };

        // A tick that came due during the previous check is stale
        if last_finished.is_some_and(|finished| due < finished) {
            debug!("Skipping health check tick missed by a slow check");
            continue;
        }

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            outcome = inner.check_once() => outcome,
        };
        last_finished = Some(Instant::now());

        if let Some(status) = inner.apply(generation, outcome) {
            inner.escalate(generation, status).await;
            break;
        }
    }

    debug!("Health monitor schedule exited");
}
