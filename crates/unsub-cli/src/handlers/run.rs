//! Run command handler.
//!
//! Starts the backend, then watches it with the health monitor until the
//! user presses Ctrl-C or the backend is declared dead. Lifecycle and health
//! events are printed to stdout as JSON lines.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use unsub_core::{BackendEvent, HealthEvent};
use unsub_runtime::{BackendSupervisor, HealthEventBroadcaster, HealthMonitor, HttpHealthProbe};

use crate::notifier::TerminalNotifier;
use crate::parser::BackendArgs;

/// Why the watch loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Interrupted,
    CriticalFailure,
}

/// Execute the run command.
///
/// Exits non-zero if the backend fails to start or after a critical
/// health failure; Ctrl-C is a clean exit.
pub async fn execute(args: &BackendArgs) -> Result<ExitCode> {
    let backend_config = args
        .backend_config()
        .context("invalid backend configuration")?;
    let monitor_config = args
        .monitor_config()
        .context("invalid health monitor configuration")?;

    let probe = HttpHealthProbe::new(
        backend_config.health_path.clone(),
        monitor_config.check_timeout,
    )
    .context("failed to build health probe")?;
    let supervisor =
        BackendSupervisor::new(backend_config).context("failed to build readiness probe")?;
    let mut backend_events = supervisor.subscribe();

    let status = match supervisor.start().await {
        Ok(status) => status,
        Err(e) => {
            error!(error = %e, "Backend did not start");
            print_event(&supervisor.status());
            return Ok(ExitCode::FAILURE);
        }
    };
    print_event(&status);

    let broadcaster = Arc::new(HealthEventBroadcaster::new());
    let mut health_events = broadcaster.subscribe();
    let monitor = HealthMonitor::new(
        monitor_config,
        Arc::new(supervisor.clone()),
        Arc::new(probe),
        broadcaster,
        Arc::new(TerminalNotifier),
    );
    monitor.start();
    info!("Watching backend, press Ctrl-C to stop");

    let outcome = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                break Outcome::Interrupted;
            }
            event = health_events.recv() => match event {
                Ok(event) => {
                    print_event(&event);
                    if matches!(event, HealthEvent::CriticalAcknowledged(_)) {
                        break Outcome::CriticalFailure;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped = %skipped, "Dropped health events"),
                Err(RecvError::Closed) => break Outcome::CriticalFailure,
            },
            event = backend_events.recv() => match event {
                Ok(event) => {
                    if let BackendEvent::Crashed { error, .. } = &event {
                        // The health monitor escalates once the URL disappears
                        warn!(%error, "Backend crashed");
                    }
                    print_event(&event);
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped = %skipped, "Dropped backend events"),
                Err(RecvError::Closed) => break Outcome::Interrupted,
            },
        }
    };

    monitor.stop();
    supervisor.stop().await;

    match outcome {
        Outcome::Interrupted => {
            info!("Shut down on request");
            Ok(ExitCode::SUCCESS)
        }
        Outcome::CriticalFailure => {
            error!("Exiting after critical backend failure");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_event<T: Serialize>(event: &T) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => warn!(error = %e, "Failed to serialize event"),
    }
}
