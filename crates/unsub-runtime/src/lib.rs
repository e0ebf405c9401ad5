//! Runtime half of the Unsubscriber desktop shell.
//!
//! - [`BackendSupervisor`] launches the backend, discovers its port from the
//!   `PORT:<n>` announcement, waits for readiness and stops it on request
//! - [`HealthMonitor`] polls the running backend and escalates once after too
//!   many consecutive failures
//! - [`HttpHealthProbe`] is the reqwest-backed `HealthProbe` both of them use

#![deny(unsafe_code)]

mod broadcaster;
pub mod health_monitor;
pub mod probe;
pub mod process;
pub mod supervisor;

use std::time::Duration;

pub use broadcaster::HealthEventBroadcaster;
pub use health_monitor::HealthMonitor;
pub use probe::{HttpHealthProbe, wait_until_ready};
pub use process::{BackendLogEntry, OutputStream};
pub use supervisor::{BackendSupervisor, SupervisorError, SupervisorResult};

/// Milliseconds in `duration`, saturating, for log fields and error payloads.
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
