//! Status snapshots handed to callers.
//!
//! Both records are owned by exactly one component and only ever leave it as
//! clones, so consumers can hold on to them freely.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Interface the backend binds to and the shell talks to.
pub const LOOPBACK_HOST: &str = "127.0.0.1";

/// Base URL of a backend listening on `port`.
pub fn base_url_for_port(port: u16) -> String {
    format!("http://{LOOPBACK_HOST}:{port}")
}

/// Snapshot of the supervised backend process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendStatus {
    /// Backend is up and answered its readiness probe.
    pub is_running: bool,
    /// Port announced by the backend, while the announcing process is alive.
    pub port: Option<u16>,
    /// OS process id of the tracked backend process.
    pub process_id: Option<u32>,
    /// Most recent failure, if any.
    pub error: Option<String>,
}

impl BackendStatus {
    /// Base URL for the announced port.
    pub fn base_url(&self) -> Option<String> {
        self.port.map(base_url_for_port)
    }
}

/// Snapshot of the health monitor's view of the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub is_healthy: bool,
    pub consecutive_failures: u32,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self {
            is_healthy: true,
            consecutive_failures: 0,
            last_checked_at: None,
            error: None,
        }
    }
}

/// Where the supervisor is in the backend's lifecycle.
///
/// Failed starts and crashes are transitions rather than resting states:
/// both land in `Idle` with the status error set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecyclePhase {
    #[default]
    Idle,
    /// Process spawned, waiting for the port announcement.
    Starting,
    /// Port known, readiness not yet probed.
    PortAnnounced,
    /// Probing the health endpoint.
    Probing,
    /// Backend answered healthy.
    Ready,
    /// Termination requested.
    Stopping,
}

impl LifecyclePhase {
    /// Any phase between spawn and readiness.
    pub const fn is_starting(self) -> bool {
        matches!(self, Self::Starting | Self::PortAnnounced | Self::Probing)
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::PortAnnounced => "port-announced",
            Self::Probing => "probing",
            Self::Ready => "ready",
            Self::Stopping => "stopping",
        };
        f.write_str(name)
    }
}
