//! Supervisor error taxonomy.

use thiserror::Error;

/// Why a start attempt failed.
///
/// Every variant is terminal to one attempt and recoverable by calling
/// `start()` again. `Clone` so that all callers sharing an in-flight start
/// receive the same error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SupervisorError {
    /// The OS refused to launch the executable.
    #[error("failed to spawn backend '{executable}': {reason}")]
    SpawnFailure { executable: String, reason: String },

    /// No port announcement within the startup budget.
    #[error("backend did not announce a port within {timeout_ms}ms")]
    StartupTimeout { timeout_ms: u64 },

    /// Port announced, but the health endpoint never reported healthy in time.
    #[error("backend on port {port} did not become healthy within {timeout_ms}ms")]
    HealthCheckTimeout { port: u16, timeout_ms: u64 },

    /// The process exited before it became ready.
    #[error("backend exited during startup ({exit})")]
    ExitedDuringStartup { code: Option<i32>, exit: String },

    /// `stop()` was called while the start was in flight.
    #[error("backend startup aborted by stop request")]
    StartupAborted,

    /// A stop is still in progress; start again once it completes.
    #[error("backend is shutting down")]
    ShuttingDown,

    /// The startup task itself failed.
    #[error("internal supervisor error: {reason}")]
    Internal { reason: String },
}

impl SupervisorError {
    pub(crate) fn internal(reason: impl std::fmt::Display) -> Self {
        Self::Internal {
            reason: reason.to_string(),
        }
    }

    /// Attempt ran out of time (either phase).
    pub const fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::StartupTimeout { .. } | Self::HealthCheckTimeout { .. }
        )
    }
}

/// Result type alias for supervisor operations.
pub type SupervisorResult<T> = Result<T, SupervisorError>;
