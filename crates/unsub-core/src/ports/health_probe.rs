//! Single-shot backend health checks.

use async_trait::async_trait;
use thiserror::Error;

use super::BackendUrlSource;
use crate::domain::HealthResponse;

/// Why a health check did not count as healthy.
///
/// Every variant counts toward the failure threshold; none is fatal on its own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HealthCheckError {
    /// No port is known, so there is nothing to probe.
    #[error("backend URL not available")]
    BackendUrlUnavailable,

    /// Connection refused, reset, DNS, ...
    #[error("health request failed: {reason}")]
    Transport { reason: String },

    /// No answer within the request budget.
    #[error("health request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Anything other than HTTP 200.
    #[error("health endpoint returned HTTP {status}")]
    HttpStatus { status: u16 },

    /// Body decoded, but the status value is not the healthy sentinel.
    #[error("backend reported unhealthy status: {reported}")]
    Unhealthy { reported: String },

    /// Body could not be decoded.
    #[error("malformed health response: {reason}")]
    MalformedBody { reason: String },
}

impl HealthCheckError {
    /// Network-level failure (as opposed to a response the backend produced).
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }
}

/// One bounded request against the backend health endpoint.
///
/// Implementations resolve `Ok` only for HTTP 200 with a body reporting the
/// healthy sentinel, and must bound their own duration.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, base_url: &str) -> Result<HealthResponse, HealthCheckError>;
}

/// Run one check cycle: resolve the base URL, then probe it.
///
/// A missing URL is a failure and no request is attempted.
pub async fn probe_backend(
    urls: &dyn BackendUrlSource,
    probe: &dyn HealthProbe,
) -> Result<HealthResponse, HealthCheckError> {
    let base_url = urls
        .base_url()
        .ok_or(HealthCheckError::BackendUrlUnavailable)?;
    probe.probe(&base_url).await
}
