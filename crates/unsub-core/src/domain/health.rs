//! Body of the backend health endpoint.

use serde::{Deserialize, Serialize};

/// Status value the backend reports when it is ready to serve.
pub const HEALTHY_STATUS: &str = "healthy";

/// Response of `GET /health`.
///
/// Only `status` is required; the remaining fields are informational and
/// tolerated when absent. The backend sends a naive ISO-8601 timestamp with
/// no offset, so it is kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthResponse {
    /// A minimal response carrying only a status value.
    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            timestamp: None,
            version: None,
            message: None,
        }
    }

    /// A minimal healthy response.
    pub fn healthy() -> Self {
        Self::with_status(HEALTHY_STATUS)
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HEALTHY_STATUS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_backend_body() {
        let body = r#"{
            "status": "healthy",
            "timestamp": "2025-10-21T12:00:00",
            "version": "1.0.0",
            "message": "Backend is running normally"
        }"#;
        let response: HealthResponse = serde_json::from_str(body).unwrap();
        assert!(response.is_healthy());
        assert_eq!(response.version.as_deref(), Some("1.0.0"));
        assert_eq!(response.timestamp.as_deref(), Some("2025-10-21T12:00:00"));
    }

    #[test]
    fn test_status_only_body() {
        let response: HealthResponse = serde_json::from_str(r#"{"status":"degraded"}"#).unwrap();
        assert!(!response.is_healthy());
        assert!(response.version.is_none());
    }

    #[test]
    fn test_status_is_case_sensitive() {
        assert!(!HealthResponse::with_status("Healthy").is_healthy());
    }
}
