//! Health monitor events.

use serde::{Deserialize, Serialize};

use crate::domain::HealthStatus;

/// Outcome notifications from the health monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "status", rename_all = "camelCase")]
pub enum HealthEvent {
    /// A check completed (success or failure).
    Checked(HealthStatus),
    /// The failure threshold was reached; polling has stopped.
    Critical(HealthStatus),
    /// The user acknowledged the critical failure.
    CriticalAcknowledged(HealthStatus),
}

impl HealthEvent {
    pub fn status(&self) -> &HealthStatus {
        match self {
            Self::Checked(status) | Self::Critical(status) | Self::CriticalAcknowledged(status) => {
                status
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_serialization() {
        let event = HealthEvent::CriticalAcknowledged(HealthStatus::default());
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"criticalAcknowledged\""));
        assert!(json.contains("\"isHealthy\":true"));
        assert!(event.status().is_healthy);
    }
}
