//! Backend process lifecycle events.

use serde::{Deserialize, Serialize};

/// Lifecycle transitions of the supervised backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendEvent {
    /// Process spawned, waiting for port announcement and readiness.
    #[serde(rename_all = "camelCase")]
    Starting { process_id: u32 },

    /// Backend answered healthy and is ready to serve.
    #[serde(rename_all = "camelCase")]
    Running { port: u16, process_id: u32 },

    /// Termination requested.
    #[serde(rename_all = "camelCase")]
    Stopping { port: Option<u16> },

    /// Process confirmed exited after a requested stop.
    Stopped,

    /// Process exited while it was considered running.
    #[serde(rename_all = "camelCase")]
    Crashed {
        port: Option<u16>,
        exit_code: Option<i32>,
        error: String,
    },

    /// A start attempt failed.
    Failed { error: String },
}

impl BackendEvent {
    /// Short name of the event, matching its serialized tag.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Starting { .. } => "starting",
            Self::Running { .. } => "running",
            Self::Stopping { .. } => "stopping",
            Self::Stopped => "stopped",
            Self::Crashed { .. } => "crashed",
            Self::Failed { .. } => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_serialization() {
        let event = BackendEvent::Running {
            port: 50001,
            process_id: 77,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"running\""));
        assert!(json.contains("\"processId\":77"));
        assert_eq!(event.name(), "running");
    }

    #[test]
    fn test_crashed_round_trip() {
        let event = BackendEvent::Crashed {
            port: Some(50002),
            exit_code: Some(1),
            error: "exit status: 1".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"exitCode\":1"));
        let back: BackendEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
