//! Presentation-side ports of the health monitor.

use async_trait::async_trait;

use crate::domain::HealthStatus;

/// Receives every health check outcome.
///
/// Called from the monitor task; implementations must not block and must not
/// call `stop()` on the monitor that notifies them.
pub trait HealthObserver: Send + Sync {
    /// Called after every check, success or failure.
    fn on_status(&self, status: &HealthStatus);

    /// Called once after the user acknowledged a critical failure, so that
    /// dependent UI can be disabled.
    fn on_critical_acknowledged(&self, status: &HealthStatus) {
        self.on_status(status);
    }
}

/// Tells the user that the backend was declared dead.
#[async_trait]
pub trait CriticalFailureNotifier: Send + Sync {
    /// Resolves once the user acknowledged the failure.
    async fn notify_critical(&self, status: &HealthStatus);
}

/// Observer that discards all notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHealthObserver;

impl HealthObserver for NoopHealthObserver {
    fn on_status(&self, _status: &HealthStatus) {}
}

/// Notifier that acknowledges immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCriticalNotifier;

#[async_trait]
impl CriticalFailureNotifier for NoopCriticalNotifier {
    async fn notify_critical(&self, _status: &HealthStatus) {}
}
