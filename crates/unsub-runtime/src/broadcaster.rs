//! Health event broadcasting for presentation layers.

use tokio::sync::broadcast;
use tracing::debug;
use unsub_core::ports::HealthObserver;
use unsub_core::{HealthEvent, HealthStatus};

/// Broadcast channel capacity for health events
const CHANNEL_CAPACITY: usize = 64;

/// `HealthObserver` that fans health outcomes out to any number of subscribers.
///
/// A status reporting `is_healthy == false` is published as
/// [`HealthEvent::Critical`]; the monitor only reports unhealthy once the
/// failure threshold is reached.
pub struct HealthEventBroadcaster {
    sender: broadcast::Sender<HealthEvent>,
}

impl HealthEventBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Broadcast a health event to all subscribers
    pub fn broadcast(&self, event: HealthEvent) {
        // Only log if there are receivers
        if self.sender.receiver_count() > 0 {
            debug!(?event, "Broadcasting health event");
            let _ = self.sender.send(event);
        }
    }

    /// Subscribe to health events
    pub fn subscribe(&self) -> broadcast::Receiver<HealthEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for HealthEventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthObserver for HealthEventBroadcaster {
    fn on_status(&self, status: &HealthStatus) {
        let event = if status.is_healthy {
            HealthEvent::Checked(status.clone())
        } else {
            HealthEvent::Critical(status.clone())
        };
        self.broadcast(event);
    }

    fn on_critical_acknowledged(&self, status: &HealthStatus) {
        self.broadcast(HealthEvent::CriticalAcknowledged(status.clone()));
    }
}
