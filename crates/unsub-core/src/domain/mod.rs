//! Domain types shared by the supervisor, the health monitor and their consumers.

mod health;
mod status;

pub use health::{HEALTHY_STATUS, HealthResponse};
pub use status::{BackendStatus, HealthStatus, LOOPBACK_HOST, LifecyclePhase, base_url_for_port};
