//! Port definitions (traits) at the seams between the core components and
//! their collaborators.
//!
//! - `HealthProbe`: one bounded health request against a base URL
//! - `BackendUrlSource`: where the backend currently lives, if anywhere
//! - `HealthObserver` / `CriticalFailureNotifier`: the presentation side
//!
//! All traits are object-safe and used as `Arc<dyn Trait>`.

mod backend_url;
mod health_observer;
mod health_probe;

pub use backend_url::{BackendUrlSource, FixedBackendUrl};
pub use health_observer::{
    CriticalFailureNotifier, HealthObserver, NoopCriticalNotifier, NoopHealthObserver,
};
pub use health_probe::{HealthCheckError, HealthProbe, probe_backend};

#[cfg(test)]
pub use backend_url::MockBackendUrlSource;
#[cfg(test)]
pub use health_probe::MockHealthProbe;
