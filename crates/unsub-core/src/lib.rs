//! Core domain for the Unsubscriber desktop shell.
//!
//! Pure types shared by the backend supervisor and the health monitor:
//! status snapshots, lifecycle and health events, configuration, and the
//! port traits the runtime implements. No process or network code lives
//! here.

#![deny(unsafe_code)]

pub mod config;
pub mod domain;
pub mod events;
pub mod ports;

pub use config::{BackendConfig, ConfigError, HealthMonitorConfig};
pub use domain::{BackendStatus, HealthResponse, HealthStatus, LifecyclePhase};
pub use events::{BackendEvent, HealthEvent};
