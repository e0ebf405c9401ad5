//! Events pushed from the core components to presentation layers.
//!
//! Both event types serialize with a `type` tag so any transport (terminal,
//! IPC bridge, SSE) can forward them unchanged.

mod backend;
mod health;

pub use backend::BackendEvent;
pub use health::HealthEvent;
