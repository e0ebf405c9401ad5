//! Command-line shell for the Unsubscriber backend.
//!
//! Wires the backend supervisor and the health monitor together for use
//! from a terminal; desktop front ends embed `unsub-runtime` directly.

#![deny(unsafe_code)]

pub mod handlers;
pub mod logging;
pub mod notifier;
pub mod parser;

pub use notifier::TerminalNotifier;
pub use parser::{BackendArgs, Cli, Commands};
