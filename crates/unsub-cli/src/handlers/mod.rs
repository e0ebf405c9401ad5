//! Command handlers.
//!
//! Handlers follow one pattern:
//! - Signature: `pub async fn execute(args: &BackendArgs) -> Result<ExitCode>`
//! - Thin wrappers that:
//!   1. Resolve configuration from flags and environment
//!   2. Drive the runtime components
//!   3. Format output for the terminal

pub mod run;
pub mod status;
