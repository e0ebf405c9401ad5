//! Status command handler.
//!
//! Starts the backend once, prints its status as JSON and stops it again.

use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::warn;
use unsub_runtime::BackendSupervisor;

use crate::parser::BackendArgs;

/// Execute the status command.
///
/// The printed status carries the failure reason when the backend could not
/// be started; the exit code is non-zero in that case.
pub async fn execute(args: &BackendArgs) -> Result<ExitCode> {
    let config = args
        .backend_config()
        .context("invalid backend configuration")?;
    let supervisor = BackendSupervisor::new(config).context("failed to build health probe")?;

    let outcome = supervisor.start().await;
    let status = supervisor.status();
    println!("{}", serde_json::to_string_pretty(&status)?);

    supervisor.stop().await;

    match outcome {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            warn!(error = %e, "Backend did not start");
            Ok(ExitCode::FAILURE)
        }
    }
}
