//! Critical failure prompt for the terminal.

use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use tracing::{debug, warn};
use unsub_core::HealthStatus;
use unsub_core::ports::CriticalFailureNotifier;

/// Prints a blocking banner on stderr and waits for Enter.
///
/// With stdin closed (non-interactive use) the failure is acknowledged
/// immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalNotifier;

/// Banner shown when the backend is declared dead.
pub fn critical_banner(status: &HealthStatus) -> String {
    let reason = status.error.as_deref().unwrap_or("unknown error");
    format!(
        "\n\
         ==============================================================\n\
         Backend connection lost\n\
         \n\
         The backend failed {failures} consecutive health checks\n\
         (last error: {reason}).\n\
         Restart the application to reconnect.\n\
         ==============================================================\n\
         Press Enter to acknowledge...",
        failures = status.consecutive_failures,
    )
}

#[async_trait]
impl CriticalFailureNotifier for TerminalNotifier {
    async fn notify_critical(&self, status: &HealthStatus) {
        let banner = critical_banner(status);
        let prompt = tokio::task::spawn_blocking(move || -> io::Result<()> {
            let mut stderr = io::stderr().lock();
            writeln!(stderr, "{banner}")?;
            stderr.flush()?;
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            Ok(())
        });

        match prompt.await {
            Ok(Ok(())) => debug!("Critical failure prompt acknowledged"),
            Ok(Err(e)) => warn!(error = %e, "Critical failure prompt failed"),
            Err(e) => warn!(error = %e, "Critical failure prompt task failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_mentions_failures_and_reason() {
        let status = HealthStatus {
            is_healthy: false,
            consecutive_failures: 3,
            error: Some("health request failed: connection refused".to_string()),
            ..HealthStatus::default()
        };
        let banner = critical_banner(&status);
        assert!(banner.contains("failed 3 consecutive health checks"));
        assert!(banner.contains("connection refused"));
    }
}
