//! Termination signals for the backend process.
//!
//! The supervisor's exit watcher owns the `Child`, so termination is split:
//! the graceful signal is sent here by PID, the forced kill goes through the
//! watcher, and exit is observed through the watcher as well.

use std::fmt;
use std::io;
use std::process::ExitStatus;

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Ask the process to exit on its own terms.
///
/// # Platform behavior
/// - Unix: sends SIGTERM
/// - Windows: no graceful signal exists for console-less processes, so
///   nothing is sent and the caller escalates straight to a kill
///
/// # Returns
/// - `Ok(true)` if the signal was delivered
/// - `Ok(false)` if there was nothing to signal (already gone, or Windows)
pub fn request_graceful_exit(pid: u32) -> io::Result<bool> {
    #[cfg(unix)]
    {
        let raw = i32::try_from(pid)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
        match signal::kill(Pid::from_raw(raw), Signal::SIGTERM) {
            Ok(()) => Ok(true),
            Err(Errno::ESRCH) => Ok(false),
            Err(e) => Err(io::Error::other(e)),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        Ok(false)
    }
}

/// How a backend process ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code, absent when killed by a signal or unknown.
    pub code: Option<i32>,
    /// Human-readable description of the exit.
    pub description: String,
}

impl ExitInfo {
    /// Describe the result of waiting on a child.
    pub fn from_wait(result: &io::Result<ExitStatus>) -> Self {
        match result {
            Ok(status) => Self {
                code: status.code(),
                description: status.to_string(),
            },
            Err(e) => Self {
                code: None,
                description: format!("wait failed: {e}"),
            },
        }
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.description.is_empty() {
            f.write_str("unknown exit")
        } else {
            f.write_str(&self.description)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::process::Command;

    #[tokio::test]
    #[cfg(unix)]
    async fn graceful_signal_terminates_sleep() {
        let mut child = Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("failed to spawn sleep");
        let pid = child.id().expect("no PID");

        assert!(request_graceful_exit(pid).unwrap());

        let info = ExitInfo::from_wait(&child.wait().await);
        assert_eq!(info.code, None);
        assert!(!info.to_string().is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn graceful_signal_to_missing_process() {
        // PID 999999 should not exist
        assert!(!request_graceful_exit(999_999).unwrap());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn exit_code_is_recorded() {
        let mut child = Command::new("sh")
            .args(["-c", "exit 3"])
            .spawn()
            .expect("failed to spawn sh");
        let info = ExitInfo::from_wait(&child.wait().await);
        assert_eq!(info.code, Some(3));
    }

    #[test]
    fn unknown_exit_display() {
        assert_eq!(ExitInfo::default().to_string(), "unknown exit");
    }
}
