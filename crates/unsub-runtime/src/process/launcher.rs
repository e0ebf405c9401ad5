//! Backend process spawning.

use std::io;
use std::process::Stdio;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::debug;
use unsub_core::BackendConfig;

/// Keeps the backend from opening a console window on Windows.
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// A freshly spawned backend with its output streams detached.
#[derive(Debug)]
pub struct LaunchedProcess {
    pub child: Child,
    pub pid: u32,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// Spawn the backend described by `config`.
///
/// stdout and stderr are piped, stdin is closed, and the child is killed if
/// its handle is dropped without being reaped.
pub fn launch(config: &BackendConfig) -> io::Result<LaunchedProcess> {
    let mut child = build_command(config).spawn()?;

    let pid = child
        .id()
        .ok_or_else(|| io::Error::other("spawned backend has no process id"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("backend stdout was not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("backend stderr was not captured"))?;

    debug!(pid = %pid, executable = %config.executable.display(), "Backend process spawned");

    Ok(LaunchedProcess {
        child,
        pid,
        stdout,
        stderr,
    })
}

fn build_command(config: &BackendConfig) -> Command {
    let mut cmd = Command::new(&config.executable);
    cmd.args(&config.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = config.effective_working_dir() {
        cmd.current_dir(dir);
    }

    #[cfg(windows)]
    cmd.creation_flags(CREATE_NO_WINDOW);

    cmd
}
