//! End-to-end checks of the `unsub` binary's output streams.
//!
//! The binary runs as a subprocess with a scratch log directory. Stdout must
//! carry only the JSON the command prints; log lines belong on stderr.

#![cfg(unix)]

use std::path::PathBuf;
use std::process::{Command, Output};

use serde_json::Value;

fn unsub_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_unsub"))
}

/// Run `unsub status` against a `/bin/sh -c <script>` backend.
fn run_status(script: &str) -> (Output, tempfile::TempDir) {
    let logs = tempfile::tempdir().unwrap();
    let mut cmd = Command::new(unsub_bin());
    for (key, _) in std::env::vars() {
        if key.starts_with("UNSUB_") {
            cmd.env_remove(key);
        }
    }
    let output = cmd
        .args(["status", "--executable", "/bin/sh", "--arg", "-c", "--arg", script])
        .args(["--startup-timeout-ms", "2000"])
        .env("UNSUB_LOG_DIR", logs.path())
        .env("RUST_LOG", "debug")
        .output()
        .unwrap();
    (output, logs)
}

#[test]
fn test_status_stdout_is_pure_json() {
    // The script is one `--arg` containing spaces; split up, `sh -c` would run `echo` alone
    let (output, _logs) = run_status("echo 'booting up'; exit 3");

    assert!(!output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let status: Value = serde_json::from_str(&stdout)
        .unwrap_or_else(|e| panic!("stdout is not a single JSON document ({e}): {stdout}"));
    assert_eq!(status["isRunning"], Value::Bool(false));
    assert_eq!(
        status["error"],
        Value::from("backend exited during startup (exit status: 3)")
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Backend failed to start"), "stderr: {stderr}");
}
