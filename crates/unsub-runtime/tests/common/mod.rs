//! Shared fixtures for unsub-runtime integration tests.
//!
//! - `spawn_health_server` runs an in-process axum app with a `/health` route
//!   that turns healthy after a configurable delay
//! - `shell_backend` builds a `BackendConfig` that runs a `/bin/sh -c` script
//! - `CountingProbe` / `ScriptedProbe` are `HealthProbe` fakes

// Each test binary uses a different subset of these helpers
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::{Json, Router, routing::get};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use unsub_core::ports::{HealthCheckError, HealthProbe};
use unsub_core::{BackendConfig, HealthResponse};

/// An in-process stand-in for the backend's HTTP side.
pub struct TestHealthServer {
    pub port: u16,
    handle: JoinHandle<()>,
}

impl Drop for TestHealthServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Serve `/health` on an ephemeral loopback port.
///
/// Answers 503 `{"status":"starting"}` until `healthy_after` has elapsed,
/// then 200 `{"status":"healthy"}`.
pub async fn spawn_health_server(healthy_after: Duration) -> TestHealthServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let healthy_at = Instant::now() + healthy_after;

    let app = Router::new().route(
        "/health",
        get(move || async move {
            if Instant::now() >= healthy_at {
                (
                    StatusCode::OK,
                    Json(json!({
                        "status": "healthy",
                        "version": "1.0.0",
                        "message": "Email Unsubscriber API is running"
                    })),
                )
            } else {
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({ "status": "starting" })),
                )
            }
        }),
    );

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestHealthServer { port, handle }
}

/// A backend that runs `script` under `/bin/sh` with test-friendly timings.
pub fn shell_backend(dir: &Path, script: &str) -> BackendConfig {
    let mut config = BackendConfig::new("/bin/sh")
        .with_args(["-c", script])
        .with_working_dir(dir);
    config.startup_timeout = Duration::from_secs(5);
    config.probe_interval = Duration::from_millis(50);
    config.probe_timeout = Duration::from_millis(500);
    config.shutdown_grace = Duration::from_millis(500);
    config
}

/// Announce `port`, then stay alive until signalled.
pub fn announce_and_sleep(port: u16) -> String {
    format!("echo PORT:{port}; exec sleep 30")
}

/// Poll `condition` every 20ms until it holds or `within` elapses.
pub async fn eventually(within: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + within;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

/// Whether a process with `pid` still exists.
pub fn process_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stderr(std::process::Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

/// Probe that always answers healthy and counts its calls.
#[derive(Default)]
pub struct CountingProbe {
    calls: AtomicUsize,
}

impl CountingProbe {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProbe for CountingProbe {
    async fn probe(&self, _base_url: &str) -> Result<HealthResponse, HealthCheckError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(HealthResponse::healthy())
    }
}

/// Probe that replays a script of outcomes, then repeats `fallback`.
pub struct ScriptedProbe {
    script: Mutex<VecDeque<Result<HealthResponse, HealthCheckError>>>,
    fallback: Result<HealthResponse, HealthCheckError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new(
        script: impl IntoIterator<Item = Result<HealthResponse, HealthCheckError>>,
        fallback: Result<HealthResponse, HealthCheckError>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fail with a transport error.
    pub fn failing() -> Self {
        Self::new([], Err(refused()))
    }

    /// Sleep `delay` before answering each probe.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn probe(&self, _base_url: &str) -> Result<HealthResponse, HealthCheckError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

pub fn refused() -> HealthCheckError {
    HealthCheckError::Transport {
        reason: "connection refused".to_string(),
    }
}
