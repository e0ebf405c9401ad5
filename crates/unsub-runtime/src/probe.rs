//! HTTP health probing of the backend.
//!
//! `HttpHealthProbe` performs one bounded `GET <base><health path>` request.
//! `wait_until_ready` repeats it until the backend answers healthy; the
//! caller bounds the overall wait.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tokio::time::sleep;
use tracing::{debug, info};
use unsub_core::HealthResponse;
use unsub_core::ports::{HealthCheckError, HealthProbe};

use crate::millis;

/// `HealthProbe` backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    client: Client,
    health_path: String,
    timeout: Duration,
}

impl HttpHealthProbe {
    /// Create a probe for `health_path` with a per-request `timeout`.
    pub fn new(health_path: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).no_proxy().build()?;
        Ok(Self {
            client,
            health_path: health_path.into(),
            timeout,
        })
    }

    /// Full health URL for a backend base URL.
    pub fn health_url(&self, base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.health_path)
    }

    fn request_error(&self, e: &reqwest::Error) -> HealthCheckError {
        if e.is_timeout() {
            HealthCheckError::Timeout {
                timeout_ms: millis(self.timeout),
            }
        } else {
            HealthCheckError::Transport {
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn probe(&self, base_url: &str) -> Result<HealthResponse, HealthCheckError> {
        let url = self.health_url(base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.request_error(&e))?;

        // Only 200 counts; redirects and other 2xx codes are not the backend we expect
        let status = response.status();
        if status != StatusCode::OK {
            return Err(HealthCheckError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| self.request_error(&e))?;
        let health: HealthResponse =
            serde_json::from_slice(&body).map_err(|e| HealthCheckError::MalformedBody {
                reason: e.to_string(),
            })?;

        if health.is_healthy() {
            Ok(health)
        } else {
            Err(HealthCheckError::Unhealthy {
                reported: health.status,
            })
        }
    }
}

/// Probe `base_url` until it answers healthy.
///
/// The first probe goes out immediately, later ones every `interval`.
/// Failures are expected while the backend boots and are only logged at
/// debug level. Never returns on its own if the backend stays unhealthy;
/// wrap it in a timeout.
pub async fn wait_until_ready(
    probe: Arc<dyn HealthProbe>,
    base_url: &str,
    interval: Duration,
) -> HealthResponse {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match probe.probe(base_url).await {
            Ok(response) => {
                info!(
                    %base_url,
                    attempt = %attempt,
                    version = response.version.as_deref().unwrap_or("unknown"),
                    "Backend is ready"
                );
                return response;
            }
            Err(e) => {
                debug!(%base_url, attempt = %attempt, error = %e, "Readiness probe failed, retrying");
            }
        }
        sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::{Sequence, mock};
    use tokio::time::Instant;

    mock! {
        Probe {}

        #[async_trait]
        impl HealthProbe for Probe {
            async fn probe(&self, base_url: &str) -> Result<HealthResponse, HealthCheckError>;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_ready_retries_on_interval() {
        let mut probe = MockProbe::new();
        let mut seq = Sequence::new();
        probe
            .expect_probe()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Err(HealthCheckError::HttpStatus { status: 503 }));
        probe
            .expect_probe()
            .withf(|base_url| base_url == "http://127.0.0.1:50001")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(HealthResponse::healthy()));

        let started = Instant::now();
        let response = wait_until_ready(
            Arc::new(probe),
            "http://127.0.0.1:50001",
            Duration::from_millis(250),
        )
        .await;

        assert!(response.is_healthy());
        assert_eq!(started.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_ready_first_probe_is_immediate() {
        let mut probe = MockProbe::new();
        probe
            .expect_probe()
            .times(1)
            .returning(|_| Ok(HealthResponse::healthy()));

        let started = Instant::now();
        wait_until_ready(Arc::new(probe), "http://127.0.0.1:50001", Duration::from_secs(1)).await;
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_health_url_joins_cleanly() {
        let probe = HttpHealthProbe::new("/health", Duration::from_secs(2)).unwrap();
        assert_eq!(
            probe.health_url("http://127.0.0.1:50001"),
            "http://127.0.0.1:50001/health"
        );
        assert_eq!(
            probe.health_url("http://127.0.0.1:50001/"),
            "http://127.0.0.1:50001/health"
        );
    }

    #[tokio::test]
    async fn test_unreachable_port_is_transport_failure() {
        // Port 9 (discard) is essentially never listening on loopback
        let probe = HttpHealthProbe::new("/health", Duration::from_millis(500)).unwrap();
        let err = probe.probe("http://127.0.0.1:9").await.unwrap_err();
        assert!(err.is_transport(), "unexpected error: {err}");
    }
}
