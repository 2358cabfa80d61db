//! HTTP readiness probe.

use std::time::Duration;

use reqwest::StatusCode;

use crate::service::config::ServiceEndpoint;

/// Result of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// `GET /` answered exactly 200.
    Ready,
    /// The service answered with something other than 200.
    NotReady { status: u16 },
    /// No HTTP answer at all (refused, reset, timed out).
    Unreachable { reason: String },
}

impl ProbeOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, ProbeOutcome::Ready)
    }
}

/// Polls a service endpoint until it answers 200.
pub struct ReadinessProbe {
    url: String,
    interval: Duration,
    /// Reusable HTTP client for probes (avoids per-request allocation).
    http_client: reqwest::Client,
}

impl ReadinessProbe {
    pub fn new(endpoint: &ServiceEndpoint, interval: Duration, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            url: endpoint.url_for("/"),
            interval,
            http_client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue one `GET`. Only the status code is inspected, never the body.
    pub async fn probe(&self) -> ProbeOutcome {
        match self.http_client.get(&self.url).send().await {
            Ok(resp) if resp.status() == StatusCode::OK => ProbeOutcome::Ready,
            Ok(resp) => ProbeOutcome::NotReady {
                status: resp.status().as_u16(),
            },
            Err(e) => ProbeOutcome::Unreachable {
                reason: e.to_string(),
            },
        }
    }

    /// Block until the endpoint answers 200 and return the number of
    /// attempts it took.
    ///
    /// There is no timeout: a service that never comes up stalls the hook
    /// here, waiting `interval` between attempts.
    pub async fn wait_until_ready(&self) -> u32 {
        tracing::info!(
            "Waiting for {} to come online, this might take a few minutes",
            self.url
        );

        let mut attempts = 0u32;
        loop {
            attempts = attempts.saturating_add(1);
            match self.probe().await {
                ProbeOutcome::Ready => break,
                ProbeOutcome::NotReady { status } => {
                    tracing::debug!("Probe {} answered {}, retrying", attempts, status);
                }
                ProbeOutcome::Unreachable { reason } => {
                    tracing::info!("Probe {} failed: {}", attempts, reason);
                    tracing::info!("retrying..");
                }
            }
            tokio::time::sleep(self.interval).await;
        }

        tracing::info!("{} is online after {} attempt(s)", self.url, attempts);
        attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockCheServer;

    fn probe_for(endpoint: &ServiceEndpoint) -> ReadinessProbe {
        ReadinessProbe::new(endpoint, Duration::from_millis(10), Duration::from_secs(2))
    }

    /// An endpoint nothing listens on.
    async fn closed_endpoint() -> ServiceEndpoint {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        ServiceEndpoint {
            host: "127.0.0.1".to_string(),
            port,
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_unreachable() {
        let probe = probe_for(&closed_endpoint().await);
        assert!(matches!(probe.probe().await, ProbeOutcome::Unreachable { .. }));
    }

    #[tokio::test]
    async fn test_non_200_is_not_ready() {
        let server = MockCheServer::builder().not_ready_for(1).start().await;
        let probe = probe_for(&server.endpoint());

        assert_eq!(probe.probe().await, ProbeOutcome::NotReady { status: 503 });
        assert_eq!(probe.probe().await, ProbeOutcome::Ready);
    }

    #[tokio::test]
    async fn test_other_2xx_is_not_ready() {
        let server = MockCheServer::builder().ready_status(204).start().await;
        let probe = probe_for(&server.endpoint());

        assert_eq!(probe.probe().await, ProbeOutcome::NotReady { status: 204 });
    }

    #[tokio::test]
    async fn test_wait_counts_attempts() {
        let server = MockCheServer::builder().not_ready_for(2).start().await;
        let probe = probe_for(&server.endpoint());

        assert_eq!(probe.wait_until_ready().await, 3);
        assert_eq!(server.probe_count(), 3);
    }

    #[tokio::test]
    async fn test_wait_survives_refused_connections() {
        let endpoint = closed_endpoint().await;
        let probe = probe_for(&endpoint);

        // Bring the service up on the same port after a few refused attempts.
        let port = endpoint.port;
        let server = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            MockCheServer::builder().port(port).start().await
        });

        let attempts = probe.wait_until_ready().await;
        assert!(attempts > 1);
        let _server = server.await.unwrap();
    }
}
