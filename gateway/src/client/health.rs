//! Periodic health probe against the gateway's `/ping` endpoint

use std::time::{Duration, SystemTime};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use super::error::{ClientError, ClientResult};
use super::session::SessionInput;

/// Result of one probe. `latency_ms` is `None` when the probe failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthSample {
    #[serde(with = "unix_millis")]
    pub requested_at: SystemTime,
    pub latency_ms: Option<u64>,
}

impl HealthSample {
    pub fn is_healthy(&self) -> bool {
        self.latency_ms.is_some()
    }
}

mod unix_millis {
    use serde::Serializer;
    use std::time::{SystemTime, UNIX_EPOCH};

    pub fn serialize<S: Serializer>(at: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        serializer.serialize_u64(millis)
    }
}

/// Derive the probe URL from the gateway socket URL: same origin, `/ping`.
pub fn health_url(socket_url: &str) -> ClientResult<Url> {
    let mut url = Url::parse(socket_url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
    let scheme = match url.scheme() {
        "ws" | "http" => "http",
        "wss" | "https" => "https",
        other => return Err(ClientError::InvalidUrl(format!("unsupported scheme {}", other))),
    };
    url.set_scheme(scheme)
        .map_err(|_| ClientError::InvalidUrl(socket_url.to_string()))?;
    url.set_path("/ping");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Issue one probe
pub async fn probe(client: &reqwest::Client, url: &Url, timeout: Duration) -> HealthSample {
    let requested_at = SystemTime::now();
    let started = Instant::now();

    let latency_ms = match client.get(url.clone()).timeout(timeout).send().await {
        Ok(response) if response.status().is_success() => {
            Some(started.elapsed().as_millis() as u64)
        }
        Ok(response) => {
            warn!(status = %response.status(), "Health probe returned error status");
            None
        }
        Err(e) => {
            warn!("Health probe failed: {}", e);
            None
        }
    };

    HealthSample {
        requested_at,
        latency_ms,
    }
}

/// Background prober bound to one connection generation. Stops on drop.
pub struct HealthProber {
    cancel: CancellationToken,
}

impl HealthProber {
    /// Probe immediately, then every `interval`, reporting each sample.
    pub(crate) fn spawn(
        client: reqwest::Client,
        url: Url,
        interval: Duration,
        timeout: Duration,
        generation: u64,
        inputs: mpsc::UnboundedSender<SessionInput>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            debug!(generation, url = %url, "Health prober started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let sample = tokio::select! {
                    _ = token.cancelled() => break,
                    sample = probe(&client, &url, timeout) => sample,
                };

                if inputs
                    .send(SessionInput::Health { generation, sample })
                    .is_err()
                {
                    break;
                }
            }
            debug!(generation, "Health prober stopped");
        });

        Self { cancel }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for HealthProber {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_health_url_from_socket_url() {
        let url = health_url("ws://localhost:8080/ws?token=abc").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/ping");

        let url = health_url("wss://gateway.example.com/ws").unwrap();
        assert_eq!(url.as_str(), "https://gateway.example.com/ping");
    }

    #[test]
    fn test_health_url_rejects_other_schemes() {
        assert!(health_url("ftp://example.com/ws").is_err());
        assert!(health_url("not a url").is_err());
    }

    #[tokio::test]
    async fn test_probe_reports_latency() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"ok"}"#))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/ping", server.uri())).unwrap();
        let sample = probe(&reqwest::Client::new(), &url, Duration::from_secs(2)).await;
        assert!(sample.is_healthy());
    }

    #[tokio::test]
    async fn test_probe_failure_has_no_latency() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/ping", server.uri())).unwrap();
        let sample = probe(&reqwest::Client::new(), &url, Duration::from_secs(2)).await;
        assert_eq!(sample.latency_ms, None);
    }

    #[tokio::test]
    async fn test_prober_reports_immediately() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let url = Url::parse(&format!("{}/ping", server.uri())).unwrap();
        let prober = HealthProber::spawn(
            reqwest::Client::new(),
            url,
            Duration::from_secs(3600),
            Duration::from_secs(2),
            7,
            tx,
        );

        let input = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match input {
            SessionInput::Health { generation, sample } => {
                assert_eq!(generation, 7);
                assert!(sample.is_healthy());
            }
            _ => panic!("expected a health sample"),
        }
        prober.stop();
    }
}
