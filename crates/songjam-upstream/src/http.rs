//! Shared HTTP plumbing: one pooled `reqwest::Client`, uniform error mapping
//! and latency recording for every upstream.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::RequestBuilder;
use serde_json::Value;
use tracing::{debug, warn};

use songjam_core::errors::UpstreamError;
use songjam_telemetry::MetricsRecorder;

pub const LATENCY_METRIC: &str = "upstream_latency_ms";

#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    timeout: Duration,
    metrics: Option<Arc<MetricsRecorder>>,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Network(format!("client build: {e}")))?;
        Ok(Self {
            client,
            timeout,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url)
    }

    /// Send and decode a JSON body. Non-2xx becomes [`UpstreamError::Status`]
    /// carrying the raw body; an empty 2xx body decodes to `null`.
    pub async fn send_json(&self, service: &'static str, request: RequestBuilder) -> Result<Value, UpstreamError> {
        let started = Instant::now();
        let result = request.send().await;
        self.observe(service, started);

        let response = result.map_err(|e| self.transport_error(service, e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(service, e))?;

        if !status.is_success() {
            warn!(service, status = status.as_u16(), "upstream returned error status");
            return Err(UpstreamError::from_status(service, status.as_u16(), body));
        }

        debug!(service, status = status.as_u16(), bytes = body.len(), "upstream ok");
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| UpstreamError::Decode {
            service,
            detail: e.to_string(),
        })
    }

    fn observe(&self, service: &'static str, started: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.histogram_observe(
                LATENCY_METRIC,
                &[("service", service)],
                started.elapsed().as_secs_f64() * 1000.0,
            );
        }
    }

    fn transport_error(&self, service: &'static str, e: reqwest::Error) -> UpstreamError {
        if e.is_timeout() {
            warn!(service, timeout = ?self.timeout, "upstream timed out");
            UpstreamError::Timeout(self.timeout)
        } else {
            warn!(service, error = %e, "upstream transport failure");
            UpstreamError::Network(e.to_string())
        }
    }
}

/// Join a base URL and a path without doubling slashes.
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
