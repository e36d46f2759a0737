use std::time::Duration;

/// Typed error hierarchy for calls to third-party services.
///
/// Mirrors the three failure classes every proxy route distinguishes:
/// configuration problems, request validation, and upstream failures.
#[derive(Clone, Debug, thiserror::Error)]
pub enum UpstreamError {
    // Raised before any network call
    #[error("{service} is not configured: missing {key}")]
    MissingConfig { service: &'static str, key: &'static str },
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // Upstream answered with a non-success status
    #[error("{service} returned {status}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    // Transport / local failures
    #[error("network error: {0}")]
    Network(String),
    #[error("could not decode {service} response: {detail}")]
    Decode { service: &'static str, detail: String },
    #[error("token signing failed: {0}")]
    Signing(String),
    #[error("timeout after {0:?}")]
    Timeout(Duration),
}

impl UpstreamError {
    pub fn missing_config(service: &'static str, key: &'static str) -> Self {
        Self::MissingConfig { service, key }
    }

    /// Build a status error from an upstream response.
    pub fn from_status(service: &'static str, status: u16, body: String) -> Self {
        Self::Status {
            service,
            status,
            body,
        }
    }

    /// True when the failure happened before anything was sent upstream.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::MissingConfig { .. } | Self::InvalidRequest(_) | Self::Signing(_)
        )
    }

    /// The upstream status code, when the upstream produced one.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::MissingConfig { .. } => "missing_config",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Status { .. } => "upstream_status",
            Self::Network(_) => "network_error",
            Self::Decode { .. } => "decode_error",
            Self::Signing(_) => "signing_error",
            Self::Timeout(_) => "timeout",
        }
    }

    /// Upstream body parsed as JSON when possible, raw text otherwise.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Status { body, .. } if !body.is_empty() => Some(
                serde_json::from_str(body)
                    .unwrap_or_else(|_| serde_json::Value::String(body.clone())),
            ),
            Self::Network(detail) => Some(serde_json::Value::String(detail.clone())),
            Self::Decode { detail, .. } => Some(serde_json::Value::String(detail.clone())),
            _ => None,
        }
    }
}
