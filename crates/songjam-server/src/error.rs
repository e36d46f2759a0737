//! Error type for route handlers and its JSON envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use songjam_core::deployment::DeploymentStage;
use songjam_core::errors::UpstreamError;
use songjam_space::SpaceError;
use songjam_store::StoreError;

/// `{"error": ..., "details": ...}` body sent with every failure.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Space(#[from] SpaceError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream(e) => upstream_status(e),
            Self::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Space(e) => match e {
                SpaceError::AlreadyActive(_) | SpaceError::Ended(_) => StatusCode::CONFLICT,
                SpaceError::NotFound(_) => StatusCode::NOT_FOUND,
                SpaceError::DeploymentFailed { stage, .. } => stage_status(*stage),
                SpaceError::RoomFailed(inner) => upstream_status(inner),
                SpaceError::Interrupted(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            Self::Upstream(e) | Self::Space(SpaceError::RoomFailed(e)) => e.details(),
            _ => None,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
            details: self.details(),
        }
    }
}

/// Status for a deployment that failed at `stage`: bad input is the
/// caller's, a busy or conflicting record is a conflict, and the rest are
/// upstream failures.
pub fn stage_status(stage: DeploymentStage) -> StatusCode {
    match stage {
        DeploymentStage::Validation => StatusCode::BAD_REQUEST,
        DeploymentStage::Record => StatusCode::CONFLICT,
        DeploymentStage::TokenConfig | DeploymentStage::ChainDeploy | DeploymentStage::EmpireDeploy => {
            StatusCode::BAD_GATEWAY
        }
    }
}

/// Missing keys are a server fault, bad input is the caller's, and upstream
/// statuses pass through. Anything that never got an answer is a 500.
fn upstream_status(error: &UpstreamError) -> StatusCode {
    match error {
        UpstreamError::MissingConfig { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        UpstreamError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        UpstreamError::Status { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        UpstreamError::Network(_)
        | UpstreamError::Decode { .. }
        | UpstreamError::Signing(_)
        | UpstreamError::Timeout(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(status = status.as_u16(), error = %self, "request failed");
        }
        (status, axum::Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use songjam_core::ids::{HostId, SpaceId};

    #[test]
    fn missing_config_is_500() {
        let err = ApiError::from(UpstreamError::missing_config("daily", "DAILY_API_KEY"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.body().error.contains("DAILY_API_KEY"));
    }

    #[test]
    fn upstream_status_passes_through_with_details() {
        let err = ApiError::from(UpstreamError::from_status(
            "neynar",
            404,
            r#"{"message":"user not found"}"#.into(),
        ));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.body().details.unwrap()["message"], "user not found");
    }

    #[test]
    fn transport_failure_is_500() {
        let err = ApiError::from(UpstreamError::Network("connection refused".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn space_errors_map() {
        let active = ApiError::from(SpaceError::AlreadyActive(HostId::from_raw("1")));
        assert_eq!(active.status(), StatusCode::CONFLICT);
        let missing = ApiError::from(SpaceError::NotFound(SpaceId::from_raw("s")));
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        let room = ApiError::from(SpaceError::RoomFailed(UpstreamError::from_status(
            "daily",
            429,
            String::new(),
        )));
        assert_eq!(room.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn deployment_stage_statuses() {
        assert_eq!(stage_status(DeploymentStage::Validation), StatusCode::BAD_REQUEST);
        assert_eq!(stage_status(DeploymentStage::Record), StatusCode::CONFLICT);
        assert_eq!(stage_status(DeploymentStage::ChainDeploy), StatusCode::BAD_GATEWAY);

        let failed = ApiError::from(SpaceError::DeploymentFailed {
            stage: DeploymentStage::Record,
            message: "deployment already in progress".into(),
        });
        assert_eq!(failed.status(), stage_status(DeploymentStage::Record));
    }

    #[test]
    fn bad_request_body_has_no_details() {
        let body = serde_json::to_value(ApiError::bad_request("nope").body()).unwrap();
        assert_eq!(body, serde_json::json!({"error": "nope"}));
    }
}
