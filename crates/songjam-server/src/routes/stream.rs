use std::time::Duration;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use songjam_upstream::StreamToken;

use super::required;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct TokenBody {
    #[serde(default)]
    pub user_id: Option<String>,
    /// Seconds until expiry. Tokens do not expire when absent.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// `POST /api/stream/token`: signed locally, no upstream call.
pub async fn issue_token(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<TokenBody>,
) -> ApiResult<Json<StreamToken>> {
    let user_id = required(&body.user_id).ok_or_else(|| ApiError::bad_request("user_id is required"))?;
    let token = state
        .clients
        .stream
        .user_token(user_id, body.expires_in.map(Duration::from_secs))?;
    Ok(Json(token))
}
