use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use songjam_telemetry::{LogQuery, LogRecord, MetricsSnapshot};

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

const MAX_LOG_LIMIT: u32 = 1_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsQuery {
    pub level: Option<String>,
    pub host_id: Option<String>,
    pub route: Option<String>,
    pub limit: Option<u32>,
}

/// `GET /health`: liveness plus which upstreams have credentials.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "services": state.credentials.configured_services(),
        "activeSpaces": state.spaces.active_count(),
    }))
}

/// `GET /metrics`
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

/// `GET /api/logs?level=&hostId=&route=&limit=`: newest persisted warn+ logs.
pub async fn logs(State(state): State<AppState>, Query(query): Query<LogsQuery>) -> ApiResult<Json<Vec<LogRecord>>> {
    let sink = state
        .logs
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("log persistence is disabled".into()))?;
    let query = LogQuery {
        level: query.level,
        host_id: query.host_id,
        route: query.route,
        limit: Some(query.limit.unwrap_or(100).min(MAX_LOG_LIMIT)),
    };
    let records = sink
        .query(&query)
        .map_err(|e| ApiError::Internal(format!("log query failed: {e}")))?;
    Ok(Json(records))
}
