use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn, Instrument};

use songjam_core::deployment::{DeploymentOutcome, EmpireBuilderRecord};
use songjam_core::host::is_evm_address;
use songjam_core::ids::HostId;
use songjam_core::services::{EmpireRequest, TokenConfigRequest};
use songjam_deploy::DeploymentRequest;

use super::required;
use crate::error::{stage_status, ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenConfigBody {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub creator_address: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployEmpireBody {
    #[serde(default)]
    pub token_address: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub owner_address: Option<String>,
}

/// `POST /api/empire-builder/token-config`
pub async fn token_config(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<TokenConfigBody>,
) -> ApiResult<Json<Value>> {
    let (Some(name), Some(symbol), Some(creator), Some(signature), Some(message)) = (
        required(&body.name),
        required(&body.symbol),
        required(&body.creator_address),
        required(&body.signature),
        required(&body.message),
    ) else {
        return Err(ApiError::bad_request(
            "name, symbol, creatorAddress, signature and message are required",
        ));
    };
    if !is_evm_address(creator) {
        return Err(ApiError::bad_request("creatorAddress must be a valid address"));
    }

    let request = TokenConfigRequest {
        name: name.to_string(),
        symbol: symbol.to_string(),
        creator_address: creator.to_string(),
        signature: signature.to_string(),
        message: message.to_string(),
        image_url: required(&body.image_url).map(str::to_string),
    };
    Ok(Json(state.clients.empire.request_token_config(&request).await?))
}

/// `POST /api/empire-builder/deploy-empire`
pub async fn deploy_empire(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<DeployEmpireBody>,
) -> ApiResult<Json<Value>> {
    let (Some(token_address), Some(name), Some(owner)) = (
        required(&body.token_address),
        required(&body.name),
        required(&body.owner_address),
    ) else {
        return Err(ApiError::bad_request("tokenAddress, name and ownerAddress are required"));
    };
    if !is_evm_address(token_address) || !is_evm_address(owner) {
        return Err(ApiError::bad_request("tokenAddress and ownerAddress must be valid addresses"));
    }

    let request = EmpireRequest {
        token_address: token_address.to_string(),
        name: name.to_string(),
        owner_address: owner.to_string(),
    };
    Ok(Json(state.clients.empire.request_empire(&request).await?))
}

/// `POST /api/empire-builder/deploy`: run the full deployment for a host.
///
/// The outcome body is returned for failures too, with the status chosen by
/// the stage that failed. The run continues on its own task if the client
/// goes away, so the record always reaches a final status.
pub async fn deploy(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<DeploymentRequest>,
) -> (StatusCode, Json<Value>) {
    let host_id = request.host.id().clone();
    let deployments = state.deployments.clone();
    let task = tokio::spawn(
        async move { deployments.deploy(&request.host, &request.token).await }.in_current_span(),
    );
    let outcome = match task.await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(host_id = %host_id, error = %e, "deployment task failed");
            let body = json!({"success": false, "error": format!("deployment task failed: {e}")});
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(body));
        }
    };
    let status = match &outcome {
        DeploymentOutcome::Deployed { .. } => {
            info!(host_id = %host_id, "host deployment complete");
            StatusCode::OK
        }
        DeploymentOutcome::Failed { stage, .. } => stage_status(*stage),
    };
    (status, Json(outcome.to_json()))
}

/// `GET /api/empire-builder/records/{host_id}`
pub async fn record(
    State(state): State<AppState>,
    Path(host_id): Path<String>,
) -> ApiResult<Json<EmpireBuilderRecord>> {
    let host_id = HostId::from_raw(host_id);
    state
        .records
        .get_by_host(&host_id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no deployment record for host {host_id}")))
}
