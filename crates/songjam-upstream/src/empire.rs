//! Empire Builder: signed token configs and companion contract deployment.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, instrument};

use songjam_core::deployment::{EmpireDeployment, TokenConfig};
use songjam_core::errors::UpstreamError;
use songjam_core::security::ApiKey;
use songjam_core::services::{EmpireDeployer, EmpireRequest, TokenConfigProvider, TokenConfigRequest};
use songjam_settings::credentials::EMPIRE_BUILDER_API_KEY;

use crate::http::{join_url, HttpClient};

const SERVICE: &str = "empire_builder";

#[derive(Clone)]
pub struct EmpireBuilderClient {
    http: HttpClient,
    base_url: String,
    api_key: Option<ApiKey>,
}

impl EmpireBuilderClient {
    pub fn new(http: HttpClient, base_url: impl Into<String>, api_key: Option<ApiKey>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
        }
    }

    async fn post(&self, path: &str, body: &impl serde::Serialize) -> Result<Value, UpstreamError> {
        let key = self
            .api_key
            .as_ref()
            .ok_or_else(|| UpstreamError::missing_config(SERVICE, EMPIRE_BUILDER_API_KEY))?;
        let request = self
            .http
            .post(&join_url(&self.base_url, path))
            .header("x-api-key", key.expose())
            .json(body);
        self.http.send_json(SERVICE, request).await
    }

    /// Raw `POST /token-config`, relayed as-is by the proxy route.
    #[instrument(skip(self, request), fields(symbol = %request.symbol))]
    pub async fn request_token_config(&self, request: &TokenConfigRequest) -> Result<Value, UpstreamError> {
        self.post("token-config", request).await
    }

    /// Raw `POST /deploy-empire`.
    #[instrument(skip(self, request), fields(token_address = %request.token_address))]
    pub async fn request_empire(&self, request: &EmpireRequest) -> Result<Value, UpstreamError> {
        self.post("deploy-empire", request).await
    }
}

/// Accept either a bare payload or one wrapped in `{"data": ...}`.
fn decode_payload<T: DeserializeOwned>(body: Value) -> Result<T, UpstreamError> {
    let payload = match body.get("data") {
        Some(data) if data.is_object() => data.clone(),
        _ => body,
    };
    serde_json::from_value(payload).map_err(|e| UpstreamError::Decode {
        service: SERVICE,
        detail: e.to_string(),
    })
}

#[async_trait]
impl TokenConfigProvider for EmpireBuilderClient {
    async fn token_config(&self, request: &TokenConfigRequest) -> Result<TokenConfig, UpstreamError> {
        let config: TokenConfig = decode_payload(self.request_token_config(request).await?)?;
        info!(predicted = ?config.predicted_address, "token config issued");
        Ok(config)
    }
}

#[async_trait]
impl EmpireDeployer for EmpireBuilderClient {
    async fn deploy_empire(&self, request: &EmpireRequest) -> Result<EmpireDeployment, UpstreamError> {
        let deployment: EmpireDeployment = decode_payload(self.request_empire(request).await?)?;
        info!(empire_address = %deployment.empire_address, "empire deployed");
        Ok(deployment)
    }
}
