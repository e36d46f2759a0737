//! Seams between the orchestrators and the third-party services they call.
//!
//! Production implementations live in `songjam-upstream`; tests substitute
//! the mocks from `songjam-deploy::mock`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::deployment::{DeployedToken, EmpireDeployment, TokenConfig};
use crate::errors::UpstreamError;

/// Body of an Empire Builder token-config request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenConfigRequest {
    pub name: String,
    pub symbol: String,
    pub creator_address: String,
    pub signature: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Body of an Empire Builder deploy-empire request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmpireRequest {
    pub token_address: String,
    pub name: String,
    pub owner_address: String,
}

/// A provisioned audio room.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub name: String,
    pub url: String,
}

/// Obtains a signed deployment configuration.
#[async_trait]
pub trait TokenConfigProvider: Send + Sync {
    async fn token_config(&self, request: &TokenConfigRequest) -> Result<TokenConfig, UpstreamError>;
}

/// Submits and confirms the token deployment transaction.
#[async_trait]
pub trait TokenDeployer: Send + Sync {
    async fn deploy_token(&self, config: &TokenConfig) -> Result<DeployedToken, UpstreamError>;
}

/// Registers the companion empire contract for a deployed token.
#[async_trait]
pub trait EmpireDeployer: Send + Sync {
    async fn deploy_empire(&self, request: &EmpireRequest) -> Result<EmpireDeployment, UpstreamError>;
}

/// Creates rooms for live Spaces.
#[async_trait]
pub trait RoomProvider: Send + Sync {
    async fn create_room(&self, name: Option<&str>) -> Result<Room, UpstreamError>;
}
