use serde::{Deserialize, Serialize};

use crate::ids::{HostId, RecordId};

/// Lifecycle of a host's token + empire deployment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Pending,
    Deploying,
    Deployed,
    Failed,
}

impl DeploymentStatus {
    /// Status only moves forward; `Failed -> Deploying` is the retry edge.
    pub fn can_transition_to(self, next: DeploymentStatus) -> bool {
        use DeploymentStatus::*;
        matches!(
            (self, next),
            (Pending, Deploying)
                | (Pending, Failed)
                | (Deploying, Deployed)
                | (Deploying, Failed)
                | (Failed, Deploying)
                | (Failed, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Deployed)
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Deploying => write!(f, "deploying"),
            Self::Deployed => write!(f, "deployed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for DeploymentStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "deploying" => Ok(Self::Deploying),
            "deployed" => Ok(Self::Deployed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown deployment status: {other}")),
        }
    }
}

/// Per-host bookkeeping for the deployment flow. At most one per host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmpireBuilderRecord {
    pub id: RecordId,
    pub host_id: HostId,
    pub token_name: String,
    pub token_symbol: String,
    pub token_image: Option<String>,
    pub status: DeploymentStatus,
    pub token_address: Option<String>,
    pub empire_address: Option<String>,
    pub tx_hash: Option<String>,
    pub last_error: Option<String>,
    pub attempts: u32,
    pub created_at: String,
    pub updated_at: String,
}

/// Signed deployment configuration issued by Empire Builder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenConfig {
    /// Pre-signed raw transaction that deploys the token.
    pub signed_transaction: String,
    /// Address the token will land at, when the builder can predict it.
    #[serde(default)]
    pub predicted_address: Option<String>,
    /// Everything else the builder returned, kept for the record.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Confirmed on-chain token deployment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployedToken {
    pub token_address: String,
    pub tx_hash: String,
}

/// Companion contract registered by Empire Builder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmpireDeployment {
    pub empire_address: String,
    #[serde(default)]
    pub tx_hash: Option<String>,
}

/// Step of the deployment flow that produced a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStage {
    Validation,
    Record,
    TokenConfig,
    ChainDeploy,
    EmpireDeploy,
}

/// Result of one orchestrator run. Failures are values, never panics or `Err`s.
#[derive(Clone, Debug, PartialEq)]
pub enum DeploymentOutcome {
    Deployed {
        token_address: String,
        empire_address: String,
        tx_hash: Option<String>,
    },
    Failed {
        stage: DeploymentStage,
        message: String,
    },
}

impl DeploymentOutcome {
    pub fn failed(stage: DeploymentStage, message: impl Into<String>) -> Self {
        Self::Failed {
            stage,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Deployed { .. })
    }

    /// `{success, ...}` body returned to callers.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Deployed {
                token_address,
                empire_address,
                tx_hash,
            } => serde_json::json!({
                "success": true,
                "tokenAddress": token_address,
                "empireAddress": empire_address,
                "txHash": tx_hash,
            }),
            Self::Failed { stage, message } => serde_json::json!({
                "success": false,
                "stage": stage,
                "error": message,
            }),
        }
    }
}
