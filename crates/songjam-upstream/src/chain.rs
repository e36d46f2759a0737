//! On-chain token deployment over plain JSON-RPC.
//!
//! The token config already carries a signed transaction, so deployment is
//! `eth_sendRawTransaction` followed by receipt polling.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use songjam_core::deployment::{DeployedToken, TokenConfig};
use songjam_core::errors::UpstreamError;
use songjam_core::services::TokenDeployer;

use crate::http::HttpClient;

const SERVICE: &str = "chain";
/// Status reported for JSON-RPC level errors and reverted transactions.
const RPC_FAILURE_STATUS: u16 = 502;

pub struct RpcTokenDeployer {
    http: HttpClient,
    rpc_url: String,
    poll_interval: Duration,
    max_polls: u32,
    next_id: AtomicU64,
}

impl RpcTokenDeployer {
    pub fn new(http: HttpClient, rpc_url: impl Into<String>, poll_interval: Duration, max_polls: u32) -> Self {
        Self {
            http,
            rpc_url: rpc_url.into(),
            poll_interval,
            max_polls,
            next_id: AtomicU64::new(1),
        }
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, UpstreamError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = self.http.post(&self.rpc_url).json(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        }));
        let mut body = self.http.send_json(SERVICE, request).await?;

        if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
            warn!(method, %error, "rpc error");
            return Err(UpstreamError::from_status(
                SERVICE,
                RPC_FAILURE_STATUS,
                error.to_string(),
            ));
        }
        Ok(body.get_mut("result").map(Value::take).unwrap_or(Value::Null))
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<Value, UpstreamError> {
        for attempt in 1..=self.max_polls {
            let receipt = self.rpc("eth_getTransactionReceipt", json!([tx_hash])).await?;
            if !receipt.is_null() {
                return Ok(receipt);
            }
            debug!(tx_hash, attempt, "receipt pending");
            tokio::time::sleep(self.poll_interval).await;
        }
        Err(UpstreamError::Timeout(self.poll_interval * self.max_polls))
    }
}

#[async_trait]
impl TokenDeployer for RpcTokenDeployer {
    #[instrument(skip(self, config))]
    async fn deploy_token(&self, config: &TokenConfig) -> Result<DeployedToken, UpstreamError> {
        if config.signed_transaction.trim().is_empty() {
            return Err(UpstreamError::InvalidRequest(
                "token config has no signed transaction".into(),
            ));
        }

        let tx_hash = self
            .rpc("eth_sendRawTransaction", json!([config.signed_transaction]))
            .await?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| UpstreamError::Decode {
                service: SERVICE,
                detail: "eth_sendRawTransaction returned no hash".into(),
            })?;
        info!(%tx_hash, "deployment transaction submitted");

        let receipt = self.wait_for_receipt(&tx_hash).await?;
        if receipt["status"].as_str() == Some("0x0") {
            return Err(UpstreamError::from_status(
                SERVICE,
                RPC_FAILURE_STATUS,
                format!("transaction {tx_hash} reverted"),
            ));
        }

        let token_address = config
            .predicted_address
            .clone()
            .or_else(|| receipt["contractAddress"].as_str().map(str::to_string))
            .ok_or_else(|| UpstreamError::Decode {
                service: SERVICE,
                detail: "no token address in config or receipt".into(),
            })?;

        info!(%tx_hash, %token_address, "token deployed");
        Ok(DeployedToken { token_address, tx_hash })
    }
}
