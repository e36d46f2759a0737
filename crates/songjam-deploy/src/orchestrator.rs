use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use songjam_core::deployment::{DeploymentOutcome, DeploymentStage, DeploymentStatus, EmpireBuilderRecord};
use songjam_core::host::{is_evm_address, non_empty, HostInfo, TokenSpec};
use songjam_core::ids::HostId;
use songjam_core::services::{
    EmpireDeployer, EmpireRequest, TokenConfigProvider, TokenConfigRequest, TokenDeployer,
};

use crate::store::RecordStore;

/// Body of a deployment request: who is deploying and what.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRequest {
    pub host: HostInfo,
    pub token: TokenSpec,
}

/// Runs token config → chain deploy → empire deploy for one host.
///
/// Never returns `Err`: every failure is recorded on the host's record
/// (best-effort) and reported as [`DeploymentOutcome::Failed`]. There are
/// no retries inside a run; calling [`deploy`](Self::deploy) again after a
/// failure resumes from the first incomplete step.
///
/// A record left in `deploying` longer than the lease (a crashed process)
/// is failed and retried by the next call.
pub struct DeploymentOrchestrator {
    store: Arc<dyn RecordStore>,
    configs: Arc<dyn TokenConfigProvider>,
    deployer: Arc<dyn TokenDeployer>,
    empire: Arc<dyn EmpireDeployer>,
    lease: Duration,
}

/// Longer than a full run: receipt polling plus the upstream timeouts.
pub const DEFAULT_DEPLOY_LEASE: Duration = Duration::from_secs(600);

struct Addresses<'a> {
    creator: &'a str,
    owner: &'a str,
}

impl DeploymentOrchestrator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        configs: Arc<dyn TokenConfigProvider>,
        deployer: Arc<dyn TokenDeployer>,
        empire: Arc<dyn EmpireDeployer>,
    ) -> Self {
        Self {
            store,
            configs,
            deployer,
            empire,
            lease: DEFAULT_DEPLOY_LEASE,
        }
    }

    /// How long a `deploying` record is trusted before it counts as abandoned.
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// Current record for a host, if one exists.
    pub fn record(&self, host_id: &HostId) -> Option<EmpireBuilderRecord> {
        match self.store.get_by_host(host_id) {
            Ok(record) => record,
            Err(e) => {
                warn!(host_id = %host_id, error = %e, "record lookup failed");
                None
            }
        }
    }

    #[instrument(skip_all, fields(host_id = %host.id(), symbol = %token.symbol))]
    pub async fn deploy(&self, host: &HostInfo, token: &TokenSpec) -> DeploymentOutcome {
        let host_id = host.id();

        if non_empty(Some(token.name.as_str())).is_none() || non_empty(Some(token.symbol.as_str())).is_none() {
            return DeploymentOutcome::failed(DeploymentStage::Validation, "token name and symbol are required");
        }

        let record = match self.store.get_or_create(host_id, token) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "could not load deployment record");
                return DeploymentOutcome::failed(DeploymentStage::Record, e.to_string());
            }
        };

        match record.status {
            DeploymentStatus::Deployed => return Self::already_deployed(&record),
            DeploymentStatus::Deploying if !self.lease_expired(&record.updated_at) => {
                return DeploymentOutcome::failed(DeploymentStage::Record, "deployment already in progress");
            }
            DeploymentStatus::Deploying => {
                warn!(updated_at = %record.updated_at, "deployment lease expired, failing stale run");
                if let Err(e) = self.store.mark_failed(host_id, "deployment lease expired") {
                    return DeploymentOutcome::failed(DeploymentStage::Record, e.to_string());
                }
            }
            DeploymentStatus::Pending | DeploymentStatus::Failed => {}
        }

        let addresses = match Self::validate_addresses(host) {
            Ok(addresses) => addresses,
            Err(message) => return self.fail(host_id, DeploymentStage::Validation, message),
        };

        // a token from an earlier attempt means only the empire step is left
        let resume_from = record.token_address.clone().zip(record.tx_hash.clone());
        let signed = non_empty(host.signature.as_deref()).is_some() && non_empty(host.message.as_deref()).is_some();
        if resume_from.is_none() && !signed {
            return self.fail(host_id, DeploymentStage::Validation, "signature and message are required");
        }

        if let Err(e) = self.store.transition(host_id, DeploymentStatus::Deploying) {
            warn!(error = %e, "could not mark record deploying");
            return DeploymentOutcome::failed(DeploymentStage::Record, e.to_string());
        }

        let mut guard = InterruptGuard {
            store: self.store.as_ref(),
            host_id,
            armed: true,
        };
        let outcome = self.run(host, token, &addresses, resume_from).await;
        guard.armed = false;
        outcome
    }

    /// The network half of a deployment. Every exit leaves the record
    /// `deployed` or `failed`.
    async fn run(
        &self,
        host: &HostInfo,
        token: &TokenSpec,
        addresses: &Addresses<'_>,
        resume_from: Option<(String, String)>,
    ) -> DeploymentOutcome {
        let host_id = host.id();
        let (token_address, tx_hash) = match resume_from {
            Some((address, hash)) => {
                info!(token_address = %address, "resuming at empire step");
                (address, hash)
            }
            None => match self.deploy_token(host, token, addresses).await {
                Ok(deployed) => deployed,
                Err(outcome) => return outcome,
            },
        };

        let request = EmpireRequest {
            token_address: token_address.clone(),
            name: token.name.clone(),
            owner_address: addresses.owner.to_string(),
        };
        let empire = match self.empire.deploy_empire(&request).await {
            Ok(empire) => empire,
            Err(e) => return self.fail(host_id, DeploymentStage::EmpireDeploy, e),
        };

        if let Err(e) = self.store.mark_deployed(host_id, &empire.empire_address) {
            warn!(error = %e, "could not persist deployed status");
        }
        info!(%token_address, empire_address = %empire.empire_address, "deployment complete");

        DeploymentOutcome::Deployed {
            token_address,
            empire_address: empire.empire_address,
            tx_hash: Some(tx_hash),
        }
    }

    fn lease_expired(&self, updated_at: &str) -> bool {
        match DateTime::parse_from_rfc3339(updated_at) {
            Ok(updated) => (Utc::now() - updated.with_timezone(&Utc))
                .to_std()
                .is_ok_and(|elapsed| elapsed >= self.lease),
            Err(_) => true,
        }
    }

    async fn deploy_token(
        &self,
        host: &HostInfo,
        token: &TokenSpec,
        addresses: &Addresses<'_>,
    ) -> Result<(String, String), DeploymentOutcome> {
        let host_id = host.id();
        let request = TokenConfigRequest {
            name: token.name.clone(),
            symbol: token.symbol.clone(),
            creator_address: addresses.creator.to_string(),
            signature: host.signature.clone().unwrap_or_default(),
            message: host.message.clone().unwrap_or_default(),
            image_url: token.image_url.clone(),
        };

        let config = self
            .configs
            .token_config(&request)
            .await
            .map_err(|e| self.fail(host_id, DeploymentStage::TokenConfig, e))?;

        let deployed = self
            .deployer
            .deploy_token(&config)
            .await
            .map_err(|e| self.fail(host_id, DeploymentStage::ChainDeploy, e))?;

        // token is on chain; a failed write here is logged and the run continues
        if let Err(e) = self.store.record_token(host_id, &deployed.token_address, &deployed.tx_hash) {
            warn!(error = %e, "could not persist token address");
        }
        info!(token_address = %deployed.token_address, tx_hash = %deployed.tx_hash, "token deployed");
        Ok((deployed.token_address, deployed.tx_hash))
    }

    fn validate_addresses(host: &HostInfo) -> Result<Addresses<'_>, String> {
        let check = |field: &str, value: Option<&String>| -> Result<(), String> {
            match non_empty(value.map(String::as_str)) {
                None => Err(format!("{field} is required")),
                Some(v) if !is_evm_address(v) => Err(format!("{field} is not a valid address")),
                Some(_) => Ok(()),
            }
        };
        check("creatorAddress", host.creator_address.as_ref())?;
        check("ownerAddress", host.owner_address.as_ref())?;
        Ok(Addresses {
            creator: host.creator_address.as_deref().map(str::trim).unwrap_or_default(),
            owner: host.owner_address.as_deref().map(str::trim).unwrap_or_default(),
        })
    }

    fn already_deployed(record: &EmpireBuilderRecord) -> DeploymentOutcome {
        match (&record.token_address, &record.empire_address) {
            (Some(token_address), Some(empire_address)) => {
                info!("host already deployed");
                DeploymentOutcome::Deployed {
                    token_address: token_address.clone(),
                    empire_address: empire_address.clone(),
                    tx_hash: record.tx_hash.clone(),
                }
            }
            _ => DeploymentOutcome::failed(DeploymentStage::Record, "deployed record is missing addresses"),
        }
    }

    /// Record the failure (best-effort) and build the outcome.
    fn fail(&self, host_id: &HostId, stage: DeploymentStage, error: impl Display) -> DeploymentOutcome {
        let message = error.to_string();
        warn!(?stage, error = %message, "deployment failed");
        if let Err(e) = self.store.mark_failed(host_id, &message) {
            warn!(error = %e, "could not persist failure");
        }
        DeploymentOutcome::failed(stage, message)
    }
}

/// Fails the record when a run is dropped mid-flight.
struct InterruptGuard<'a> {
    store: &'a dyn RecordStore,
    host_id: &'a HostId,
    armed: bool,
}

impl Drop for InterruptGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!(host_id = %self.host_id, "deployment dropped before finishing");
        if let Err(e) = self.store.mark_failed(self.host_id, "deployment interrupted") {
            warn!(error = %e, "could not persist interrupted deployment");
        }
    }
}
