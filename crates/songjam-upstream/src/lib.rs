//! HTTP clients for every third party the service talks to, plus local
//! JWT issuance for the SDKs that accept self-signed tokens.

#![deny(unsafe_code)]

pub mod chain;
pub mod daily;
pub mod empire;
pub mod hms;
pub mod http;
pub mod neynar;
pub mod stream;

use std::sync::Arc;

use songjam_core::errors::UpstreamError;
use songjam_settings::{Credentials, ServiceSettings};
use songjam_telemetry::MetricsRecorder;

pub use chain::RpcTokenDeployer;
pub use daily::{DailyClient, DailyRoomRequest};
pub use empire::EmpireBuilderClient;
pub use hms::{HmsClient, HmsToken};
pub use http::HttpClient;
pub use neynar::{distribute, Allocation, BestFriend, CastRequest, NeynarClient, ReactionType};
pub use stream::{StreamToken, StreamTokenIssuer};

/// Every upstream client, sharing one connection pool.
#[derive(Clone)]
pub struct UpstreamClients {
    pub hms: HmsClient,
    pub daily: Arc<DailyClient>,
    pub stream: StreamTokenIssuer,
    pub empire: Arc<EmpireBuilderClient>,
    pub neynar: NeynarClient,
    pub chain: Arc<RpcTokenDeployer>,
}

impl UpstreamClients {
    pub fn from_settings(
        services: &ServiceSettings,
        credentials: &Credentials,
        metrics: Option<Arc<MetricsRecorder>>,
    ) -> Result<Self, UpstreamError> {
        let mut http = HttpClient::new(services.upstream_timeout())?;
        if let Some(metrics) = metrics {
            http = http.with_metrics(metrics);
        }

        Ok(Self {
            hms: HmsClient::new(
                http.clone(),
                &services.hms_base_url,
                credentials.hms(),
                services.hms_template_id.clone(),
            ),
            daily: Arc::new(DailyClient::new(
                http.clone(),
                &services.daily_base_url,
                credentials.daily_api_key.clone(),
            )),
            stream: StreamTokenIssuer::new(credentials.stream()),
            empire: Arc::new(EmpireBuilderClient::new(
                http.clone(),
                &services.empire_builder_base_url,
                credentials.empire_builder_api_key.clone(),
            )),
            neynar: NeynarClient::new(
                http.clone(),
                &services.neynar_base_url,
                credentials.neynar_api_key.clone(),
            ),
            chain: Arc::new(RpcTokenDeployer::new(
                http,
                &services.chain_rpc_url,
                services.receipt_poll_interval(),
                services.receipt_max_polls,
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_from_default_settings_without_credentials() {
        let clients = UpstreamClients::from_settings(
            &ServiceSettings::default(),
            &Credentials::default(),
            None,
        )
        .unwrap();
        assert!(clients.stream.user_token("u", None).is_err());
    }
}
