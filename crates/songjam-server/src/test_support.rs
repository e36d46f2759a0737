use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;
use wiremock::MockServer;

use songjam_deploy::mock::{
    MockEmpireDeployer, MockRecordStore, MockRoomProvider, MockTokenConfigProvider, MockTokenDeployer,
};
use songjam_deploy::{DeploymentOrchestrator, RecordStore};
use songjam_settings::{Credentials, ServiceSettings, SpaceSettings};
use songjam_space::SpaceManager;
use songjam_telemetry::{MetricsRecorder, SqliteLogSink};
use songjam_upstream::UpstreamClients;

use crate::server::{build_router, AppState};

/// Router wired to one wiremock server standing in for every upstream,
/// with mock deployment collaborators.
pub struct TestApp {
    pub upstream: MockServer,
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_credentials(Credentials::from_lookup(|name| Some(format!("test-{}", name.to_lowercase())))).await
    }

    pub async fn without_credentials() -> Self {
        Self::with_credentials(Credentials::default()).await
    }

    async fn with_credentials(credentials: Credentials) -> Self {
        let upstream = MockServer::start().await;
        let base = upstream.uri();
        let services = ServiceSettings {
            hms_base_url: format!("{base}/hms"),
            daily_base_url: format!("{base}/daily"),
            empire_builder_base_url: format!("{base}/empire"),
            neynar_base_url: format!("{base}/neynar"),
            chain_rpc_url: format!("{base}/rpc"),
            upstream_timeout_ms: 5_000,
            ..ServiceSettings::default()
        };
        let metrics = Arc::new(MetricsRecorder::default());
        let clients = UpstreamClients::from_settings(&services, &credentials, Some(metrics.clone()))
            .expect("clients");

        let records: Arc<dyn RecordStore> = Arc::new(MockRecordStore::new().expect("store"));
        let deployments = Arc::new(DeploymentOrchestrator::new(
            records.clone(),
            Arc::new(MockTokenConfigProvider::ok()),
            Arc::new(MockTokenDeployer::ok()),
            Arc::new(MockEmpireDeployer::ok()),
        ));
        let spaces = Arc::new(SpaceManager::new(
            deployments.clone(),
            Arc::new(MockRoomProvider::ok()),
            SpaceSettings::default(),
        ));

        Self {
            upstream,
            state: AppState {
                clients,
                deployments,
                records,
                spaces,
                metrics,
                logs: Some(Arc::new(SqliteLogSink::in_memory().expect("log sink"))),
                credentials: Arc::new(credentials),
            },
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone(), Duration::from_secs(10))
    }
}

/// Send one request through the router and decode the JSON reply.
pub async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, json)
}
