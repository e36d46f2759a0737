use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use songjam_deploy::{DeploymentOrchestrator, RecordStore};
use songjam_settings::{Credentials, ServerSettings};
use songjam_space::SpaceManager;
use songjam_telemetry::{MetricsRecorder, SqliteLogSink};
use songjam_upstream::UpstreamClients;

use crate::routes;

pub const REQUESTS_METRIC: &str = "proxy_requests_total";
pub const REQUEST_LATENCY_METRIC: &str = "request_latency_ms";

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub clients: UpstreamClients,
    pub deployments: Arc<DeploymentOrchestrator>,
    pub records: Arc<dyn RecordStore>,
    pub spaces: Arc<SpaceManager>,
    pub metrics: Arc<MetricsRecorder>,
    /// Persisted warn+ logs; `None` when SQLite logging is off.
    pub logs: Option<Arc<SqliteLogSink>>,
    pub credentials: Arc<Credentials>,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let api = Router::new()
        .route("/hms/token", post(routes::hms::issue_token))
        .route("/daily/rooms", post(routes::daily::create_room))
        .route("/stream/token", post(routes::stream::issue_token))
        .route("/empire-builder/token-config", post(routes::empire::token_config))
        .route("/empire-builder/deploy-empire", post(routes::empire::deploy_empire))
        .route("/empire-builder/deploy", post(routes::empire::deploy))
        .route("/empire-builder/records/{host_id}", get(routes::empire::record))
        .route("/neynar/cast", post(routes::neynar::cast))
        .route("/neynar/like", post(routes::neynar::like))
        .route("/neynar/recast", post(routes::neynar::recast))
        .route("/neynar/follow", post(routes::neynar::follow))
        .route("/neynar/user", get(routes::neynar::user))
        .route("/neynar/users/bulk", post(routes::neynar::users_bulk))
        .route("/neynar/best-friends", get(routes::neynar::best_friends))
        .route("/spaces", post(routes::spaces::start))
        .route("/spaces/{id}", get(routes::spaces::get).delete(routes::spaces::end))
        .route("/logs", get(routes::health::logs))
        .layer(TimeoutLayer::new(request_timeout));

    // event streams stay open for the life of a Space
    let streams = Router::new().route("/spaces/{id}/events", get(routes::spaces::events));

    Router::new()
        .nest("/api", api.merge(streams))
        .route("/health", get(routes::health::health))
        .route("/metrics", get(routes::health::metrics))
        .route_layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind and serve. Returns a handle to shut it down.
pub async fn start(settings: &ServerSettings, state: AppState) -> Result<ServerHandle, std::io::Error> {
    let router = build_router(state, Duration::from_millis(settings.request_timeout_ms));
    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(host = %settings.host, port = local_addr.port(), "songjam server started");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "server exited with error");
        }
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        shutdown_tx,
        server,
    })
}

/// Handle returned by `start()`.
pub struct ServerHandle {
    pub port: u16,
    shutdown_tx: oneshot::Sender<()>,
    server: JoinHandle<()>,
}

impl ServerHandle {
    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.server.await {
            tracing::warn!(error = %e, "server task did not finish cleanly");
        }
    }
}

/// Count every matched request by route template and status.
async fn track_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    state
        .metrics
        .counter_inc(REQUESTS_METRIC, &[("route", route.as_str()), ("status", status.as_str())], 1);
    state.metrics.histogram_observe(
        REQUEST_LATENCY_METRIC,
        &[("route", route.as_str())],
        started.elapsed().as_secs_f64() * 1000.0,
    );
    response
}
