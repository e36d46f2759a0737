use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use songjam_core::services::{EmpireDeployer, RoomProvider, TokenConfigProvider, TokenDeployer};
use songjam_deploy::{DeploymentOrchestrator, RecordStore};
use songjam_server::AppState;
use songjam_settings::{load_settings_from_path, settings_path, Credentials, SongjamSettings};
use songjam_space::SpaceManager;
use songjam_store::{Database, EmpireRecordRepo};
use songjam_telemetry::{init_telemetry, TelemetryConfig};
use songjam_upstream::UpstreamClients;

#[derive(Parser)]
#[command(name = "songjam", version, about = "Songjam proxy, deployment and Space server")]
struct Cli {
    /// Settings file (defaults to ~/.songjam/settings.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve {
        #[arg(long)]
        port: Option<u16>,
        /// SQLite database path
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Print the resolved settings and which credentials are present
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let path = cli.config.unwrap_or_else(settings_path);
    let mut settings = load_settings_from_path(&path)
        .with_context(|| format!("loading settings from {}", path.display()))?;
    let credentials = Credentials::from_env();

    match cli.command {
        Command::CheckConfig => check_config(&settings, &credentials),
        Command::Serve { port, db } => {
            if let Some(port) = port {
                settings.server.port = port;
            }
            if let Some(db) = db {
                settings.database.path = db.to_string_lossy().into_owned();
            }
            serve(settings, credentials).await
        }
    }
}

async fn serve(settings: SongjamSettings, credentials: Credentials) -> anyhow::Result<()> {
    let telemetry = init_telemetry(TelemetryConfig::from_parts(
        &settings.telemetry.log_level,
        settings.telemetry.log_to_sqlite,
        &settings.telemetry.log_db_path,
    ));
    tracing::info!("starting songjam");

    let configured = credentials.configured_services();
    tracing::info!(services = ?configured, "credentials loaded");

    let db = Database::open(&PathBuf::from(&settings.database.path)).context("opening database")?;
    let records: Arc<dyn RecordStore> = Arc::new(EmpireRecordRepo::new(db));

    let metrics = telemetry.metrics();
    let clients = UpstreamClients::from_settings(&settings.services, &credentials, Some(metrics.clone()))
        .context("building upstream clients")?;

    let token_configs: Arc<dyn TokenConfigProvider> = clients.empire.clone();
    let chain: Arc<dyn TokenDeployer> = clients.chain.clone();
    let empires: Arc<dyn EmpireDeployer> = clients.empire.clone();
    let deployments = Arc::new(DeploymentOrchestrator::new(records.clone(), token_configs, chain, empires));

    let rooms: Arc<dyn RoomProvider> = clients.daily.clone();
    let spaces = Arc::new(SpaceManager::new(deployments.clone(), rooms, settings.space.clone()));

    let state = AppState {
        clients,
        deployments,
        records,
        spaces: spaces.clone(),
        metrics,
        logs: telemetry.logs(),
        credentials: Arc::new(credentials),
    };
    let handle = songjam_server::start(&settings.server, state)
        .await
        .context("starting server")?;
    tracing::info!(port = handle.port, "songjam ready");

    tokio::signal::ctrl_c().await.context("listening for ctrl+c")?;
    tracing::info!("shutting down");

    let ended = spaces.end_all();
    if ended > 0 {
        tracing::info!(count = ended, "ended active spaces");
    }
    handle.shutdown().await;
    Ok(())
}

fn check_config(settings: &SongjamSettings, credentials: &Credentials) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(settings)?);

    let configured = credentials.configured_services();
    for service in ["hms", "daily", "stream", "empire_builder", "neynar"] {
        let state = if configured.contains(&service) { "configured" } else { "missing" };
        println!("{service:<16} {state}");
    }
    Ok(())
}
