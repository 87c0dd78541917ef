use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// Medrunner logistics portal: equipment catalog, My Orders and staff console
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Override HTTP_PORT
    #[arg(long, short = 'p')]
    port: Option<u16>,

    /// Use the in-process sheet for inventory, orders and threads even when
    /// APPS_SCRIPT_URL is set
    #[arg(long)]
    local_sheet: bool,

    /// JSON seed for the local sheet when no saved sheet exists yet
    #[arg(long)]
    seed: Option<PathBuf>,
}

mod auth;
mod backend;
mod config;
mod error;
mod format;
mod models;
mod sheet;
mod storage;
mod views;
mod web;

use backend::{HttpBotClient, HttpSheetClient, SharedBotBackend, SharedSheetBackend};
use config::{PortalConfig, SheetSource};
use sheet::{LocalSheet, SheetData};
use storage::{create_shared_client_storage, ClientStorage};
use web::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::INFO)
        .init();

    let mut config = PortalConfig::from_env();
    if let Some(port) = args.port {
        config.http_port = port;
    }
    if args.local_sheet {
        config.sheet = SheetSource::Local;
    }

    info!(
        "Staff console roles: {}",
        config.logistics_roles.names().join(", ")
    );

    // Ensure state directory exists
    tokio::fs::create_dir_all(&config.state_path).await?;

    let (sheet, bot): (SharedSheetBackend, SharedBotBackend) = match &config.sheet {
        SheetSource::Remote { url } => {
            info!("Using sheet function at {}", url);
            (
                Arc::new(HttpSheetClient::new(url.clone())),
                Arc::new(HttpBotClient::new(config.bot_api_url.clone())),
            )
        }
        SheetSource::Local => {
            let seed = match &args.seed {
                Some(path) => LocalSheet::read_seed(path).await?,
                None => SheetData::sample(),
            };
            let path = config.local_sheet_file();
            info!("Using local sheet at {}", path.display());
            let local = Arc::new(LocalSheet::load(&path, seed).await?);
            if let Err(e) = local.save().await {
                warn!("Could not write local sheet: {}", e);
            }
            (local.clone(), local)
        }
    };

    info!("Loading client storage...");
    let storage = ClientStorage::load(config.client_storage_file()).await?;
    info!("Client storage holds {} sessions", storage.sessions.len());
    let storage = create_shared_client_storage(storage);

    let state = AppState::new(config, sheet, bot, storage);

    let mut auth_events = state.auth.subscribe();
    tokio::spawn(async move {
        loop {
            match auth_events.recv().await {
                Ok(event) => debug!("Auth event: {:?}", event),
                Err(RecvError::Lagged(skipped)) => warn!("Auth event log skipped {} events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    info!("Starting Medrunner portal...");
    web::start_web_server(state).await
}
