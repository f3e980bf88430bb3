//! Seva Records - citizen services backend

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seva_records::{config::Args, db::resolve_engines, server, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize tracing/logging
    let json_logs = args.json_logs();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("seva_records={},info", args.log_level).into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer()))
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Seva Records");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Data dir: {}", args.data_dir.display());
    info!(
        "MongoDB: {}",
        if args.use_mongodb { args.mongodb_uri.as_str() } else { "disabled" }
    );
    info!(
        "Firestore: {}",
        if args.use_firestore {
            args.firestore_project_id.as_deref().unwrap_or("unset")
        } else {
            "disabled"
        }
    );
    info!("SQLite: {}", if args.use_sqlite { "enabled" } else { "disabled" });
    info!("======================================");

    // Engines are connected once here; the chain is fixed for the life of the process
    let store = Arc::new(resolve_engines(&args.store_config()).await?);

    let state = Arc::new(AppState::new(args, store));
    server::run(state).await?;

    Ok(())
}
