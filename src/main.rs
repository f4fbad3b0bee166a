use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tourbook_api::config::config;
use tourbook_api::database::{DatabaseManager, DocumentStore, MemoryStore, PgStore};
use tourbook_api::services::LogMailer;
use tourbook_api::{app, AppState};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StoreKind {
    /// Volatile, for demos and local work
    Memory,
    /// Postgres at DATABASE_URL
    Postgres,
}

#[derive(Parser)]
#[command(name = "tourbook-api")]
#[command(about = "Tour booking API server")]
#[command(version)]
struct Cli {
    #[arg(long, help = "Port to listen on (default: API_PORT / PORT / config)")]
    port: Option<u16>,

    #[arg(long, value_enum, default_value_t = StoreKind::Postgres, help = "Document store backend")]
    store: StoreKind,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so DATABASE_URL and JWT_SECRET are picked up
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = config().clone();

    let default_filter = if config.api.enable_request_logging {
        "info,tower_http=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    info!("Starting Tourbook API in {:?} mode", config.environment);

    if config.jwt_secret_is_missing() {
        anyhow::bail!("JWT_SECRET is not set; refusing to start");
    }

    let store: Arc<dyn DocumentStore> = match cli.store {
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::Postgres => {
            let pool = DatabaseManager::connect(&config.database)
                .await
                .context("failed to connect to Postgres")?;
            Arc::new(PgStore::new(pool).with_query_logging(config.database.enable_query_logging))
        }
    };

    let port = cli.port.unwrap_or(config.api.port);
    let state = AppState::new(config, store, Arc::new(LogMailer))
        .await
        .context("failed to initialise application state")?;

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("Tourbook API listening on http://{}", bind_addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
