use clap::Parser;
use tracing_subscriber::EnvFilter;

use volunteer_admin_api::config::{self, StorageBackend};
use volunteer_admin_api::database::{AuditLog, DatabaseManager, MemoryTables, PgTables};

#[derive(Debug, Parser)]
#[command(name = "volunteer-admin-api", version, about = "Back-office data-table API")]
struct Args {
    /// Port to listen on; defaults to the configured API port
    #[arg(short, long)]
    port: Option<u16>,

    /// Row storage: postgres or memory
    #[arg(long, env = "ADMIN_STORAGE")]
    storage: Option<StorageBackend>,

    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = config::config();
    tracing::info!("Starting Volunteer Admin API in {:?} mode", config.environment);

    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set outside development");
    }

    let storage = args.storage.unwrap_or(config.storage.backend);
    let mut pool_to_close = None;
    let app = match storage {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; rows are lost on restart");
            volunteer_admin_api::app(&MemoryTables, &AuditLog::from_config(None), None)
        }
        StorageBackend::Postgres => {
            let database = match &args.database_url {
                Some(url) => DatabaseManager::connect_to(url).await?,
                None => DatabaseManager::connect().await?,
            };
            let tables = PgTables::new(database.pool().clone());
            let audit = AuditLog::from_config(Some(database.pool()));
            pool_to_close = Some(database.clone());
            volunteer_admin_api::app(&tables, &audit, Some(database))
        }
    };

    let port = args.port.unwrap_or(config.api.port);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", bind_addr, e))?;

    tracing::info!("Volunteer Admin API listening on http://{} ({:?} storage)", bind_addr, storage);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    if let Some(database) = pool_to_close {
        database.close().await;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
