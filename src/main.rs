use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use beacon::analytics::StoreSnapshotProvider;
use beacon::api::{self, AppState};
use beacon::auth::AuthService;
use beacon::config::{Config, DatabaseBackend};
use beacon::storage::{PostgresStorage, SqliteStorage, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("beacon=info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    let storage: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.database.url);
            Arc::new(
                SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
            )
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage: {}", config.database.url);
            Arc::new(
                PostgresStorage::new(&config.database.url, config.database.max_connections)
                    .await?,
            )
        }
    };

    info!("Initializing database...");
    storage.init().await?;
    info!("Database initialized successfully");

    let snapshots = Arc::new(StoreSnapshotProvider::new(
        Arc::clone(&storage),
        config.analytics.clone(),
    ));
    let state = Arc::new(AppState::new(
        Arc::clone(&storage),
        snapshots,
        config.analytics.clone(),
    ));

    let auth_service = Arc::new(AuthService::new(config.auth.clone()));
    if auth_service.is_enabled() {
        info!("🔐 Aggregation endpoints require an API key");
    } else {
        info!("🔓 No API keys configured - aggregation endpoints are open");
    }

    let api_router = api::create_api_router(state, auth_service);

    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("🚀 API server listening on http://{}", api_addr);
    info!(
        "   - default timezone {}, top {} pages/referrers",
        config.analytics.default_timezone, config.analytics.top_n
    );

    axum::serve(listener, api_router).await?;

    Ok(())
}
