mod api;
mod auth;
mod config;
mod dashboard;
mod export;
mod models;
mod storage;
mod upstream;

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use auth::AuthService;
use config::{AuthMode, Config, DatabaseBackend};
use dashboard::DashboardService;
use storage::{PostgresStorage, ProfileStore, SqliteStorage};
use upstream::{AnalyticsApi, ReportFetcher};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    let storage: Arc<dyn ProfileStore> = match config.database.backend {
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

    // Initialize auth service
    let auth_service = Arc::new(AuthService::new(config.auth.clone()).await?);
    match config.auth.mode {
        AuthMode::None => {
            info!("🔓 Authentication is disabled - all requests belong to the local user");
        }
        AuthMode::Oauth => {
            if let Some(oauth) = config.auth.oauth.as_ref() {
                info!(
                    "🔐 OAuth authentication enabled (issuer: {}, audience: {})",
                    oauth.issuer_url, oauth.audience
                );
            } else {
                info!("🔐 OAuth authentication enabled");
            }
        }
    }

    // Upstream analytics client
    if config.upstream.api_token.is_empty() {
        warn!("ANALYTICS_API_TOKEN is not set - upstream requests will be rejected");
    }
    if let Some(team_id) = config.upstream.team_id.as_ref() {
        info!("📈 Upstream analytics scoped to team {team_id}");
    }
    let fetcher: Arc<dyn ReportFetcher> = Arc::new(AnalyticsApi::new(config.upstream.clone())?);
    let dashboard_service = Arc::new(DashboardService::new(Arc::clone(&fetcher)));

    // Create router
    let router = api::create_api_router(
        Arc::clone(&storage),
        fetcher,
        dashboard_service,
        auth_service,
        config.frontend.clone(),
    );

    if let Some(ref static_dir) = config.frontend.static_dir {
        info!("🎨 Serving frontend from directory: {}", static_dir);
    }

    // Start API server
    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("🚀 API server listening on http://{}", api_addr);
    info!("   - API endpoints available at http://{}/api/...", api_addr);

    axum::serve(api_listener, router).await?;

    Ok(())
}
