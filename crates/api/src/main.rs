//! InnerOS API server entrypoint

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use inneros_api::{routes, AppState, Config};
use inneros_billing::GatewayClient;
use inneros_shared::db;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in development; production sets real environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!(bind_address = %config.bind_address, "Starting InnerOS API");

    if config.webhook_secret.is_none() {
        tracing::warn!("WEBHOOK_SECRET not set; all webhook deliveries will be refused");
    }

    // Migrations run on a dedicated single-connection pool
    let migration_pool = db::create_migration_pool(&config.database_url).await?;
    db::run_migrations(&migration_pool).await?;
    migration_pool.close().await;
    tracing::info!("Database migrations applied");

    let pool = db::create_pool(&config.database_url).await?;
    let gateway = GatewayClient::from_env()?;

    let state = AppState::new(pool, config, gateway)?;
    let bind_address = state.config.bind_address.clone();
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %bind_address, "Listening");
    axum::serve(listener, app).await?;

    Ok(())
}
