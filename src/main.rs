//! user-gateway server entry point.
//!
//! Wires the broker, the user store, the command server, the WebSocket hub
//! and the Axum HTTP server, then serves until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use user_gateway::api;
use user_gateway::app_state::AppState;
use user_gateway::broker::{Broker, MemoryBroker};
use user_gateway::client::UserClient;
use user_gateway::config::{GatewayConfig, LogFormat};
use user_gateway::hub::{Hub, forward_events};
use user_gateway::service::CommandServer;
use user_gateway::store::{MemoryUserStore, PostgresUserStore, UserStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env().context("invalid LISTEN_ADDR")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting user-gateway");

    let broker: Arc<dyn Broker> = Arc::new(MemoryBroker::new(config.broker_channel_capacity));
    let store = open_store(&config).await?;

    // Command side
    let server = CommandServer::new(store, Arc::clone(&broker))
        .start()
        .await
        .context("failed to subscribe command channels")?;

    // Event fan-out
    let hub = Arc::new(Hub::with_write_timeout(config.ws_write_timeout()));
    let forwarder = forward_events(broker.as_ref(), Arc::clone(&hub))
        .await
        .context("failed to subscribe event channels")?;

    let app_state = AppState {
        users: UserClient::new(Arc::clone(&broker), config.command_timeout()),
        hub: Arc::clone(&hub),
    };
    let app = api::build_app(app_state, config.http_request_timeout());

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain in reverse order of startup
    forwarder.shutdown();
    server.shutdown();
    hub.close_all().await;
    broker.close().await;
    tracing::info!("shutdown complete");

    Ok(())
}

async fn open_store(config: &GatewayConfig) -> anyhow::Result<Arc<dyn UserStore>> {
    if !config.persistence_enabled {
        tracing::info!("persistence disabled, using in-memory store");
        return Ok(Arc::new(MemoryUserStore::new()));
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    let store = PostgresUserStore::new(pool);
    store.migrate().await.context("failed to run migrations")?;
    tracing::info!("connected to PostgreSQL");
    Ok(Arc::new(store))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
