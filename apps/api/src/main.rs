mod config;
mod db;
mod engine;
mod errors;
mod models;
mod payments;
mod routes;
mod seal;
mod state;
mod store;
mod verify;

#[cfg(test)]
mod test_support;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::payments::build_provider;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{ArtifactStore, MemoryArtifactStore, PgArtifactStore};

/// `DATABASE_URL` value that selects the process-local store.
const MEMORY_DATABASE_URL: &str = "memory";

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},seal_failure=error,tower_http=info",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Ci Moment API v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn ArtifactStore> = if config.database_url == MEMORY_DATABASE_URL {
        warn!("DATABASE_URL=memory: artifacts are kept in process memory and lost on restart");
        Arc::new(MemoryArtifactStore::new())
    } else {
        let pool = create_pool(&config.database_url, config.db_max_connections).await?;
        Arc::new(PgArtifactStore::new(pool))
    };

    let payments = build_provider(&config)?;
    info!("Payment provider: {}", payments.name());
    if let Err(e) = payments.ensure_configured() {
        warn!("Payment provider is not fully configured, sealing will fail: {e}");
    }
    if config.public_url.is_none() {
        warn!("PUBLIC_URL is not set, sealing will fail");
    }

    let state = AppState {
        config: config.clone(),
        store,
        payments,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
