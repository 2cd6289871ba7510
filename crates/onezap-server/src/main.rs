// ============================================================================
// onezap-server - HTTP API entry point
// ============================================================================

use anyhow::{anyhow, Result};
use onezap_core::{ChainClient, ContentDb, EthersChainClient, OneZapConfig};
use onezap_server::feeds::PlatformFeeds;
use onezap_server::{build_router, AppState};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Expired sessions and nonces are swept this often
const PRUNE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Could not load .env file: {}", e);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("onezap_server=debug".parse()?)
                .add_directive("onezap_core=debug".parse()?),
        )
        .init();

    let config = OneZapConfig::from_env();
    info!("Starting OneZap server ({:?})", config.chain);

    let db = Arc::new(ContentDb::open(config.db_path.as_deref())?);
    let chain: Arc<dyn ChainClient> = Arc::new(EthersChainClient::connect(&config.chain)?);

    let feeds = PlatformFeeds::start(
        chain.clone(),
        Duration::from_millis(config.event_poll_ms),
        &config.retry,
    )
    .await;
    let state = AppState::new(&config, db.clone(), chain, feeds);
    let feeds = state.feeds.clone();

    let pruner = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = db.prune_expired(chrono::Utc::now().timestamp()) {
                warn!("Session prune failed: {}", e);
            }
        }
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|e| anyhow!("Failed to bind {}: {}", config.bind_addr, e))?;
    info!("Listening on {}", config.bind_addr);

    let served = axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    pruner.abort();
    let stopped = feeds.stop_all().await;
    info!("Stopped {} live feeds", stopped);

    served.map_err(|e| anyhow!("Server error: {}", e))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
