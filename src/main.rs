use anyhow::Result;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use order_tagger::{router, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; real deployments set the environment.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_tagger=debug")),
        )
        .init();

    let config = Config::load()?;
    info!(
        "Configuration loaded: shop={} sku={} tag={:?} delay={}s",
        config.shopify_shop, config.target_sku, config.marker_tag, config.tag_delay_secs
    );

    let bind_address = config.bind_address.clone();
    let drain_timeout = config.api_timeout() + Duration::from_secs(5);
    let state = AppState::new(config)?;
    let deferred = state.deferred.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Server starting on {}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    deferred.drain(drain_timeout).await;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
