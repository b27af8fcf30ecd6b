use anyhow::{Context, Result};
use card_arb_core::clients::{PokemonTcgClient, PriceChartingClient};
use card_arb_core::{LookupService, PriceExtractor};
use dotenv::dotenv;
use price_api_rust::{create_router, Config};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,card_arb_core=debug,price_api_rust=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Card Price API...");

    let config = Config::from_env();
    config.log_config();

    if config.pricecharting_api_token.is_none() {
        warn!("PRICECHARTING_API_TOKEN not set; PriceCharting lookups will report unavailable");
    }

    // Clients
    let catalog = PokemonTcgClient::new(config.pokemon_tcg_settings())
        .context("Failed to initialize pokemontcg.io client")?;
    let guide = PriceChartingClient::new(config.pricecharting_settings())
        .context("Failed to initialize PriceCharting client")?;

    let lookup = LookupService::new(
        Arc::new(catalog),
        Arc::new(guide),
        PriceExtractor::new(config.eur_to_usd_rate),
    );

    if let Some(every) = config.cache_purge_interval() {
        tokio::spawn(purge_caches(lookup.clone(), every, config.cache_stale_grace()));
    }

    let mut app = create_router(lookup).layer(TraceLayer::new_for_http());
    if config.cors_permissive {
        app = app.layer(CorsLayer::permissive());
    }

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Card Price API stopped");
    Ok(())
}

/// Periodically drop cache entries too old to serve even as stale fallbacks.
async fn purge_caches(lookup: LookupService, every: Duration, grace: Duration) {
    let mut ticker = tokio::time::interval(every);
    // The first tick completes immediately
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let removed = lookup.purge_caches(grace).await;
        if removed > 0 {
            info!("Purged {} stale cache entries", removed);
        } else {
            debug!("Cache purge found nothing to remove");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
