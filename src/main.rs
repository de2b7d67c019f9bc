// =============================================================================
// Helios Signal API — Main Entry Point
// =============================================================================
//
// Startup order: environment, logging, config, exchange client + cache,
// background cache warm-up, then the HTTP server. Warm-up failures are
// logged and never block readiness.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod config;
mod exchange;
mod indicators;
mod market_data;
mod signals;
mod types;

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::config::ServiceConfig;
use crate::exchange::BinanceClient;
use crate::market_data::MarketDataCache;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║           Helios Signal API — Starting Up                ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let mut config = ServiceConfig::load("service_config.json").unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        ServiceConfig::default()
    });

    if let Ok(addr) = std::env::var("HELIOS_BIND_ADDR") {
        config.bind_addr = addr;
    }

    info!(
        bind_addr = %config.bind_addr,
        default_exchange = %config.default_exchange,
        candle_ttl_secs = config.candle_ttl_secs,
        "service configured"
    );

    // ── 2. Exchange client & cache ───────────────────────────────────────
    let binance = Arc::new(BinanceClient::new(config.request_timeout()));

    let mut cache = MarketDataCache::new(config.candle_ttl(), config.funding_ttl());
    cache.register_source("binance", binance);
    let cache = Arc::new(cache);

    let state = Arc::new(AppState::new(config, cache.clone()));

    // ── 3. Cache warm-up (best-effort, non-blocking) ─────────────────────
    let warm_pairs = state.config.warm_pairs.clone();
    let warm_limit = state.config.warm_limit;
    let warm_exchange = state.config.default_exchange.clone();
    let warm_cache = cache.clone();
    tokio::spawn(async move {
        for pair in &warm_pairs {
            match warm_cache
                .fetch_candles(&pair.symbol, &pair.timeframe, warm_limit, &warm_exchange)
                .await
            {
                Ok(series) => info!(
                    symbol = %pair.symbol,
                    timeframe = %pair.timeframe,
                    rows = series.len(),
                    "cache warm completed"
                ),
                Err(e) => warn!(
                    symbol = %pair.symbol,
                    timeframe = %pair.timeframe,
                    error = %e,
                    "cache warm failed"
                ),
            }
        }
    });

    // ── 4. HTTP server ───────────────────────────────────────────────────
    let app = api::rest::router(state.clone());
    let listener = tokio::net::TcpListener::bind(&state.config.bind_addr).await?;
    info!(addr = %state.config.bind_addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Helios Signal API shut down complete.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    warn!("Shutdown signal received — stopping gracefully");
}
