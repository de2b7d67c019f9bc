// =============================================================================
// Shared Application State
// =============================================================================
//
// Ties the configuration and the market data cache together for the route
// layer.  Handlers hold an `Arc<AppState>`; the cache manages its own
// interior mutability, so the state itself is immutable after construction.
// =============================================================================

use std::sync::Arc;
use std::time::Instant;

use crate::config::ServiceConfig;
use crate::market_data::MarketDataCache;

/// Shared state for every request handler.
pub struct AppState {
    pub config: ServiceConfig,
    pub market: Arc<MarketDataCache>,
    /// Instant when the service started. Used for uptime reporting.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: ServiceConfig, market: Arc<MarketDataCache>) -> Self {
        Self {
            config,
            market,
            start_time: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
