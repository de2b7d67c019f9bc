// =============================================================================
// Market Data Error Taxonomy
// =============================================================================
//
// Callers branch on these variants:
//   DataUnavailable     — upstream answered with zero rows; not retryable
//                         within the request.
//   Upstream            — network/exchange failure; candles propagate this,
//                         funding falls back to a stale cache entry first.
//   UnsupportedExchange — no integration for the named exchange; distinct
//                         from a fetch that failed.
//   Computation         — malformed input reached the indicator/signal path.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("no candle data returned for {symbol} {timeframe} on {exchange}")]
    DataUnavailable {
        symbol: String,
        timeframe: String,
        exchange: String,
    },

    #[error("upstream request to {exchange} failed for {symbol} ({detail}): {source}")]
    Upstream {
        symbol: String,
        exchange: String,
        /// Extra request context, e.g. the timeframe or "funding rate".
        detail: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("exchange '{0}' is not supported")]
    UnsupportedExchange(String),

    #[error("computation failed: {0}")]
    Computation(String),
}

impl MarketError {
    pub fn upstream(
        symbol: impl Into<String>,
        exchange: impl Into<String>,
        detail: impl Into<String>,
        source: anyhow::Error,
    ) -> Self {
        Self::Upstream {
            symbol: symbol.into(),
            exchange: exchange.into(),
            detail: detail.into(),
            source,
        }
    }
}
