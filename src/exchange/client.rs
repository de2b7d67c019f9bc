// =============================================================================
// Binance REST API Client — public market data endpoints
// =============================================================================
//
// Two upstream calls, both unauthenticated:
//
//   GET {spot}/api/v3/klines            — OHLCV candles (array-of-arrays)
//   GET {futures}/fapi/v1/premiumIndex  — mark price + funding rate snapshot
//
// Every request carries the client-wide timeout so a stalled upstream can
// never hang a request indefinitely.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::market_data::cache::MarketSource;
use crate::market_data::candle::Candle;
use crate::types::FundingSnapshot;

const SPOT_BASE_URL: &str = "https://api.binance.com";
const FUTURES_BASE_URL: &str = "https://fapi.binance.com";

/// Collapse a trading-pair symbol to Binance's compact form:
/// `"BTC/USDT"` => `"BTCUSDT"`.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.replace('/', "").to_uppercase()
}

/// Binance REST client for public spot and futures market data.
#[derive(Debug, Clone)]
pub struct BinanceClient {
    spot_base: String,
    futures_base: String,
    client: reqwest::Client,
}

impl BinanceClient {
    /// Create a new client with the given per-request `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");

        debug!(timeout_secs = timeout.as_secs(), "BinanceClient initialised");

        Self {
            spot_base: SPOT_BASE_URL.to_string(),
            futures_base: FUTURES_BASE_URL.to_string(),
            client,
        }
    }

    #[cfg(test)]
    fn with_base_urls(spot: impl Into<String>, futures: impl Into<String>) -> Self {
        Self {
            spot_base: spot.into(),
            futures_base: futures.into(),
            client: reqwest::Client::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Candles
    // -------------------------------------------------------------------------

    /// GET /api/v3/klines — fetch up to `limit` most-recent candles.
    ///
    /// Array indices per entry:
    ///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume
    /// (the remaining positions are ignored here).
    #[instrument(skip(self), name = "binance::get_klines")]
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>> {
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.spot_base,
            normalize_symbol(symbol),
            interval,
            limit
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /api/v3/klines request failed")?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse klines response")?;

        if !status.is_success() {
            anyhow::bail!("Binance GET /api/v3/klines returned {}: {}", status, body);
        }

        let raw = body.as_array().context("klines response is not an array")?;

        let mut candles = Vec::with_capacity(raw.len());
        for entry in raw {
            let arr = entry.as_array().context("kline entry is not an array")?;
            if arr.len() < 6 {
                warn!("skipping malformed kline entry with {} elements", arr.len());
                continue;
            }

            candles.push(Candle::new(
                arr[0].as_i64().unwrap_or(0),
                parse_str_f64(&arr[1])?,
                parse_str_f64(&arr[2])?,
                parse_str_f64(&arr[3])?,
                parse_str_f64(&arr[4])?,
                parse_str_f64(&arr[5])?,
            ));
        }

        debug!(symbol, interval, count = candles.len(), "klines fetched");
        Ok(candles)
    }

    // -------------------------------------------------------------------------
    // Funding rate
    // -------------------------------------------------------------------------

    /// GET /fapi/v1/premiumIndex — current mark price and funding rate for a
    /// perpetual contract.
    #[instrument(skip(self), name = "binance::get_premium_index")]
    pub async fn get_premium_index(&self, symbol: &str) -> Result<FundingSnapshot> {
        let compact = normalize_symbol(symbol);
        let url = format!(
            "{}/fapi/v1/premiumIndex?symbol={}",
            self.futures_base, compact
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /fapi/v1/premiumIndex request failed")?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse premiumIndex response")?;

        if !status.is_success() {
            anyhow::bail!(
                "Binance GET /fapi/v1/premiumIndex returned {}: {}",
                status,
                body
            );
        }

        let snapshot = FundingSnapshot {
            symbol: body["symbol"].as_str().unwrap_or(&compact).to_string(),
            mark_price: lenient_f64(&body["markPrice"]),
            last_funding_rate: lenient_f64(&body["lastFundingRate"]),
            next_funding_time: body["nextFundingTime"].as_i64().unwrap_or(0),
            time: body["time"].as_i64().unwrap_or(0),
        };

        debug!(
            symbol = %snapshot.symbol,
            rate = snapshot.last_funding_rate,
            "premium index fetched"
        );
        Ok(snapshot)
    }
}

// -----------------------------------------------------------------------------
// MarketSource integration
// -----------------------------------------------------------------------------

#[async_trait]
impl MarketSource for BinanceClient {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: u32,
    ) -> Result<Vec<Candle>> {
        self.get_klines(symbol, timeframe, limit).await
    }

    async fn fetch_funding(&self, symbol: &str) -> Result<FundingSnapshot> {
        self.get_premium_index(symbol).await
    }
}

// -----------------------------------------------------------------------------
// Parsing helpers
// -----------------------------------------------------------------------------

/// Parse a JSON value that may be either a string or a number into `f64`.
fn parse_str_f64(val: &serde_json::Value) -> Result<f64> {
    if let Some(s) = val.as_str() {
        s.parse::<f64>()
            .with_context(|| format!("failed to parse '{s}' as f64"))
    } else if let Some(n) = val.as_f64() {
        Ok(n)
    } else {
        anyhow::bail!("expected string or number, got: {val}")
    }
}

/// Like [`parse_str_f64`] but tolerant: absent or malformed values become 0.0
/// (funding fields are advisory, not load-bearing for candle correctness).
fn lenient_f64(val: &serde_json::Value) -> f64 {
    parse_str_f64(val).unwrap_or(0.0)
}
