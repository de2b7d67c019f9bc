// =============================================================================
// Market Data Cache — TTL cache over the upstream exchange sources
// =============================================================================
//
// Isolates the signal pipeline from upstream latency, failures, and duplicate
// calls.  Two maps, two policies:
//
//   Candles  — keyed (symbol, timeframe, limit, exchange).  Freshness matters
//              for signal correctness, so an expired entry is never served:
//              a refresh failure propagates and an empty upstream response is
//              `DataUnavailable`.
//   Funding  — keyed (symbol, exchange).  Funding rates move slowly, so a
//              failed refresh falls back to the last cached value even when
//              expired; only a failure with no cached value propagates.
//
// Concurrent misses on the same key share a single upstream fetch through a
// per-key in-flight lock.  Lock maps are guarded by parking_lot and released
// before any await; only the per-key async mutex is held across the fetch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::market_data::candle::Candle;
use crate::market_data::error::MarketError;
use crate::types::FundingSnapshot;

/// Upstream data source for a single exchange.
///
/// Implementations perform the actual network calls; the cache never needs to
/// know how.  Both methods fail with a plain error on network/exchange
/// trouble, and `fetch_candles` returns an empty vector when the exchange has
/// no data for the request.
#[async_trait]
pub trait MarketSource: Send + Sync {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: u32,
    ) -> anyhow::Result<Vec<Candle>>;

    async fn fetch_funding(&self, symbol: &str) -> anyhow::Result<FundingSnapshot>;
}

// -----------------------------------------------------------------------------
// Keys and entries
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct CandleKey {
    symbol: String,
    timeframe: String,
    limit: u32,
    exchange: String,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct FundingKey {
    symbol: String,
    exchange: String,
}

struct CacheEntry<T> {
    value: T,
    fetched_at: Instant,
}

impl<T> CacheEntry<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            fetched_at: Instant::now(),
        }
    }

    fn fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

// -----------------------------------------------------------------------------
// MarketDataCache
// -----------------------------------------------------------------------------

/// TTL-bounded cache shared by every request handler.
///
/// Updates are last-writer-wins per key.  Candle series are stored behind an
/// `Arc` so cache hits hand out shared references instead of cloning the
/// whole series.
pub struct MarketDataCache {
    sources: HashMap<String, Arc<dyn MarketSource>>,
    candle_ttl: Duration,
    funding_ttl: Duration,
    candles: RwLock<HashMap<CandleKey, CacheEntry<Arc<Vec<Candle>>>>>,
    funding: RwLock<HashMap<FundingKey, CacheEntry<FundingSnapshot>>>,
    candle_flights: Mutex<HashMap<CandleKey, Arc<AsyncMutex<()>>>>,
    funding_flights: Mutex<HashMap<FundingKey, Arc<AsyncMutex<()>>>>,
}

impl MarketDataCache {
    pub fn new(candle_ttl: Duration, funding_ttl: Duration) -> Self {
        Self {
            sources: HashMap::new(),
            candle_ttl,
            funding_ttl,
            candles: RwLock::new(HashMap::new()),
            funding: RwLock::new(HashMap::new()),
            candle_flights: Mutex::new(HashMap::new()),
            funding_flights: Mutex::new(HashMap::new()),
        }
    }

    /// Register the upstream source for `exchange`.  Requests naming an
    /// exchange with no registered source resolve to "unsupported".
    pub fn register_source(&mut self, exchange: impl Into<String>, source: Arc<dyn MarketSource>) {
        self.sources.insert(exchange.into(), source);
    }

    // -------------------------------------------------------------------------
    // Candles
    // -------------------------------------------------------------------------

    /// Return the candle series for the exact `(symbol, timeframe, limit,
    /// exchange)` tuple, fetching upstream on miss or expiry.
    ///
    /// Distinct timeframes/limits are distinct entries; the cache never
    /// slices or interpolates between them.
    pub async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: u32,
        exchange: &str,
    ) -> Result<Arc<Vec<Candle>>, MarketError> {
        let key = CandleKey {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            limit,
            exchange: exchange.to_string(),
        };

        if let Some(hit) = self.fresh_candles(&key) {
            debug!(symbol, timeframe, limit, exchange, "candle cache hit");
            return Ok(hit);
        }

        let source = self
            .sources
            .get(exchange)
            .ok_or_else(|| MarketError::UnsupportedExchange(exchange.to_string()))?
            .clone();

        let gate = {
            let mut flights = self.candle_flights.lock();
            flights.entry(key.clone()).or_default().clone()
        };
        let _guard = gate.lock().await;

        // Another request may have populated the entry while we waited.
        if let Some(hit) = self.fresh_candles(&key) {
            debug!(symbol, timeframe, "candle cache filled by concurrent fetch");
            return Ok(hit);
        }

        let outcome = match source.fetch_candles(symbol, timeframe, limit).await {
            Ok(rows) if rows.is_empty() => Err(MarketError::DataUnavailable {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
                exchange: exchange.to_string(),
            }),
            Ok(rows) => {
                debug!(symbol, timeframe, rows = rows.len(), "candle series fetched");
                let series = Arc::new(rows);
                self.candles
                    .write()
                    .insert(key.clone(), CacheEntry::new(series.clone()));
                Ok(series)
            }
            Err(e) => Err(MarketError::upstream(
                symbol,
                exchange,
                format!("{timeframe} klines"),
                e,
            )),
        };

        self.candle_flights.lock().remove(&key);
        outcome
    }

    fn fresh_candles(&self, key: &CandleKey) -> Option<Arc<Vec<Candle>>> {
        let map = self.candles.read();
        map.get(key)
            .filter(|entry| entry.fresh(self.candle_ttl))
            .map(|entry| entry.value.clone())
    }

    // -------------------------------------------------------------------------
    // Funding rate
    // -------------------------------------------------------------------------

    /// Return the funding snapshot for `(symbol, exchange)`.
    ///
    /// `Ok(None)` means the exchange has no funding integration — distinct
    /// from a fetch failure.  On refresh failure the last cached value is
    /// served even when expired; the error propagates only when nothing was
    /// ever cached.
    pub async fn fetch_funding_rate(
        &self,
        symbol: &str,
        exchange: &str,
    ) -> Result<Option<FundingSnapshot>, MarketError> {
        let source = match self.sources.get(exchange) {
            Some(s) => s.clone(),
            None => {
                debug!(symbol, exchange, "no funding integration for exchange");
                return Ok(None);
            }
        };

        let key = FundingKey {
            symbol: symbol.to_string(),
            exchange: exchange.to_string(),
        };

        if let Some(hit) = self.fresh_funding(&key) {
            debug!(symbol, exchange, "funding cache hit");
            return Ok(Some(hit));
        }

        let gate = {
            let mut flights = self.funding_flights.lock();
            flights.entry(key.clone()).or_default().clone()
        };
        let _guard = gate.lock().await;

        if let Some(hit) = self.fresh_funding(&key) {
            return Ok(Some(hit));
        }

        let outcome = match source.fetch_funding(symbol).await {
            Ok(snapshot) => {
                debug!(
                    symbol,
                    exchange,
                    rate = snapshot.last_funding_rate,
                    "funding rate fetched"
                );
                self.funding
                    .write()
                    .insert(key.clone(), CacheEntry::new(snapshot.clone()));
                Ok(Some(snapshot))
            }
            Err(e) => {
                // Stale fallback: partial staleness beats a missing input.
                let stale = self.funding.read().get(&key).map(|e| e.value.clone());
                match stale {
                    Some(snapshot) => {
                        warn!(
                            symbol,
                            exchange,
                            error = %e,
                            "funding refresh failed — serving stale cached value"
                        );
                        Ok(Some(snapshot))
                    }
                    None => Err(MarketError::upstream(symbol, exchange, "funding rate", e)),
                }
            }
        };

        self.funding_flights.lock().remove(&key);
        outcome
    }

    fn fresh_funding(&self, key: &FundingKey) -> Option<FundingSnapshot> {
        let map = self.funding.read();
        map.get(key)
            .filter(|entry| entry.fresh(self.funding_ttl))
            .map(|entry| entry.value.clone())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct MockSource {
        candle_calls: AtomicUsize,
        funding_calls: AtomicUsize,
        fail_candles: AtomicBool,
        fail_funding: AtomicBool,
        return_empty: AtomicBool,
        delay: Duration,
    }

    impl MockSource {
        fn new() -> Self {
            Self {
                candle_calls: AtomicUsize::new(0),
                funding_calls: AtomicUsize::new(0),
                fail_candles: AtomicBool::new(false),
                fail_funding: AtomicBool::new(false),
                return_empty: AtomicBool::new(false),
                delay: Duration::ZERO,
            }
        }

        fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new()
            }
        }

        fn sample_candles() -> Vec<Candle> {
            vec![
                Candle::new(1, 10.0, 11.0, 9.0, 10.5, 100.0),
                Candle::new(2, 10.5, 12.0, 10.0, 11.5, 120.0),
            ]
        }

        fn sample_funding(rate: f64) -> FundingSnapshot {
            FundingSnapshot {
                symbol: "BTCUSDT".into(),
                mark_price: 64000.0,
                last_funding_rate: rate,
                next_funding_time: 1700003600000,
                time: 1700000000000,
            }
        }
    }

    #[async_trait]
    impl MarketSource for MockSource {
        async fn fetch_candles(
            &self,
            _symbol: &str,
            _timeframe: &str,
            _limit: u32,
        ) -> anyhow::Result<Vec<Candle>> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.candle_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_candles.load(Ordering::SeqCst) {
                anyhow::bail!("simulated network failure");
            }
            if self.return_empty.load(Ordering::SeqCst) {
                return Ok(Vec::new());
            }
            Ok(Self::sample_candles())
        }

        async fn fetch_funding(&self, _symbol: &str) -> anyhow::Result<FundingSnapshot> {
            self.funding_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_funding.load(Ordering::SeqCst) {
                anyhow::bail!("simulated funding failure");
            }
            Ok(Self::sample_funding(0.0001))
        }
    }

    fn cache_with(source: Arc<MockSource>, candle_ttl: Duration, funding_ttl: Duration) -> MarketDataCache {
        let mut cache = MarketDataCache::new(candle_ttl, funding_ttl);
        cache.register_source("binance", source);
        cache
    }

    // ---- candle policy ---------------------------------------------------

    #[tokio::test]
    async fn candle_hit_within_ttl_fetches_once() {
        let source = Arc::new(MockSource::new());
        let cache = cache_with(source.clone(), Duration::from_secs(300), Duration::from_secs(300));

        let a = cache.fetch_candles("BTC/USDT", "1h", 300, "binance").await.unwrap();
        let b = cache.fetch_candles("BTC/USDT", "1h", 300, "binance").await.unwrap();

        assert_eq!(source.candle_calls.load(Ordering::SeqCst), 1);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn candle_expiry_triggers_exactly_one_more_fetch() {
        let source = Arc::new(MockSource::new());
        let cache = cache_with(source.clone(), Duration::ZERO, Duration::from_secs(300));

        cache.fetch_candles("BTC/USDT", "1h", 300, "binance").await.unwrap();
        cache.fetch_candles("BTC/USDT", "1h", 300, "binance").await.unwrap();

        assert_eq!(source.candle_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn distinct_key_tuples_are_distinct_entries() {
        let source = Arc::new(MockSource::new());
        let cache = cache_with(source.clone(), Duration::from_secs(300), Duration::from_secs(300));

        cache.fetch_candles("BTC/USDT", "1h", 300, "binance").await.unwrap();
        cache.fetch_candles("BTC/USDT", "4h", 300, "binance").await.unwrap();
        cache.fetch_candles("BTC/USDT", "1h", 100, "binance").await.unwrap();

        assert_eq!(source.candle_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn empty_candle_response_is_data_unavailable() {
        let source = Arc::new(MockSource::new());
        source.return_empty.store(true, Ordering::SeqCst);
        let cache = cache_with(source, Duration::from_secs(300), Duration::from_secs(300));

        let err = cache
            .fetch_candles("BTC/USDT", "1h", 300, "binance")
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::DataUnavailable { .. }));
    }

    #[tokio::test]
    async fn candle_failure_propagates_without_stale_fallback() {
        let source = Arc::new(MockSource::new());
        let cache = cache_with(source.clone(), Duration::ZERO, Duration::from_secs(300));

        // Populate, then expire (ttl zero) and break the upstream.
        cache.fetch_candles("BTC/USDT", "1h", 300, "binance").await.unwrap();
        source.fail_candles.store(true, Ordering::SeqCst);

        let err = cache
            .fetch_candles("BTC/USDT", "1h", 300, "binance")
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Upstream { .. }));
    }

    #[tokio::test]
    async fn unknown_exchange_is_unsupported_for_candles() {
        let cache = cache_with(
            Arc::new(MockSource::new()),
            Duration::from_secs(300),
            Duration::from_secs(300),
        );
        let err = cache
            .fetch_candles("BTC/USDT", "1h", 300, "krakenx")
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::UnsupportedExchange(_)));
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_fetch() {
        let source = Arc::new(MockSource::with_delay(Duration::from_millis(50)));
        let cache = Arc::new(cache_with(
            source.clone(),
            Duration::from_secs(300),
            Duration::from_secs(300),
        ));

        let c1 = cache.clone();
        let c2 = cache.clone();
        let (a, b) = tokio::join!(
            c1.fetch_candles("BTC/USDT", "1h", 300, "binance"),
            c2.fetch_candles("BTC/USDT", "1h", 300, "binance"),
        );

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(source.candle_calls.load(Ordering::SeqCst), 1);
    }

    // ---- funding policy --------------------------------------------------

    #[tokio::test]
    async fn funding_hit_within_ttl_fetches_once() {
        let source = Arc::new(MockSource::new());
        let cache = cache_with(source.clone(), Duration::from_secs(300), Duration::from_secs(300));

        cache.fetch_funding_rate("BTCUSDT", "binance").await.unwrap();
        cache.fetch_funding_rate("BTCUSDT", "binance").await.unwrap();

        assert_eq!(source.funding_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn funding_stale_fallback_on_refresh_failure() {
        let source = Arc::new(MockSource::new());
        let cache = cache_with(source.clone(), Duration::from_secs(300), Duration::ZERO);

        let first = cache
            .fetch_funding_rate("BTCUSDT", "binance")
            .await
            .unwrap()
            .unwrap();
        source.fail_funding.store(true, Ordering::SeqCst);

        let second = cache
            .fetch_funding_rate("BTCUSDT", "binance")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn funding_failure_without_cache_propagates() {
        let source = Arc::new(MockSource::new());
        source.fail_funding.store(true, Ordering::SeqCst);
        let cache = cache_with(source, Duration::from_secs(300), Duration::from_secs(300));

        let err = cache
            .fetch_funding_rate("BTCUSDT", "binance")
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Upstream { .. }));
    }

    #[tokio::test]
    async fn unknown_exchange_funding_is_absent_not_error() {
        let cache = cache_with(
            Arc::new(MockSource::new()),
            Duration::from_secs(300),
            Duration::from_secs(300),
        );
        let result = cache.fetch_funding_rate("BTCUSDT", "krakenx").await.unwrap();
        assert!(result.is_none());
    }
}
