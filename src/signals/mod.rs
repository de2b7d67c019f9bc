// =============================================================================
// Signal Synthesizer — RSI + MACD + funding-rate confluence
// =============================================================================
//
// Combines the latest indicator scalars with the current funding rate and
// applies a strict two-rule decision table, evaluated in order (first match
// wins):
//
//   SELL  iff  RSI > 75  and  funding > 0.05%  and  MACD hist < 0
//   BUY   iff  RSI < 40  and  funding < 0      and  MACD hist > 0
//   otherwise WAIT
//
// The two branches point in opposite rate/overbought directions so only one
// can fire, but the evaluation order stays the defined tie-break should the
// thresholds ever be loosened.
//
// A single evaluation pass, no retries, no state across calls: the verdict is
// a pure function of the candle series and current cache contents.

use serde::Serialize;
use serde_json::json;
use tracing::warn;

use crate::exchange::client::normalize_symbol;
use crate::indicators::{macd, rsi};
use crate::market_data::{candle, Candle, MarketDataCache, MarketError};
use crate::types::{Action, PriceLevels, SignalResponse, SignalScores};

pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;

/// Trailing candle window for support/resistance extraction.
pub const LEVEL_WINDOW: usize = 60;

const SELL_RSI: f64 = 75.0;
const SELL_FUNDING: f64 = 0.0005;
const BUY_RSI: f64 = 40.0;

/// The synthesizer's complete output for one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalVerdict {
    pub action: Action,
    pub scores: SignalScores,
    pub reasons: Vec<String>,
    pub levels: PriceLevels,
}

/// Evaluate the decision table over `candles` for `symbol` on `exchange`.
///
/// The funding rate is obtained through the cache; when it is absent
/// (unsupported exchange, or a failed fetch with nothing cached) the rule
/// evaluation uses `0.0` and the degradation is logged at the boundary.
///
/// Errors here never reach an end consumer as errors: the route layer
/// converts any failure into a `wait` response via
/// [`crate::api::rest`]'s degraded-signal path.
pub async fn calculate_signal(
    cache: &MarketDataCache,
    candles: &[Candle],
    symbol: &str,
    exchange: &str,
) -> Result<SignalVerdict, MarketError> {
    let closes = candle::closes(candles);
    if closes.is_empty() {
        return Err(MarketError::Computation(format!(
            "empty candle series for {symbol}"
        )));
    }

    let rsi_series = rsi(&closes, RSI_PERIOD);
    let macd_series = macd(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);

    let rsi_latest = rsi_series
        .last()
        .copied()
        .ok_or_else(|| MarketError::Computation("RSI series is empty".into()))?;
    let (dif_latest, dea_latest, hist_latest) = macd_series
        .latest()
        .ok_or_else(|| MarketError::Computation("MACD series is empty".into()))?;

    let funding_rate = match cache
        .fetch_funding_rate(&normalize_symbol(symbol), exchange)
        .await
    {
        Ok(Some(snapshot)) => snapshot.last_funding_rate,
        Ok(None) => {
            warn!(symbol, exchange, "funding rate unavailable — evaluating rules with 0.0");
            0.0
        }
        Err(e) => {
            warn!(
                symbol,
                exchange,
                error = %e,
                "funding fetch failed with no cached fallback — evaluating rules with 0.0"
            );
            0.0
        }
    };

    let (action, reasons) = decide(rsi_latest, funding_rate, hist_latest);

    Ok(SignalVerdict {
        action,
        scores: SignalScores {
            rsi: rsi_latest,
            funding: funding_rate,
            macd_hist: hist_latest,
            dif: dif_latest,
            dea: dea_latest,
        },
        reasons,
        levels: price_levels(candles),
    })
}

/// Apply the decision table to the three latest scalars.
fn decide(rsi_latest: f64, funding_rate: f64, hist_latest: f64) -> (Action, Vec<String>) {
    if rsi_latest > SELL_RSI && funding_rate > SELL_FUNDING && hist_latest < 0.0 {
        (
            Action::Sell,
            vec![
                "RSI>75 overbought".to_string(),
                "Funding>0.05% long overheated".to_string(),
                "MACD histogram turned negative, momentum weakening".to_string(),
            ],
        )
    } else if rsi_latest < BUY_RSI && funding_rate < 0.0 && hist_latest > 0.0 {
        (
            Action::Buy,
            vec![
                "RSI<40 oversold".to_string(),
                "Funding<0 short overheated".to_string(),
                "MACD histogram turned positive, momentum recovering".to_string(),
            ],
        )
    } else {
        (Action::Wait, vec!["No confluence detected".to_string()])
    }
}

/// Support = lowest low, resistance = highest high over the trailing
/// `min(LEVEL_WINDOW, len)` candles.
fn price_levels(candles: &[Candle]) -> PriceLevels {
    let window = LEVEL_WINDOW.min(candles.len());
    let tail = &candles[candles.len() - window..];

    let support = tail.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let resistance = tail
        .iter()
        .map(|c| c.high)
        .fold(f64::NEG_INFINITY, f64::max);

    PriceLevels {
        support,
        resistance,
    }
}

// -----------------------------------------------------------------------------
// Response assembly
// -----------------------------------------------------------------------------

/// Wrap a verdict in the wire-level signal payload.
pub fn to_response(
    verdict: SignalVerdict,
    symbol: &str,
    timeframe: &str,
    limit: u32,
    exchange: &str,
) -> SignalResponse {
    SignalResponse {
        symbol: symbol.to_string(),
        timeframe: timeframe.to_string(),
        action: verdict.action,
        scores: verdict.scores,
        reasons: verdict.reasons,
        levels: verdict.levels,
        meta: json!({ "limit": limit, "exchange": exchange }),
    }
}

/// Convert a pipeline failure into the degraded `wait` payload.
///
/// This is the only shape a consumer ever sees for a failed evaluation: the
/// failure text rides in `reasons` and `meta.error`, and the scores/levels
/// are zeroed.
pub fn degraded_response(
    symbol: &str,
    timeframe: &str,
    limit: u32,
    exchange: &str,
    error: &MarketError,
) -> SignalResponse {
    SignalResponse {
        symbol: symbol.to_string(),
        timeframe: timeframe.to_string(),
        action: Action::Wait,
        scores: SignalScores::default(),
        reasons: vec![format!("Signal calculation failed: {error}")],
        levels: PriceLevels::default(),
        meta: json!({
            "limit": limit,
            "exchange": exchange,
            "error": error.to_string(),
        }),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::MarketSource;
    use crate::types::FundingSnapshot;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    struct FixedFunding {
        rate: f64,
        fail: bool,
    }

    #[async_trait]
    impl MarketSource for FixedFunding {
        async fn fetch_candles(
            &self,
            _symbol: &str,
            _timeframe: &str,
            _limit: u32,
        ) -> anyhow::Result<Vec<Candle>> {
            anyhow::bail!("not used in these tests")
        }

        async fn fetch_funding(&self, symbol: &str) -> anyhow::Result<FundingSnapshot> {
            if self.fail {
                anyhow::bail!("simulated funding outage");
            }
            Ok(FundingSnapshot {
                symbol: symbol.to_string(),
                mark_price: 100.0,
                last_funding_rate: self.rate,
                next_funding_time: 0,
                time: 0,
            })
        }
    }

    fn cache_with_funding(rate: f64, fail: bool) -> MarketDataCache {
        let mut cache = MarketDataCache::new(Duration::from_secs(300), Duration::from_secs(300));
        cache.register_source("binance", Arc::new(FixedFunding { rate, fail }));
        cache
    }

    fn flat_candles(n: usize, price: f64) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle::new(i as i64, price, price + 1.0, price - 1.0, price, 10.0))
            .collect()
    }

    // ---- decision table --------------------------------------------------

    #[test]
    fn overbought_positive_funding_negative_hist_sells() {
        let (action, reasons) = decide(80.0, 0.001, -0.5);
        assert_eq!(action, Action::Sell);
        assert_eq!(reasons[0], "RSI>75 overbought");
        assert_eq!(reasons.len(), 3);
    }

    #[test]
    fn oversold_negative_funding_positive_hist_buys() {
        let (action, reasons) = decide(30.0, -0.001, 0.5);
        assert_eq!(action, Action::Buy);
        assert_eq!(reasons[0], "RSI<40 oversold");
        assert_eq!(reasons.len(), 3);
    }

    #[test]
    fn neutral_rsi_waits_even_with_funding_pressure() {
        // The funding rule never fires alone: RSI must exceed 75 too.
        let (action, reasons) = decide(50.0, 0.001, -0.5);
        assert_eq!(action, Action::Wait);
        assert_eq!(reasons, vec!["No confluence detected".to_string()]);
    }

    #[test]
    fn sell_requires_all_three_conditions() {
        assert_eq!(decide(80.0, 0.0001, -0.5).0, Action::Wait); // funding too low
        assert_eq!(decide(80.0, 0.001, 0.5).0, Action::Wait); // hist positive
        assert_eq!(decide(74.9, 0.001, -0.5).0, Action::Wait); // rsi at boundary
    }

    #[test]
    fn buy_requires_strictly_negative_funding() {
        // funding == 0 must not satisfy the buy rule.
        assert_eq!(decide(30.0, 0.0, 0.5).0, Action::Wait);
    }

    // ---- price levels ----------------------------------------------------

    #[test]
    fn levels_over_trailing_window() {
        let mut candles = flat_candles(100, 50.0);
        // An extreme outside the 60-candle window must not count.
        candles[10].low = 1.0;
        candles[10].high = 1000.0;
        let levels = price_levels(&candles);
        assert_eq!(levels.support, 49.0);
        assert_eq!(levels.resistance, 51.0);
    }

    #[test]
    fn single_candle_levels_collapse_to_its_range() {
        let candles = vec![Candle::new(1, 10.0, 12.5, 9.5, 11.0, 5.0)];
        let levels = price_levels(&candles);
        assert_eq!(levels.support, 9.5);
        assert_eq!(levels.resistance, 12.5);
    }

    // ---- calculate_signal ------------------------------------------------

    #[tokio::test]
    async fn empty_series_is_computation_error() {
        let cache = cache_with_funding(0.0, false);
        let err = calculate_signal(&cache, &[], "BTC/USDT", "binance")
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Computation(_)));
    }

    #[tokio::test]
    async fn flat_series_saturated_rsi_still_waits() {
        // RSI pegs at 100 on a flat series, but hist == 0 blocks the sell rule.
        let cache = cache_with_funding(0.001, false);
        let candles = flat_candles(80, 100.0);
        let verdict = calculate_signal(&cache, &candles, "BTC/USDT", "binance")
            .await
            .unwrap();
        assert_eq!(verdict.action, Action::Wait);
        assert!((verdict.scores.rsi - 100.0).abs() < 1e-9);
        assert!((verdict.scores.macd_hist).abs() < 1e-9);
        assert!((verdict.scores.funding - 0.001).abs() < 1e-12);
    }

    #[tokio::test]
    async fn absent_funding_evaluates_as_zero() {
        // Funding outage with nothing cached: the rate defaults to 0.0, so
        // the buy rule's `funding < 0` condition cannot fire by accident.
        let cache = cache_with_funding(0.0, true);
        let candles: Vec<Candle> = (0..80)
            .map(|i| {
                let p = 200.0 - i as f64; // steady decline => oversold RSI
                Candle::new(i as i64, p, p + 1.0, p - 1.0, p, 10.0)
            })
            .collect();
        let verdict = calculate_signal(&cache, &candles, "BTC/USDT", "binance")
            .await
            .unwrap();
        assert_eq!(verdict.scores.funding, 0.0);
        assert_ne!(verdict.action, Action::Buy);
    }

    // ---- response assembly -----------------------------------------------

    #[test]
    fn degraded_response_is_wait_with_error_marker() {
        let err = MarketError::Computation("empty candle series for BTC/USDT".into());
        let resp = degraded_response("BTC/USDT", "1h", 300, "binance", &err);
        assert_eq!(resp.action, Action::Wait);
        assert_eq!(resp.scores, SignalScores::default());
        assert!(resp.reasons[0].starts_with("Signal calculation failed:"));
        assert_eq!(resp.meta["limit"], 300);
        assert!(resp.meta["error"].as_str().unwrap().contains("empty candle series"));
    }

    #[test]
    fn response_meta_carries_limit_and_exchange() {
        let verdict = SignalVerdict {
            action: Action::Wait,
            scores: SignalScores::default(),
            reasons: vec!["No confluence detected".into()],
            levels: PriceLevels::default(),
        };
        let resp = to_response(verdict, "ETH/USDT", "4h", 100, "binance");
        assert_eq!(resp.symbol, "ETH/USDT");
        assert_eq!(resp.meta["exchange"], "binance");
        assert_eq!(resp.meta["limit"], 100);
    }

    #[tokio::test]
    async fn repeated_evaluation_is_byte_identical() {
        let cache = cache_with_funding(0.0002, false);
        let candles = flat_candles(70, 250.0);

        let a = calculate_signal(&cache, &candles, "ETH/USDT", "binance")
            .await
            .unwrap();
        let b = calculate_signal(&cache, &candles, "ETH/USDT", "binance")
            .await
            .unwrap();

        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
