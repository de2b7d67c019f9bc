// =============================================================================
// OHLCV Candle
// =============================================================================

use serde::{Deserialize, Serialize};

/// A single OHLCV candle.
///
/// Series are ordered strictly ascending by `timestamp` with the most recent
/// candle last, and are immutable once fetched — the cache hands out shared
/// references rather than copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Open time in milliseconds since the UNIX epoch.
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Extract the close-price sequence from a candle series, preserving order.
pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}
