// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
//   dif  = EMA(close, fast) - EMA(close, slow)
//   dea  = EMA(dif, signal)
//   hist = 2 * (dif - dea)
//
// The doubled histogram matches the service's long-standing output contract
// (some charting conventions omit the factor); consumers calibrate their
// thresholds against the doubled value.
// =============================================================================

use crate::indicators::{backfill, ema};

/// The three MACD output series, each aligned 1:1 with the input closes.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub dif: Vec<f64>,
    pub dea: Vec<f64>,
    pub hist: Vec<f64>,
}

impl MacdSeries {
    /// Most recent `(dif, dea, hist)` triple, if the series is non-empty.
    pub fn latest(&self) -> Option<(f64, f64, f64)> {
        Some((
            *self.dif.last()?,
            *self.dea.last()?,
            *self.hist.last()?,
        ))
    }
}

/// Compute MACD over `closes` with the given spans.
///
/// Output series have the same length as the input.  Empty input yields
/// empty series.  The warm-up backfill policy mirrors RSI's: with seeded
/// EMAs every position is already defined, and the explicit backfill pass
/// guarantees it stays that way.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> MacdSeries {
    let ema_fast = ema(closes, fast);
    let ema_slow = ema(closes, slow);

    let mut dif: Vec<f64> = ema_fast
        .iter()
        .zip(ema_slow.iter())
        .map(|(f, s)| f - s)
        .collect();

    let mut dea = ema(&dif, signal);

    let mut hist: Vec<f64> = dif
        .iter()
        .zip(dea.iter())
        .map(|(d, e)| 2.0 * (d - e))
        .collect();

    backfill(&mut dif);
    backfill(&mut dea);
    backfill(&mut hist);

    MacdSeries { dif, dea, hist }
}
