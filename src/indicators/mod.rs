// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators driving the signal
// pipeline.  Every function operates on a plain `&[f64]` close sequence and
// returns a series with the SAME length and alignment as its input, so that
// candle `i` always lines up with indicator value `i`.
//
// Warm-up handling is explicit: producers mark not-yet-meaningful leading
// positions as NaN, then `backfill` replaces them with the first defined
// value before anything crosses the module boundary.

pub mod ema;
pub mod macd;
pub mod rsi;

pub use ema::{ema, wilder_smooth};
pub use macd::{macd, MacdSeries};
pub use rsi::rsi;

use std::str::FromStr;

/// Replace leading non-finite entries with the first finite value.
///
/// This is the warm-up policy for every indicator series: after the producer
/// has filled real values from the first meaningful index onward, the leading
/// NaN prefix is overwritten so no undefined position ever reaches a caller.
/// A series with no finite value at all is left untouched.
pub fn backfill(series: &mut [f64]) {
    let first_finite = match series.iter().position(|v| v.is_finite()) {
        Some(idx) => idx,
        None => return,
    };
    let fill = series[first_finite];
    for slot in &mut series[..first_finite] {
        *slot = fill;
    }
}

// =============================================================================
// Indicator selection
// =============================================================================

/// The indicators a caller may request from the indicator endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorKind {
    Rsi,
    Macd,
}

impl FromStr for IndicatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RSI" => Ok(Self::Rsi),
            "MACD" => Ok(Self::Macd),
            other => Err(format!("unknown indicator '{other}' (expected RSI or MACD)")),
        }
    }
}

impl IndicatorKind {
    /// Parse a comma-separated selection like `"RSI,MACD"`.
    ///
    /// `None` or an all-whitespace string selects every indicator, matching
    /// the endpoint's documented default.
    pub fn parse_selection(raw: Option<&str>) -> Result<Vec<IndicatorKind>, String> {
        let raw = match raw {
            Some(r) if !r.trim().is_empty() => r,
            _ => return Ok(vec![Self::Rsi, Self::Macd]),
        };

        let mut kinds = Vec::new();
        for part in raw.split(',') {
            let kind = part.parse::<IndicatorKind>()?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }
}
