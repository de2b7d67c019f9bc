// =============================================================================
// Relative Strength Index (RSI) — Wilder's Smoothing
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes to evaluate
// whether an asset is overbought or oversold.
//
// Step 1 — Split per-step deltas into gains (positive moves) and losses
//          (absolute value of negative moves).  The first position has no
//          delta and contributes zero to both.
// Step 2 — Wilder-smooth (alpha = 1/period) the gain and loss sequences
//          independently.
// Step 3 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//          When avg_loss == 0 the RSI saturates at 100 — no division occurs.
// Step 4 — The first `period` positions are warm-up; they are backfilled with
//          the first defined value, so the output has one concrete value per
//          input close.
// =============================================================================

use crate::indicators::{backfill, wilder_smooth};

/// Compute the full RSI series for `closes` with the given `period`.
///
/// The output has the same length and alignment as the input, with every
/// value in `[0, 100]`.
///
/// # Edge cases
/// - Empty input => empty output.
/// - Fewer closes than `period + 1` => every position carries the single
///   backfilled value (degenerate but defined).
/// - A series with no down moves (avg_loss == 0) saturates at 100.0.
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if closes.is_empty() {
        return Vec::new();
    }

    let n = closes.len();
    let mut gains = Vec::with_capacity(n);
    let mut losses = Vec::with_capacity(n);
    gains.push(0.0);
    losses.push(0.0);
    for w in closes.windows(2) {
        let delta = w[1] - w[0];
        gains.push(delta.max(0.0));
        losses.push((-delta).max(0.0));
    }

    let avg_gain = wilder_smooth(&gains, period);
    let avg_loss = wilder_smooth(&losses, period);

    // Positions before the warm-up boundary are not yet meaningful; mark them
    // NaN and let backfill overwrite them with the first defined value.
    let warmup = period.min(n - 1);

    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        if i < warmup {
            out.push(f64::NAN);
        } else {
            out.push(rsi_from_averages(avg_gain[i], avg_loss[i]));
        }
    }
    backfill(&mut out);

    out
}

/// Convert smoothed average gain / loss into an RSI value in [0, 100].
///
/// A zero average loss means there were no down moves in the smoothed window,
/// which saturates the index at 100 (equivalent to RS = +inf).
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
