// =============================================================================
// Exponential Smoothing Primitives
// =============================================================================
//
// Two recurrences share the same shape and differ only in their smoothing
// factor:
//
//   EMA (span s):        alpha = 2 / (s + 1)
//   Wilder (period p):   alpha = 1 / p
//
//   out[0] = x[0]
//   out[i] = alpha * x[i] + (1 - alpha) * out[i-1]
//
// Both seed from the first observation rather than an SMA window, so the
// output always has the same length as the input and every position is
// defined for finite inputs.
// =============================================================================

/// Exponential moving average with the conventional `2 / (span + 1)` factor.
///
/// Returns a series the same length as `values`.  An empty input yields an
/// empty output; `span == 0` is treated as `span == 1` (no smoothing).
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    smooth(values, 2.0 / (span.max(1) as f64 + 1.0))
}

/// Wilder-style smoothed moving average with factor `1 / period`.
///
/// This is the averaging used inside RSI.  `period == 0` is treated as
/// `period == 1` (no smoothing).
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    smooth(values, 1.0 / period.max(1) as f64)
}

fn smooth(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut prev = match values.first() {
        Some(&v) => v,
        None => return out,
    };
    out.push(prev);

    for &v in &values[1..] {
        prev = alpha * v + (1.0 - alpha) * prev;
        out.push(prev);
    }

    out
}
