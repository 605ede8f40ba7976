//! Relative Strength Index (RSI) indicator.

/// RSI (Relative Strength Index) series with Wilder smoothing.
///
/// The first value averages the first `period` price changes; every later
/// value smooths the running averages by `(avg * (period - 1) + change) / period`.
/// Values range from 0-100. Returns an empty series when there are fewer than
/// `period + 1` closes.
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period + 1 {
        return Vec::new();
    }

    let mut gains = Vec::with_capacity(closes.len() - 1);
    let mut losses = Vec::with_capacity(closes.len() - 1);

    for pair in closes.windows(2) {
        let change = pair[1] - pair[0];
        if change > 0.0 {
            gains.push(change);
            losses.push(0.0);
        } else {
            gains.push(0.0);
            losses.push(-change);
        }
    }

    let p = period as f64;
    let mut avg_gain: f64 = gains.iter().take(period).sum::<f64>() / p;
    let mut avg_loss: f64 = losses.iter().take(period).sum::<f64>() / p;

    let mut out = Vec::with_capacity(gains.len() + 1 - period);
    out.push(rsi_value(avg_gain, avg_loss));

    for i in period..gains.len() {
        avg_gain = (avg_gain * (p - 1.0) + gains[i]) / p;
        avg_loss = (avg_loss * (p - 1.0) + losses[i]) / p;
        out.push(rsi_value(avg_gain, avg_loss));
    }

    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        // No movement at all reads as balanced.
        return if avg_gain == 0.0 { 50.0 } else { 100.0 };
    }

    let rs = avg_gain / avg_loss;
    (100.0 - (100.0 / (1.0 + rs))).clamp(0.0, 100.0)
}
