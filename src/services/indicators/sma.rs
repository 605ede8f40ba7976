//! Simple Moving Average (SMA) indicator.

/// SMA series over `period` values.
///
/// Output has `values.len() - period + 1` points, or none when there are
/// fewer than `period` values.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let p = period as f64;
    let mut out = Vec::with_capacity(values.len() + 1 - period);
    let mut sum: f64 = values[..period].iter().sum();
    out.push(sum / p);

    for i in period..values.len() {
        sum += values[i] - values[i - period];
        out.push(sum / p);
    }

    out
}
