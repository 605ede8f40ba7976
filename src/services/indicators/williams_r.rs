//! Williams %R indicator.

use super::window_range;

/// Value returned for a window whose high equals its low.
pub const FLAT_RANGE_R: f64 = -50.0;

/// Williams %R over a rolling window.
///
/// %R = (Highest High - Close) / (Highest High - Lowest Low) * -100
///
/// Bounded to [-100, 0]. Empty when there are fewer than `period` bars.
pub fn williams_r(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<f64> {
    let len = closes.len().min(highs.len()).min(lows.len());
    if period == 0 || len < period {
        return Vec::new();
    }

    ((period - 1)..len)
        .map(|i| {
            let start = i + 1 - period;
            let (highest_high, lowest_low) = window_range(&highs[start..=i], &lows[start..=i]);

            if highest_high > lowest_low {
                ((highest_high - closes[i]) / (highest_high - lowest_low) * -100.0)
                    .clamp(-100.0, 0.0)
            } else {
                FLAT_RANGE_R
            }
        })
        .collect()
}
