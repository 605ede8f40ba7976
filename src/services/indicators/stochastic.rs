//! Stochastic Oscillator indicator.

use super::{sma, window_range};

/// Value returned for a window whose high equals its low.
pub const FLAT_RANGE_K: f64 = 50.0;

/// %K and %D series of a stochastic oscillator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StochasticSeries {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
}

/// Stochastic Oscillator.
///
/// Compares closing price to the price range over a rolling window:
/// %K = (Close - Lowest Low) / (Highest High - Lowest Low) * 100
///
/// %D is the `d_period` simple moving average of %K. %K is empty when there
/// are fewer than `k_period` bars; %D is empty when there are fewer than
/// `d_period` %K points. Values are bounded to [0, 100].
pub fn stochastic(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    k_period: usize,
    d_period: usize,
) -> StochasticSeries {
    let len = closes.len().min(highs.len()).min(lows.len());
    if k_period == 0 || len < k_period {
        return StochasticSeries::default();
    }

    let mut k_values = Vec::with_capacity(len + 1 - k_period);

    for i in (k_period - 1)..len {
        let start = i + 1 - k_period;
        let (highest_high, lowest_low) = window_range(&highs[start..=i], &lows[start..=i]);

        let k = if highest_high > lowest_low {
            ((closes[i] - lowest_low) / (highest_high - lowest_low) * 100.0).clamp(0.0, 100.0)
        } else {
            FLAT_RANGE_K
        };

        k_values.push(k);
    }

    // Rolling sums can drift a hair past the bounds.
    let d_values = sma(&k_values, d_period)
        .into_iter()
        .map(|d| d.clamp(0.0, 100.0))
        .collect();

    StochasticSeries {
        k: k_values,
        d: d_values,
    }
}
