//! Technical indicator implementations.
//!
//! Pure functions over price/volume columns. Each returns a series aligned to
//! the end of its input (the last element corresponds to the last input bar)
//! and returns an empty series when the input is shorter than its lookback.

pub mod ema;
pub mod rsi;
pub mod sma;
pub mod stochastic;
pub mod williams_r;

pub use ema::ema;
pub use rsi::rsi;
pub use sma::sma;
pub use stochastic::{stochastic, StochasticSeries};
pub use williams_r::williams_r;

/// Highest high and lowest low over `window`.
pub(crate) fn window_range(highs: &[f64], lows: &[f64]) -> (f64, f64) {
    let highest_high = highs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let lowest_low = lows.iter().copied().fold(f64::INFINITY, f64::min);
    (highest_high, lowest_low)
}

/// Last two points of a series as `(previous, current)`.
pub fn last_pair(series: &[f64]) -> Option<(f64, f64)> {
    match series {
        [.., prev, cur] => Some((*prev, *cur)),
        _ => None,
    }
}
