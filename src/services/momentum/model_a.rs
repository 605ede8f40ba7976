//! Model A: fast/slow stochastic plus Williams %R combo.

use super::{MomentumModel, Slope};
use crate::services::indicators::{last_pair, stochastic, williams_r, StochasticSeries};
use crate::types::{Candle, CandleColumns, ModelKind, MomentumSignal};

/// Parameters for [`StochasticCombo`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StochasticComboParams {
    pub fast_k: usize,
    pub fast_d: usize,
    pub slow_k: usize,
    pub slow_d: usize,
    pub williams_period: usize,
    /// %R must be above this to confirm a long.
    pub williams_floor: f64,
    /// %R must be below this to confirm a short.
    pub williams_ceiling: f64,
    pub min_history: usize,
}

impl Default for StochasticComboParams {
    fn default() -> Self {
        Self {
            fast_k: 8,
            fast_d: 3,
            slow_k: 38,
            slow_d: 3,
            williams_period: 38,
            williams_floor: -90.0,
            williams_ceiling: -10.0,
            min_history: 50,
        }
    }
}

/// Stochastic/Williams combo.
///
/// Bullish when fast %K and %D, slow %K and %D, and %R are all rising with %R
/// above the floor. Bearish on the symmetric falling condition with %R below
/// the ceiling. Neutral otherwise.
#[derive(Debug, Clone, Default)]
pub struct StochasticCombo {
    params: StochasticComboParams,
}

impl StochasticCombo {
    pub fn new(params: StochasticComboParams) -> Self {
        Self { params }
    }

    /// Both %K and %D moved in `slope` on the last bar.
    fn stochastic_agrees(series: &StochasticSeries, slope: Slope) -> bool {
        Slope::of(&series.k) == Some(slope) && Slope::of(&series.d) == Some(slope)
    }
}

impl MomentumModel for StochasticCombo {
    fn kind(&self) -> ModelKind {
        ModelKind::ModelA
    }

    fn min_history(&self) -> usize {
        self.params.min_history
    }

    fn classify(&self, candles: &[Candle]) -> MomentumSignal {
        if candles.len() < self.min_history() {
            return MomentumSignal::Neutral;
        }

        let p = &self.params;
        let cols = CandleColumns::from_candles(candles);

        let fast = stochastic(&cols.highs, &cols.lows, &cols.closes, p.fast_k, p.fast_d);
        let slow = stochastic(&cols.highs, &cols.lows, &cols.closes, p.slow_k, p.slow_d);
        let wr = williams_r(&cols.highs, &cols.lows, &cols.closes, p.williams_period);

        // Need at least 2 points per sub-indicator to read a direction.
        if fast.d.len() < 2 || slow.d.len() < 2 || wr.len() < 2 {
            return MomentumSignal::Neutral;
        }

        let Some((wr_prev, wr_now)) = last_pair(&wr) else {
            return MomentumSignal::Neutral;
        };

        let long = Self::stochastic_agrees(&fast, Slope::Rising)
            && Self::stochastic_agrees(&slow, Slope::Rising)
            && wr_now > wr_prev
            && wr_now > p.williams_floor;

        let short = Self::stochastic_agrees(&fast, Slope::Falling)
            && Self::stochastic_agrees(&slow, Slope::Falling)
            && wr_now < wr_prev
            && wr_now < p.williams_ceiling;

        if long {
            MomentumSignal::Bullish
        } else if short {
            MomentumSignal::Bearish
        } else {
            MomentumSignal::Neutral
        }
    }
}
