//! Model B: RSI smoothing crossover.

use super::MomentumModel;
use crate::services::indicators::{ema, rsi, sma};
use crate::types::{Candle, ModelKind, MomentumSignal};

/// Parameters for [`RsiCrossover`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RsiCrossoverParams {
    pub rsi_period: usize,
    pub fast_period: usize,
    pub slow_period: usize,
    /// Minimum gap, in RSI points, between the fast and slow smoothing.
    pub margin: f64,
}

impl Default for RsiCrossoverParams {
    fn default() -> Self {
        Self {
            rsi_period: 13,
            fast_period: 2,
            slow_period: 34,
            margin: 5.0,
        }
    }
}

/// RSI smoothing crossover.
///
/// Computes RSI on closes, then an EMA and an SMA of that RSI series. Bullish
/// when the EMA leads the SMA by at least `margin`, bearish when it trails by
/// at least `margin`, neutral otherwise.
#[derive(Debug, Clone, Default)]
pub struct RsiCrossover {
    params: RsiCrossoverParams,
}

impl RsiCrossover {
    pub fn new(params: RsiCrossoverParams) -> Self {
        Self { params }
    }

    /// Latest (fast, slow) smoothing of the RSI series.
    pub fn smoothed(&self, closes: &[f64]) -> Option<(f64, f64)> {
        let p = &self.params;
        let rsi_series = rsi(closes, p.rsi_period);
        let fast = *ema(&rsi_series, p.fast_period).last()?;
        let slow = *sma(&rsi_series, p.slow_period).last()?;
        Some((fast, slow))
    }
}

impl MomentumModel for RsiCrossover {
    fn kind(&self) -> ModelKind {
        ModelKind::ModelB
    }

    fn min_history(&self) -> usize {
        // RSI needs period + 1 closes for its first point, the slow SMA then
        // needs slow_period RSI points.
        self.params.rsi_period + self.params.slow_period.max(self.params.fast_period)
    }

    fn classify(&self, candles: &[Candle]) -> MomentumSignal {
        if candles.len() < self.min_history() {
            return MomentumSignal::Neutral;
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let Some((fast, slow)) = self.smoothed(&closes) else {
            return MomentumSignal::Neutral;
        };

        let gap = fast - slow;
        if gap >= self.params.margin {
            MomentumSignal::Bullish
        } else if gap <= -self.params.margin {
            MomentumSignal::Bearish
        } else {
            MomentumSignal::Neutral
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, close)| Candle {
                time: i as i64 * 300,
                open: *close,
                high: close + 0.5,
                low: close - 0.5,
                close: *close,
                volume: 1_000.0,
            })
            .collect()
    }

    /// Sideways chop followed by a sharp move in one direction.
    fn chop_then_move(up: bool) -> Vec<Candle> {
        let mut closes = Vec::new();
        let mut price = 50.0;
        for i in 0..60 {
            price += if i % 2 == 0 { 1.0 } else { -1.0 };
            closes.push(price);
        }
        for _ in 0..8 {
            price += if up { 2.0 } else { -2.0 };
            closes.push(price);
        }
        candles_from_closes(&closes)
    }

    #[test]
    fn test_model_b_rally_is_bullish() {
        let model = RsiCrossover::default();
        assert_eq!(model.classify(&chop_then_move(true)), MomentumSignal::Bullish);
    }

    #[test]
    fn test_model_b_selloff_is_bearish() {
        let model = RsiCrossover::default();
        assert_eq!(model.classify(&chop_then_move(false)), MomentumSignal::Bearish);
    }

    #[test]
    fn test_model_b_chop_is_neutral() {
        let closes: Vec<f64> = (0..80).map(|i| if i % 2 == 0 { 50.0 } else { 51.0 }).collect();
        let model = RsiCrossover::default();
        assert_eq!(model.classify(&candles_from_closes(&closes)), MomentumSignal::Neutral);
    }

    #[test]
    fn test_model_b_insufficient_history_is_neutral() {
        let model = RsiCrossover::default();
        assert_eq!(model.min_history(), 47);
        let short = chop_then_move(true);
        assert_eq!(model.classify(&short[..46]), MomentumSignal::Neutral);
    }

    #[test]
    fn test_model_b_margin_is_configurable() {
        let candles = chop_then_move(true);
        let strict = RsiCrossover::new(RsiCrossoverParams {
            margin: 90.0,
            ..RsiCrossoverParams::default()
        });
        assert_eq!(strict.classify(&candles), MomentumSignal::Neutral);
    }

    #[test]
    fn test_model_b_smoothed_values_in_rsi_range() {
        let candles = chop_then_move(true);
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let (fast, slow) = RsiCrossover::default().smoothed(&closes).unwrap();
        assert!((0.0..=100.0).contains(&fast));
        assert!((0.0..=100.0).contains(&slow));
        assert!(fast > slow);
    }
}
