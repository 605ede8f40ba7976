//! Momentum classification.
//!
//! Each model turns one timeframe's candles into a [`MomentumSignal`]. The
//! [`SignalClassifier`] runs every configured model over every configured
//! timeframe to fill a [`SignalGrid`]. New models are added by implementing
//! [`MomentumModel`] and registering them with the classifier.

pub mod model_a;
pub mod model_b;

pub use model_a::{StochasticCombo, StochasticComboParams};
pub use model_b::{RsiCrossover, RsiCrossoverParams};

use crate::types::{Candle, ModelKind, MomentumSignal, SignalGrid, Timeframe};
use std::collections::HashMap;
use tracing::trace;

/// Trait for momentum classification strategies.
pub trait MomentumModel: Send + Sync {
    /// Grid row this model fills.
    fn kind(&self) -> ModelKind;

    /// Minimum number of candles needed for a non-neutral reading.
    fn min_history(&self) -> usize;

    /// Classify one timeframe's candles.
    /// Insufficient history yields [`MomentumSignal::Neutral`], never an error.
    fn classify(&self, candles: &[Candle]) -> MomentumSignal;
}

/// Direction of the last step of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slope {
    Rising,
    Falling,
    Flat,
}

impl Slope {
    /// Slope of the last two points, `None` with fewer than two.
    pub(crate) fn of(series: &[f64]) -> Option<Self> {
        let (prev, cur) = crate::services::indicators::last_pair(series)?;
        Some(if cur > prev {
            Slope::Rising
        } else if cur < prev {
            Slope::Falling
        } else {
            Slope::Flat
        })
    }
}

/// Runs every registered model across a set of timeframes.
pub struct SignalClassifier {
    models: Vec<Box<dyn MomentumModel>>,
}

impl SignalClassifier {
    pub fn new(models: Vec<Box<dyn MomentumModel>>) -> Self {
        Self { models }
    }

    /// Model A and Model B with default parameters, and the given Model B margin.
    pub fn with_defaults(model_b_margin: f64) -> Self {
        Self::new(vec![
            Box::new(StochasticCombo::default()),
            Box::new(RsiCrossover::new(RsiCrossoverParams {
                margin: model_b_margin,
                ..RsiCrossoverParams::default()
            })),
        ])
    }

    pub fn models(&self) -> impl Iterator<Item = &dyn MomentumModel> {
        self.models.iter().map(|m| m.as_ref())
    }

    /// Fill one cell per (model, timeframe).
    ///
    /// Timeframes with no series in `candles` are classified on an empty
    /// series, which reads neutral.
    pub fn classify_grid(
        &self,
        timeframes: &[Timeframe],
        candles: &HashMap<Timeframe, Vec<Candle>>,
    ) -> SignalGrid {
        let mut grid = SignalGrid::new();

        for timeframe in timeframes {
            let series = candles.get(timeframe).map(Vec::as_slice).unwrap_or(&[]);

            for model in &self.models {
                let signal = model.classify(series);
                trace!(
                    model = model.kind().label(),
                    timeframe = %timeframe,
                    bars = series.len(),
                    signal = signal.label(),
                    "Classified"
                );
                grid.set(model.kind(), *timeframe, signal);
            }
        }

        grid
    }
}
