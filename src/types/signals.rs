use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Timeframe;

/// Directional momentum reading for one (symbol, model, timeframe) cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MomentumSignal {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

impl MomentumSignal {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Bullish => "bullish",
            Self::Bearish => "bearish",
            Self::Neutral => "neutral",
        }
    }
}

/// The momentum models that fill a grid row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Fast/slow stochastic plus Williams %R combo.
    ModelA,
    /// RSI smoothing crossover.
    ModelB,
}

impl ModelKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ModelA => "model_a",
            Self::ModelB => "model_b",
        }
    }
}

/// Per-instrument matrix of (model x timeframe) -> signal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalGrid {
    cells: BTreeMap<ModelKind, BTreeMap<Timeframe, MomentumSignal>>,
}

impl SignalGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, model: ModelKind, timeframe: Timeframe, signal: MomentumSignal) {
        self.cells.entry(model).or_default().insert(timeframe, signal);
    }

    pub fn get(&self, model: ModelKind, timeframe: Timeframe) -> Option<MomentumSignal> {
        self.cells.get(&model)?.get(&timeframe).copied()
    }

    /// Number of populated cells.
    pub fn len(&self) -> usize {
        self.cells.values().map(|row| row.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All cells in (model, timeframe) order.
    pub fn iter(&self) -> impl Iterator<Item = (ModelKind, Timeframe, MomentumSignal)> + '_ {
        self.cells.iter().flat_map(|(model, row)| {
            row.iter()
                .map(move |(timeframe, signal)| (*model, *timeframe, *signal))
        })
    }

    /// Count of cells carrying the given signal.
    pub fn count(&self, signal: MomentumSignal) -> usize {
        self.iter().filter(|(_, _, s)| *s == signal).count()
    }
}
