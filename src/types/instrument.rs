use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::SignalGrid;

/// Validated quote record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub current_price: f64,
    pub previous_close: f64,
    /// Session volume, when the provider reports it.
    pub volume: Option<f64>,
}

impl Quote {
    pub fn change_percent(&self) -> f64 {
        change_percent(self.current_price, self.previous_close)
    }
}

/// Validated company profile record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    /// Shares outstanding, in millions.
    pub shares_outstanding: Option<f64>,
    /// Market capitalisation, in millions.
    pub market_cap_millions: Option<f64>,
}

impl CompanyProfile {
    /// Fewer implied shares than this reads as bad data, not a real float.
    pub const MIN_PLAUSIBLE_SHARES: f64 = 1_000_000.0;

    /// Tradable share estimate: outstanding shares scaled by `float_ratio`.
    ///
    /// Falls back to market cap over price when shares outstanding is missing
    /// or implausibly small. `None` when neither yields a plausible count.
    pub fn estimated_float(&self, price: f64, float_ratio: f64) -> Option<f64> {
        let from_shares = self
            .shares_outstanding
            .map(|millions| millions * 1_000_000.0)
            .filter(|shares| *shares >= Self::MIN_PLAUSIBLE_SHARES);

        let from_market_cap = || {
            let cap = self.market_cap_millions?;
            if price <= 0.0 {
                return None;
            }
            Some(cap * 1_000_000.0 / price).filter(|shares| *shares >= Self::MIN_PLAUSIBLE_SHARES)
        };

        from_shares
            .or_else(from_market_cap)
            .map(|shares| shares * float_ratio)
    }
}

/// One company news item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub headline: String,
    pub summary: String,
    pub url: String,
    pub datetime: DateTime<Utc>,
}

/// A dated news headline qualifying as a catalyst.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalyst {
    pub headline: String,
    pub published_at: DateTime<Utc>,
}

impl Catalyst {
    const MAX_HEADLINE_CHARS: usize = 100;

    /// Most recent news item, with its headline trimmed for display.
    pub fn latest(news: &[NewsItem]) -> Option<Self> {
        let item = news
            .iter()
            .filter(|n| !n.headline.trim().is_empty())
            .max_by_key(|n| n.datetime)?;

        let headline = item.headline.trim();
        let headline = if headline.chars().count() > Self::MAX_HEADLINE_CHARS {
            let cut: String = headline.chars().take(Self::MAX_HEADLINE_CHARS).collect();
            format!("{}...", cut.trim_end())
        } else {
            headline.to_string()
        };

        Some(Self {
            headline,
            published_at: item.datetime,
        })
    }
}

/// Percentage move from `previous_close` to `price`.
pub fn change_percent(price: f64, previous_close: f64) -> f64 {
    if previous_close > 0.0 {
        (price - previous_close) / previous_close * 100.0
    } else {
        0.0
    }
}

/// Scan-time view of one instrument.
///
/// Created fresh every cycle and never mutated afterwards. `change_percent`
/// is always derived from `price` and `previous_close`, including when a
/// snapshot is deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "SnapshotParts")]
pub struct InstrumentSnapshot {
    symbol: String,
    price: f64,
    previous_close: f64,
    change_percent: f64,
    volume: f64,
    average_volume: f64,
    estimated_float: Option<f64>,
    catalyst: Option<Catalyst>,
    signal_grid: SignalGrid,
    scan_timestamp: DateTime<Utc>,
}

/// Inputs for [`InstrumentSnapshot::new`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotParts {
    pub symbol: String,
    pub price: f64,
    pub previous_close: f64,
    pub volume: f64,
    pub average_volume: f64,
    #[serde(default)]
    pub estimated_float: Option<f64>,
    #[serde(default)]
    pub catalyst: Option<Catalyst>,
    #[serde(default)]
    pub signal_grid: SignalGrid,
    pub scan_timestamp: DateTime<Utc>,
}

impl From<SnapshotParts> for InstrumentSnapshot {
    fn from(parts: SnapshotParts) -> Self {
        Self::new(parts)
    }
}

impl InstrumentSnapshot {
    pub fn new(parts: SnapshotParts) -> Self {
        Self {
            change_percent: change_percent(parts.price, parts.previous_close),
            symbol: parts.symbol.to_uppercase(),
            price: parts.price,
            previous_close: parts.previous_close,
            volume: parts.volume,
            average_volume: parts.average_volume,
            estimated_float: parts.estimated_float,
            catalyst: parts.catalyst,
            signal_grid: parts.signal_grid,
            scan_timestamp: parts.scan_timestamp,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn previous_close(&self) -> f64 {
        self.previous_close
    }

    pub fn change_percent(&self) -> f64 {
        self.change_percent
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn average_volume(&self) -> f64 {
        self.average_volume
    }

    /// Current volume relative to the average baseline; 0 when no baseline exists.
    pub fn volume_spike(&self) -> f64 {
        if self.average_volume > 0.0 {
            self.volume / self.average_volume
        } else {
            0.0
        }
    }

    pub fn estimated_float(&self) -> Option<f64> {
        self.estimated_float
    }

    pub fn catalyst(&self) -> Option<&Catalyst> {
        self.catalyst.as_ref()
    }

    pub fn catalyst_headline(&self) -> Option<&str> {
        self.catalyst.as_ref().map(|c| c.headline.as_str())
    }

    pub fn signal_grid(&self) -> &SignalGrid {
        &self.signal_grid
    }

    pub fn scan_timestamp(&self) -> DateTime<Utc> {
        self.scan_timestamp
    }
}

/// Ranking order: descending change percent, ties by ascending symbol.
pub fn rank_order(a: &InstrumentSnapshot, b: &InstrumentSnapshot) -> Ordering {
    b.change_percent
        .total_cmp(&a.change_percent)
        .then_with(|| a.symbol.cmp(&b.symbol))
}

/// Ranked, truncated sequence of snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub instruments: Vec<InstrumentSnapshot>,
}

impl ScanResult {
    /// Sort by the ranking key and keep the first `top_n`.
    ///
    /// The output does not depend on the order snapshots arrive in.
    pub fn rank(mut snapshots: Vec<InstrumentSnapshot>, top_n: usize) -> Self {
        snapshots.sort_by(rank_order);
        snapshots.truncate(top_n);
        Self {
            instruments: snapshots,
        }
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.instruments.iter().map(|s| s.symbol()).collect()
    }
}
