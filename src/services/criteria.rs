//! Criteria evaluation for scan candidates.
//!
//! Ordered predicate chain, cheapest first:
//! 1. Price band
//! 2. Gain threshold
//! 3. Volume spike
//! 4. Float ceiling
//! 5. Catalyst recency
//!
//! The chain stops at the first failing check. Checks 4 and 5 depend on
//! extra upstream fetches, so the scanner runs each check on its own as the
//! data arrives; [`CriteriaEvaluator::evaluate`] runs the whole chain over an
//! assembled snapshot.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Catalyst, InstrumentSnapshot};

/// What to do when float or catalyst data is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingDataPolicy {
    /// Unknown data fails the check.
    #[default]
    FailClosed,
    /// Unknown data skips the check; the snapshot keeps the unknown value.
    Exclude,
}

impl MissingDataPolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "fail_closed" | "fail-closed" | "strict" => Some(Self::FailClosed),
            "exclude" | "skip" => Some(Self::Exclude),
            _ => None,
        }
    }
}

/// Rule set the evaluator checks against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    pub min_price: f64,
    pub max_price: f64,
    pub min_gain_percent: f64,
    pub spike_multiplier: f64,
    pub max_float: f64,
    pub catalyst_lookback_hours: i64,
    pub float_policy: MissingDataPolicy,
    pub catalyst_policy: MissingDataPolicy,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            min_price: 2.0,
            max_price: 20.0,
            min_gain_percent: 10.0,
            spike_multiplier: 5.0,
            max_float: 10_000_000.0,
            catalyst_lookback_hours: 24,
            float_policy: MissingDataPolicy::FailClosed,
            catalyst_policy: MissingDataPolicy::FailClosed,
        }
    }
}

impl RuleSet {
    /// Start of the catalyst window relative to `now`.
    pub fn catalyst_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::hours(self.catalyst_lookback_hours)
    }
}

/// Identifies a check in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Price,
    Gain,
    VolumeSpike,
    Float,
    Catalyst,
}

/// Why a candidate failed. Informational only.
#[derive(Debug, Clone, PartialEq)]
pub enum CriteriaFailure {
    PriceOutOfRange { price: f64 },
    GainBelowThreshold { change_percent: f64 },
    VolumeSpikeBelowThreshold { spike: f64 },
    FloatUnknown,
    FloatAboveCeiling { float: f64 },
    CatalystMissing,
    CatalystStale { published_at: DateTime<Utc> },
}

impl CriteriaFailure {
    pub fn criterion(&self) -> Criterion {
        match self {
            Self::PriceOutOfRange { .. } => Criterion::Price,
            Self::GainBelowThreshold { .. } => Criterion::Gain,
            Self::VolumeSpikeBelowThreshold { .. } => Criterion::VolumeSpike,
            Self::FloatUnknown | Self::FloatAboveCeiling { .. } => Criterion::Float,
            Self::CatalystMissing | Self::CatalystStale { .. } => Criterion::Catalyst,
        }
    }
}

impl std::fmt::Display for CriteriaFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PriceOutOfRange { price } => write!(f, "price {:.2} out of range", price),
            Self::GainBelowThreshold { change_percent } => {
                write!(f, "gain {:.2}% below threshold", change_percent)
            }
            Self::VolumeSpikeBelowThreshold { spike } => {
                write!(f, "volume spike {:.2}x below threshold", spike)
            }
            Self::FloatUnknown => write!(f, "float unknown"),
            Self::FloatAboveCeiling { float } => write!(f, "float {:.0} above ceiling", float),
            Self::CatalystMissing => write!(f, "no catalyst"),
            Self::CatalystStale { published_at } => {
                write!(f, "catalyst from {} outside lookback", published_at)
            }
        }
    }
}

/// Outcome of a check.
pub type CheckResult = Result<(), CriteriaFailure>;

/// Stateless evaluator over a [`RuleSet`].
#[derive(Debug, Clone, Default)]
pub struct CriteriaEvaluator {
    rules: RuleSet,
}

impl CriteriaEvaluator {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Check 1: price within [min, max].
    pub fn check_price(&self, price: f64) -> CheckResult {
        if price >= self.rules.min_price && price <= self.rules.max_price {
            Ok(())
        } else {
            Err(CriteriaFailure::PriceOutOfRange { price })
        }
    }

    /// Check 2: gain at or above the threshold.
    pub fn check_gain(&self, change_percent: f64) -> CheckResult {
        if change_percent >= self.rules.min_gain_percent {
            Ok(())
        } else {
            Err(CriteriaFailure::GainBelowThreshold { change_percent })
        }
    }

    /// Checks 1 and 2, which need only a quote.
    pub fn check_quote(&self, price: f64, change_percent: f64) -> CheckResult {
        self.check_price(price)?;
        self.check_gain(change_percent)
    }

    /// Check 3: volume over average volume at or above the multiplier.
    pub fn check_volume_spike(&self, volume: f64, average_volume: f64) -> CheckResult {
        let spike = if average_volume > 0.0 {
            volume / average_volume
        } else {
            0.0
        };

        if spike >= self.rules.spike_multiplier {
            Ok(())
        } else {
            Err(CriteriaFailure::VolumeSpikeBelowThreshold { spike })
        }
    }

    /// Check 4: float known and at or below the ceiling.
    pub fn check_float(&self, estimated_float: Option<f64>) -> CheckResult {
        match estimated_float {
            Some(float) if float <= self.rules.max_float => Ok(()),
            Some(float) => Err(CriteriaFailure::FloatAboveCeiling { float }),
            None => match self.rules.float_policy {
                MissingDataPolicy::FailClosed => Err(CriteriaFailure::FloatUnknown),
                MissingDataPolicy::Exclude => Ok(()),
            },
        }
    }

    /// Check 5: catalyst present and published within the lookback window.
    pub fn check_catalyst(&self, catalyst: Option<&Catalyst>, now: DateTime<Utc>) -> CheckResult {
        match catalyst {
            Some(c) if c.published_at >= self.rules.catalyst_cutoff(now) => Ok(()),
            Some(c) => Err(CriteriaFailure::CatalystStale {
                published_at: c.published_at,
            }),
            None => match self.rules.catalyst_policy {
                MissingDataPolicy::FailClosed => Err(CriteriaFailure::CatalystMissing),
                MissingDataPolicy::Exclude => Ok(()),
            },
        }
    }

    /// Run the full chain over a snapshot, using its scan timestamp as "now".
    pub fn evaluate(&self, snapshot: &InstrumentSnapshot) -> CheckResult {
        self.check_price(snapshot.price())?;
        self.check_gain(snapshot.change_percent())?;
        self.check_volume_spike(snapshot.volume(), snapshot.average_volume())?;
        self.check_float(snapshot.estimated_float())?;
        self.check_catalyst(snapshot.catalyst(), snapshot.scan_timestamp())
    }
}
