use serde::{Deserialize, Serialize};

/// One OHLCV bar.
///
/// A series of candles for a (symbol, timeframe) pair is ordered by strictly
/// increasing `time` (unix seconds). Gaps are legitimate (market closures) and
/// are never filled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Column views over a candle series, the shape the indicator functions take.
#[derive(Debug, Clone, Default)]
pub struct CandleColumns {
    pub highs: Vec<f64>,
    pub lows: Vec<f64>,
    pub closes: Vec<f64>,
}

impl CandleColumns {
    pub fn from_candles(candles: &[Candle]) -> Self {
        let mut columns = Self {
            highs: Vec::with_capacity(candles.len()),
            lows: Vec::with_capacity(candles.len()),
            closes: Vec::with_capacity(candles.len()),
        };
        for c in candles {
            columns.highs.push(c.high);
            columns.lows.push(c.low);
            columns.closes.push(c.close);
        }
        columns
    }
}

/// Candle aggregation interval used for a signal grid column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "1d")]
    OneDay,
}

impl Timeframe {
    /// The grid used when nothing else is configured.
    pub const DEFAULT_GRID: [Timeframe; 6] = [
        Timeframe::OneMinute,
        Timeframe::FiveMinutes,
        Timeframe::FifteenMinutes,
        Timeframe::OneHour,
        Timeframe::FourHours,
        Timeframe::OneDay,
    ];

    /// Parse from the short label ("1m", "4h", "1d", ...).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "1m" => Some(Self::OneMinute),
            "5m" => Some(Self::FiveMinutes),
            "15m" => Some(Self::FifteenMinutes),
            "30m" => Some(Self::ThirtyMinutes),
            "1h" | "60m" => Some(Self::OneHour),
            "4h" => Some(Self::FourHours),
            "1d" | "d" => Some(Self::OneDay),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::OneHour => "1h",
            Self::FourHours => "4h",
            Self::OneDay => "1d",
        }
    }

    /// Bar length in seconds.
    pub fn seconds(&self) -> i64 {
        match self {
            Self::OneMinute => 60,
            Self::FiveMinutes => 300,
            Self::FifteenMinutes => 900,
            Self::ThirtyMinutes => 1800,
            Self::OneHour => 3600,
            Self::FourHours => 14_400,
            Self::OneDay => 86_400,
        }
    }

    /// Calendar window requested from the provider.
    ///
    /// Sized so that, after nights and weekends are skipped, both momentum
    /// models still see enough bars.
    pub fn lookback_seconds(&self) -> i64 {
        const DAY: i64 = 86_400;
        match self {
            Self::OneMinute => 3 * DAY,
            Self::FiveMinutes => 7 * DAY,
            Self::FifteenMinutes => 14 * DAY,
            Self::ThirtyMinutes => 21 * DAY,
            Self::OneHour => 30 * DAY,
            Self::FourHours => 120 * DAY,
            Self::OneDay => 150 * DAY,
        }
    }

    /// Provider resolution to request and how many of those bars make one of ours.
    ///
    /// The provider has no 4h resolution, so 4h bars are built from 60-minute bars.
    pub fn source_resolution(&self) -> (&'static str, usize) {
        match self {
            Self::OneMinute => ("1", 1),
            Self::FiveMinutes => ("5", 1),
            Self::FifteenMinutes => ("15", 1),
            Self::ThirtyMinutes => ("30", 1),
            Self::OneHour => ("60", 1),
            Self::FourHours => ("60", 4),
            Self::OneDay => ("D", 1),
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Mean volume over a series; 0 for an empty series.
pub fn average_volume(candles: &[Candle]) -> f64 {
    if candles.is_empty() {
        return 0.0;
    }
    candles.iter().map(|c| c.volume).sum::<f64>() / candles.len() as f64
}

/// Merge candles into buckets of `bucket_seconds`, aligned to the unix epoch.
///
/// Input must be ordered by time. Each bucket takes the first open, last close,
/// extreme high/low and summed volume of its members, stamped with the bucket start.
pub fn aggregate(candles: &[Candle], bucket_seconds: i64) -> Vec<Candle> {
    let mut out: Vec<Candle> = Vec::new();
    if bucket_seconds <= 0 {
        return out;
    }

    for c in candles {
        let bucket_time = c.time.div_euclid(bucket_seconds) * bucket_seconds;

        if let Some(last) = out.last_mut() {
            if last.time == bucket_time {
                last.high = last.high.max(c.high);
                last.low = last.low.min(c.low);
                last.close = c.close;
                last.volume += c.volume;
                continue;
            }
        }

        out.push(Candle {
            time: bucket_time,
            ..*c
        });
    }

    out
}
