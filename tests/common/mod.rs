//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use momoscan::error::ProviderError;
use momoscan::services::{RetryPolicy, ScanSettings};
use momoscan::sources::{MarketDataProvider, UniverseSource};
use momoscan::types::{Candle, CompanyProfile, NewsItem, Quote};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

const DAY: i64 = 86_400;

/// Per-symbol behaviour of [`MockProvider`].
#[derive(Debug, Clone)]
pub struct SymbolFixture {
    pub price: f64,
    pub previous_close: f64,
    pub volume: f64,
    /// Whether the quote carries `volume`.
    pub volume_in_quote: bool,
    /// Volume of the last finished daily session.
    pub last_session_volume: f64,
    /// Volume of a daily bar for the current day, if the provider has one.
    pub today_volume: Option<f64>,
    /// Shares outstanding in millions.
    pub shares_millions: Option<f64>,
    pub has_news: bool,
    pub fail_quote: bool,
    /// Candle payloads fail validation.
    pub malformed_candles: bool,
    pub quote_delay: Duration,
    /// Number of quote calls answered with a rate-limit error first.
    pub rate_limited_quotes: u32,
}

impl SymbolFixture {
    /// Passes every default criterion: 6x volume, 4M float, fresh news.
    pub fn passing(price: f64, previous_close: f64) -> Self {
        Self {
            price,
            previous_close,
            volume: 6_000_000.0,
            volume_in_quote: true,
            last_session_volume: 1_000_000.0,
            today_volume: None,
            shares_millions: Some(5.0),
            has_news: true,
            fail_quote: false,
            malformed_candles: false,
            quote_delay: Duration::ZERO,
            rate_limited_quotes: 0,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_quote: true,
            ..Self::passing(10.0, 9.0)
        }
    }
}

/// In-process provider serving synthetic data.
pub struct MockProvider {
    fixtures: HashMap<String, SymbolFixture>,
    rate_limits: Mutex<HashMap<String, u32>>,
    calls: Mutex<Vec<(String, &'static str)>>,
    news_time: DateTime<Utc>,
}

impl MockProvider {
    pub fn new(fixtures: Vec<(&str, SymbolFixture)>) -> Self {
        let rate_limits = fixtures
            .iter()
            .map(|(s, f)| (s.to_string(), f.rate_limited_quotes))
            .collect();
        Self {
            fixtures: fixtures
                .into_iter()
                .map(|(s, f)| (s.to_string(), f))
                .collect(),
            rate_limits: Mutex::new(rate_limits),
            calls: Mutex::new(Vec::new()),
            news_time: Utc::now() - ChronoDuration::hours(1),
        }
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.fixtures.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn calls_for(&self, symbol: &str, call: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, c)| s == symbol && *c == call)
            .count()
    }

    fn record(&self, symbol: &str, call: &'static str) {
        self.calls.lock().unwrap().push((symbol.to_string(), call));
    }

    fn fixture(&self, symbol: &str) -> Result<&SymbolFixture, ProviderError> {
        self.fixtures
            .get(symbol)
            .ok_or_else(|| ProviderError::Unavailable(format!("unknown symbol {}", symbol)))
    }
}

/// Accelerating rise ending just before `to`.
pub fn rising_bars(to: i64, step: i64, count: usize) -> Vec<Candle> {
    (0..count)
        .map(|i| {
            let close = 10.0 + 0.01 * (i * i) as f64;
            Candle {
                time: to - (count - i) as i64 * step,
                open: close,
                high: close + 0.1,
                low: close - 0.1,
                close,
                volume: 10_000.0,
            }
        })
        .collect()
}

/// 60 completed daily bars of 1M shares each, ending the day before `to`.
///
/// The last finished session trades `last_session` shares. A bar for the day
/// of `to` is appended when `today` is set.
pub fn daily_bars(to: i64, last_session: f64, today: Option<f64>) -> Vec<Candle> {
    let day_start = to.div_euclid(DAY) * DAY;
    let bar = |time: i64, volume: f64| Candle {
        time,
        open: 9.0,
        high: 9.5,
        low: 8.5,
        close: 9.0,
        volume,
    };

    let mut bars: Vec<Candle> = (2..=60)
        .rev()
        .map(|d| bar(day_start - d * DAY, 1_000_000.0))
        .collect();
    bars.push(bar(day_start - DAY, last_session));
    if let Some(volume) = today {
        bars.push(bar(day_start, volume));
    }
    bars
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn quote(&self, symbol: &str) -> Result<Quote, ProviderError> {
        self.record(symbol, "quote");
        let fixture = self.fixture(symbol)?.clone();

        if !fixture.quote_delay.is_zero() {
            tokio::time::sleep(fixture.quote_delay).await;
        }

        let limited = {
            let mut limits = self.rate_limits.lock().unwrap();
            match limits.get_mut(symbol) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };
        if limited {
            return Err(ProviderError::RateLimited {
                retry_after_secs: None,
            });
        }

        if fixture.fail_quote {
            return Err(ProviderError::Unavailable("connection reset".into()));
        }

        Ok(Quote {
            current_price: fixture.price,
            previous_close: fixture.previous_close,
            volume: fixture.volume_in_quote.then_some(fixture.volume),
        })
    }

    async fn candles(
        &self,
        symbol: &str,
        resolution: &str,
        _from: i64,
        to: i64,
    ) -> Result<Vec<Candle>, ProviderError> {
        self.record(symbol, "candles");
        let fixture = self.fixture(symbol)?;
        if fixture.malformed_candles {
            return Err(ProviderError::Malformed("volume array length mismatch".into()));
        }

        let bars = match resolution {
            "D" => daily_bars(to, fixture.last_session_volume, fixture.today_volume),
            minutes => {
                let minutes: i64 = minutes
                    .parse()
                    .map_err(|_| ProviderError::Malformed("bad resolution".into()))?;
                rising_bars(to, minutes * 60, 80)
            }
        };
        Ok(bars)
    }

    async fn profile(&self, symbol: &str) -> Result<CompanyProfile, ProviderError> {
        self.record(symbol, "profile");
        let fixture = self.fixture(symbol)?;
        Ok(CompanyProfile {
            shares_outstanding: fixture.shares_millions,
            market_cap_millions: None,
        })
    }

    async fn news(
        &self,
        symbol: &str,
        _from: NaiveDate,
        _to: NaiveDate,
    ) -> Result<Vec<NewsItem>, ProviderError> {
        self.record(symbol, "news");
        let fixture = self.fixture(symbol)?;
        if !fixture.has_news {
            return Ok(Vec::new());
        }
        Ok(vec![NewsItem {
            headline: format!("{} announces offering", symbol),
            summary: String::new(),
            url: String::new(),
            datetime: self.news_time,
        }])
    }
}

/// Universe source that always fails.
pub struct FailingUniverse;

#[async_trait]
impl UniverseSource for FailingUniverse {
    async fn symbols(&self) -> Result<Vec<String>, ProviderError> {
        Err(ProviderError::Unavailable("listing endpoint down".into()))
    }
}

/// Settings with a generous request budget and near-instant retries.
pub fn fast_settings() -> ScanSettings {
    ScanSettings {
        requests_per_minute: 600_000,
        retry: RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        },
        scan_timeout: Duration::from_secs(10),
        ..ScanSettings::default()
    }
}
