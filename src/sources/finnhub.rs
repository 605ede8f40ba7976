//! Finnhub API client for US equities.
//!
//! Provides quotes, historical candles, company profiles, company news and
//! the exchange symbol listing. Payloads are read as loose JSON and checked by
//! the `parse_*` functions before anything downstream sees them.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{MarketDataProvider, UniverseSource};
use crate::error::{ProviderError, ScanError};
use crate::types::{Candle, CompanyProfile, NewsItem, Quote};

pub const DEFAULT_BASE_URL: &str = "https://finnhub.io/api/v1";
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Finnhub REST client.
pub struct FinnhubClient {
    client: Client,
    base_url: String,
    api_key: String,
    universe_limit: usize,
}

impl FinnhubClient {
    /// Create a client. A missing key or endpoint is a configuration error.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        universe_limit: usize,
    ) -> Result<Self, ScanError> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        let api_key = api_key.into().trim().to_string();

        if api_key.is_empty() {
            return Err(ScanError::Configuration("FINNHUB_API_KEY not set".into()));
        }
        if base_url.is_empty() {
            return Err(ScanError::Configuration("FINNHUB_BASE_URL is empty".into()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ScanError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_key,
            universe_limit,
        })
    }

    /// GET an endpoint and return its JSON body.
    async fn get_json(&self, path: &str, params: &[(&str, String)]) -> Result<Value, ProviderError> {
        let url = format!("{}/{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("token", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            return Err(ProviderError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            return Err(ProviderError::Unavailable(format!("{} returned {}", path, status)));
        }

        let body = response.json::<Value>().await?;
        Ok(body)
    }
}

#[async_trait]
impl MarketDataProvider for FinnhubClient {
    fn name(&self) -> &str {
        "finnhub"
    }

    async fn quote(&self, symbol: &str) -> Result<Quote, ProviderError> {
        let body = self.get_json("quote", &[("symbol", symbol.to_string())]).await?;
        parse_quote(&body)
    }

    async fn candles(
        &self,
        symbol: &str,
        resolution: &str,
        from: i64,
        to: i64,
    ) -> Result<Vec<Candle>, ProviderError> {
        let body = self
            .get_json(
                "stock/candle",
                &[
                    ("symbol", symbol.to_string()),
                    ("resolution", resolution.to_string()),
                    ("from", from.to_string()),
                    ("to", to.to_string()),
                ],
            )
            .await?;
        let candles = parse_candles(&body)?;
        debug!(symbol, resolution, bars = candles.len(), "Fetched candles");
        Ok(candles)
    }

    async fn profile(&self, symbol: &str) -> Result<CompanyProfile, ProviderError> {
        let body = self
            .get_json("stock/profile2", &[("symbol", symbol.to_string())])
            .await?;
        parse_profile(&body)
    }

    async fn news(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NewsItem>, ProviderError> {
        let body = self
            .get_json(
                "company-news",
                &[
                    ("symbol", symbol.to_string()),
                    ("from", from.to_string()),
                    ("to", to.to_string()),
                ],
            )
            .await?;
        parse_news(&body)
    }
}

#[async_trait]
impl UniverseSource for FinnhubClient {
    async fn symbols(&self) -> Result<Vec<String>, ProviderError> {
        let body = self
            .get_json("stock/symbol", &[("exchange", "US".to_string())])
            .await?;
        parse_symbols(&body, self.universe_limit)
    }
}

fn malformed(reason: impl Into<String>) -> ProviderError {
    ProviderError::Malformed(reason.into())
}

/// Finite number at `key`, if present.
fn number(body: &Value, key: &str) -> Option<f64> {
    body.get(key).and_then(Value::as_f64).filter(|v| v.is_finite())
}

/// Finite strictly positive number at `key`.
fn positive(body: &Value, key: &str) -> Result<f64, ProviderError> {
    number(body, key)
        .filter(|v| *v > 0.0)
        .ok_or_else(|| malformed(format!("missing or invalid '{}'", key)))
}

/// Validate a `/quote` payload.
///
/// Current price (`c`) and previous close (`pc`) must be finite and positive;
/// volume (`v`) is optional.
pub fn parse_quote(body: &Value) -> Result<Quote, ProviderError> {
    let current_price = positive(body, "c")?;
    let previous_close = positive(body, "pc")?;
    let volume = number(body, "v").filter(|v| *v >= 0.0);

    Ok(Quote {
        current_price,
        previous_close,
        volume,
    })
}

/// Numeric array at `key`; every element must be a finite number.
fn numeric_array(body: &Value, key: &str) -> Result<Vec<f64>, ProviderError> {
    let items = body
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| malformed(format!("missing '{}' array", key)))?;

    items
        .iter()
        .map(|v| {
            v.as_f64()
                .filter(|n| n.is_finite())
                .ok_or_else(|| malformed(format!("non-numeric value in '{}'", key)))
        })
        .collect()
}

/// Validate a `/stock/candle` payload.
///
/// A status other than `ok`, or empty arrays, mean no data and yield an empty
/// series. Output is sorted by time with duplicate timestamps dropped.
pub fn parse_candles(body: &Value) -> Result<Vec<Candle>, ProviderError> {
    if body.get("s").and_then(Value::as_str) != Some("ok") {
        return Ok(Vec::new());
    }

    let times = numeric_array(body, "t")?;
    if times.is_empty() {
        return Ok(Vec::new());
    }

    let opens = numeric_array(body, "o")?;
    let highs = numeric_array(body, "h")?;
    let lows = numeric_array(body, "l")?;
    let closes = numeric_array(body, "c")?;
    let volumes = numeric_array(body, "v")?;

    let n = times.len();
    if [&opens, &highs, &lows, &closes, &volumes]
        .iter()
        .any(|col| col.len() != n)
    {
        return Err(malformed("candle arrays have mismatched lengths"));
    }

    let mut candles: Vec<Candle> = (0..n)
        .map(|i| Candle {
            time: times[i] as i64,
            open: opens[i],
            high: highs[i],
            low: lows[i],
            close: closes[i],
            volume: volumes[i],
        })
        .collect();

    candles.sort_by_key(|c| c.time);
    candles.dedup_by_key(|c| c.time);

    Ok(candles)
}

/// Validate a `/stock/profile2` payload.
///
/// Unknown symbols come back as an empty object, which parses to a profile
/// with nothing known.
pub fn parse_profile(body: &Value) -> Result<CompanyProfile, ProviderError> {
    if !body.is_object() {
        return Err(malformed("profile is not an object"));
    }

    Ok(CompanyProfile {
        shares_outstanding: number(body, "shareOutstanding").filter(|v| *v > 0.0),
        market_cap_millions: number(body, "marketCapitalization").filter(|v| *v > 0.0),
    })
}

/// Validate a `/company-news` payload.
///
/// Items without a headline or a valid timestamp are dropped.
pub fn parse_news(body: &Value) -> Result<Vec<NewsItem>, ProviderError> {
    let items = body
        .as_array()
        .ok_or_else(|| malformed("news is not an array"))?;

    let text = |item: &Value, key: &str| {
        item.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    Ok(items
        .iter()
        .filter_map(|item| {
            let headline = text(item, "headline");
            if headline.trim().is_empty() {
                return None;
            }
            let datetime = DateTime::from_timestamp(item.get("datetime")?.as_i64()?, 0)?;
            Some(NewsItem {
                headline,
                summary: text(item, "summary"),
                url: text(item, "url"),
                datetime,
            })
        })
        .collect())
}

/// Validate a `/stock/symbol` payload, keeping at most `limit` symbols.
pub fn parse_symbols(body: &Value, limit: usize) -> Result<Vec<String>, ProviderError> {
    let items = body
        .as_array()
        .ok_or_else(|| malformed("symbol listing is not an array"))?;

    let mut symbols: Vec<String> = Vec::new();
    for item in items {
        if symbols.len() >= limit {
            break;
        }
        let Some(symbol) = item.get("symbol").and_then(Value::as_str) else {
            continue;
        };
        let symbol = symbol.trim().to_uppercase();
        if !symbol.is_empty() && !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }

    Ok(symbols)
}
