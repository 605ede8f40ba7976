//! Upstream market data.
//!
//! Defines the provider and universe traits the scanner consumes, plus the
//! implementations that ship with the service.

pub mod finnhub;

pub use finnhub::FinnhubClient;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::ProviderError;
use crate::types::{Candle, CompanyProfile, NewsItem, Quote};

/// Per-symbol market data the scanner needs.
///
/// Implementations validate raw payloads before returning, so callers only
/// ever see fixed records or a [`ProviderError`].
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    async fn quote(&self, symbol: &str) -> Result<Quote, ProviderError>;

    /// Candles at a provider resolution between two unix timestamps.
    ///
    /// No data for the window is an empty series, not an error.
    async fn candles(
        &self,
        symbol: &str,
        resolution: &str,
        from: i64,
        to: i64,
    ) -> Result<Vec<Candle>, ProviderError>;

    async fn profile(&self, symbol: &str) -> Result<CompanyProfile, ProviderError>;

    async fn news(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NewsItem>, ProviderError>;
}

/// Source of the symbols a scan cycle walks.
#[async_trait]
pub trait UniverseSource: Send + Sync {
    async fn symbols(&self) -> Result<Vec<String>, ProviderError>;
}

/// Fixed symbol list, usually from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticUniverse {
    symbols: Vec<String>,
}

impl StaticUniverse {
    /// Trims, uppercases and de-duplicates, keeping first-seen order.
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for symbol in symbols {
            let symbol = symbol.as_ref().trim().to_uppercase();
            if !symbol.is_empty() && !out.contains(&symbol) {
                out.push(symbol);
            }
        }
        Self { symbols: out }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[async_trait]
impl UniverseSource for StaticUniverse {
    async fn symbols(&self) -> Result<Vec<String>, ProviderError> {
        Ok(self.symbols.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_universe_normalizes() {
        let universe = StaticUniverse::new(["aapl", " TSLA ", "", "AAPL", "gme"]);
        assert_eq!(universe.len(), 3);
        assert_eq!(universe.symbols().await.unwrap(), vec!["AAPL", "TSLA", "GME"]);
    }
}
