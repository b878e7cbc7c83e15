//! Stock market data.
//!
//! [`StockProvider`] is the seam the tool resolvers call through; the
//! shipped implementation is [`YahooFinance`].

mod table;
pub mod yahoo;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::StatusCode;
use thiserror::Error;

pub use yahoo::YahooFinance;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("request to stock provider failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("stock provider returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("stock provider error {code}: {description}")]
    Provider { code: String, description: String },

    #[error("failed to decode stock provider response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("no price data for {0}")]
    NoData(String),
}

/// One daily OHLCV row.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub timestamp: DateTime<FixedOffset>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Time-ordered OHLCV series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceHistory {
    pub bars: Vec<PriceBar>,
}

impl PriceHistory {
    pub fn new(bars: Vec<PriceBar>) -> Self {
        Self { bars }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    /// Plain text table, one line per bar under a header line.
    pub fn to_text_table(&self) -> String {
        table::render(self)
    }
}

#[async_trait]
pub trait StockProvider: Send + Sync {
    /// Series for `ticker` over a provider period such as `1mo` or `1y`.
    async fn history(&self, ticker: &str, period: &str) -> Result<PriceHistory, ProviderError>;

    /// Most recent daily close.
    async fn latest_close(&self, symbol: &str) -> Result<f64, ProviderError> {
        self.history(symbol, "1d")
            .await?
            .last_close()
            .ok_or_else(|| ProviderError::NoData(symbol.to_string()))
    }
}

/// Map loose month spellings onto the provider vocabulary.
pub fn normalize_period(period: &str) -> String {
    let p = period.trim().to_ascii_lowercase();
    match p.as_str() {
        "1m" => "1mo".to_string(),
        "3m" => "3mo".to_string(),
        "6m" => "6mo".to_string(),
        _ => p,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct FixedHistory(PriceHistory);

    #[async_trait]
    impl StockProvider for FixedHistory {
        async fn history(&self, _ticker: &str, _period: &str) -> Result<PriceHistory, ProviderError> {
            Ok(self.0.clone())
        }
    }

    fn bar(day: u32, close: f64) -> PriceBar {
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        PriceBar {
            timestamp: tz.with_ymd_and_hms(2024, 1, day, 9, 30, 0).unwrap(),
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 1_000,
        }
    }

    #[tokio::test]
    async fn latest_close_takes_last_bar() {
        let provider = FixedHistory(PriceHistory::new(vec![bar(2, 240.0), bar(3, 242.5)]));
        assert_eq!(provider.latest_close("TSLA").await.unwrap(), 242.5);
    }

    #[tokio::test]
    async fn latest_close_on_empty_series_is_no_data() {
        let provider = FixedHistory(PriceHistory::default());
        let err = provider.latest_close("ZZZZ").await.unwrap_err();
        assert!(matches!(err, ProviderError::NoData(ref s) if s == "ZZZZ"));
    }

    #[test]
    fn month_aliases() {
        assert_eq!(normalize_period("1m"), "1mo");
        assert_eq!(normalize_period(" 3M "), "3mo");
        assert_eq!(normalize_period("1y"), "1y");
        assert_eq!(normalize_period("ytd"), "ytd");
    }
}
