use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{PriceBar, PriceHistory, ProviderError, StockProvider, normalize_period};

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

// The chart endpoint rejects requests without a browser-like agent.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) stock-assistant";

/// Daily bars from the Yahoo Finance chart API.
#[derive(Debug, Clone)]
pub struct YahooFinance {
    base_url: String,
    inner: reqwest::Client,
}

impl YahooFinance {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let inner = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.into(),
            inner,
        })
    }

    fn chart_url(&self, ticker: &str) -> String {
        format!(
            "{}/v8/finance/chart/{}",
            self.base_url.trim_end_matches('/'),
            ticker
        )
    }
}

#[async_trait]
impl StockProvider for YahooFinance {
    async fn history(&self, ticker: &str, period: &str) -> Result<PriceHistory, ProviderError> {
        let range = normalize_period(period);
        let url = self.chart_url(ticker);
        debug!(%url, %range, "fetching chart");

        let resp = self
            .inner
            .get(&url)
            .query(&[("range", range.as_str()), ("interval", "1d")])
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            warn!(status=%status.as_u16(), %ticker, "chart request failed");
            // Yahoo reports unknown symbols and bad ranges inside the chart envelope.
            if let Ok(ChartEnvelope {
                chart: Chart {
                    error: Some(err), ..
                },
            }) = serde_json::from_str::<ChartEnvelope>(&body)
            {
                return Err(ProviderError::Provider {
                    code: err.code,
                    description: err.description,
                });
            }
            return Err(ProviderError::Status { status, body });
        }

        let envelope: ChartEnvelope = serde_json::from_str(&body)?;
        if let Some(err) = envelope.chart.error {
            return Err(ProviderError::Provider {
                code: err.code,
                description: err.description,
            });
        }
        let result = envelope
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| ProviderError::NoData(ticker.to_string()))?;
        Ok(result.into_history())
    }
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i32,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

impl ChartResult {
    fn into_history(self) -> PriceHistory {
        let offset = FixedOffset::east_opt(self.meta.gmtoffset).unwrap_or(Utc.fix());
        let Some(quote) = self.indicators.quote.into_iter().next() else {
            return PriceHistory::default();
        };

        let mut bars = Vec::with_capacity(self.timestamp.len());
        for (i, ts) in self.timestamp.iter().enumerate() {
            let field = |col: &Vec<Option<f64>>| col.get(i).copied().flatten();
            // Rows without a close are halts or the still-open session; skip them.
            let (Some(open), Some(high), Some(low), Some(close)) = (
                field(&quote.open),
                field(&quote.high),
                field(&quote.low),
                field(&quote.close),
            ) else {
                continue;
            };
            let Some(utc) = DateTime::<Utc>::from_timestamp(*ts, 0) else {
                continue;
            };
            bars.push(PriceBar {
                timestamp: utc.with_timezone(&offset),
                open,
                high,
                low,
                close,
                volume: quote.volume.get(i).copied().flatten().unwrap_or(0),
            });
        }
        PriceHistory::new(bars)
    }
}
