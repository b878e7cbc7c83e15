mod error;
pub mod stock_data;
pub mod stock_price;

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::llm::{
    GET_STOCK_DATA, GET_STOCK_PRICE, ToolCall, ToolDef, ToolOutput, stock_data_tool_def,
    stock_price_tool_def,
};
use crate::market::StockProvider;

pub use error::ToolError;

pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

static TICKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9.^=\-]{1,20}$").expect("ticker pattern is valid")
});

/// Which capabilities the assistant is offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ToolSet {
    /// Price lookup only.
    Price,
    /// Price lookup and historical series.
    #[default]
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    StockPrice,
    StockData,
}

impl Capability {
    pub fn name(self) -> &'static str {
        match self {
            Capability::StockPrice => GET_STOCK_PRICE,
            Capability::StockData => GET_STOCK_DATA,
        }
    }

    pub fn tool_def(self) -> ToolDef {
        match self {
            Capability::StockPrice => stock_price_tool_def(),
            Capability::StockData => stock_data_tool_def(),
        }
    }
}

/// Closed set of functions the assistant may call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityRegistry {
    entries: Vec<Capability>,
}

impl CapabilityRegistry {
    pub fn for_tool_set(tools: ToolSet) -> Self {
        let entries = match tools {
            ToolSet::Price => vec![Capability::StockPrice],
            ToolSet::Full => vec![Capability::StockPrice, Capability::StockData],
        };
        Self { entries }
    }

    pub fn resolve(&self, name: &str) -> Option<Capability> {
        self.entries.iter().copied().find(|c| c.name() == name)
    }

    pub fn tool_defs(&self) -> Vec<ToolDef> {
        self.entries.iter().map(|c| c.tool_def()).collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|c| c.name()).collect()
    }
}

/// Per-function outcome counts since the last [`ToolDispatcher::take_stats`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolStats {
    pub successes: HashMap<String, u64>,
    pub failures: HashMap<String, u64>,
}

impl ToolStats {
    fn record(&mut self, name: &str, ok: bool) {
        let map = if ok {
            &mut self.successes
        } else {
            &mut self.failures
        };
        *map.entry(name.to_string()).or_insert(0) += 1;
    }
}

/// Resolves tool-call batches against the registry. Every call in a batch
/// produces exactly one output; failures become error text.
pub struct ToolDispatcher {
    provider: Arc<dyn StockProvider>,
    registry: CapabilityRegistry,
    tool_timeout: Duration,
    stats: Mutex<ToolStats>,
}

impl ToolDispatcher {
    pub fn new(provider: Arc<dyn StockProvider>, tools: ToolSet) -> Self {
        Self {
            provider,
            registry: CapabilityRegistry::for_tool_set(tools),
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            stats: Mutex::new(ToolStats::default()),
        }
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn take_stats(&self) -> ToolStats {
        self.stats
            .lock()
            .map(|mut s| std::mem::take(&mut *s))
            .unwrap_or_default()
    }

    pub async fn dispatch(&self, batch: &[ToolCall]) -> Vec<ToolOutput> {
        let mut outputs = Vec::with_capacity(batch.len());
        for call in batch {
            let result = self.dispatch_one(call).await;
            if let Ok(mut stats) = self.stats.lock() {
                stats.record(&call.function.name, result.is_ok());
            }
            let output = match result {
                Ok(text) => {
                    info!(tool_call_id=%call.id, name=%call.function.name, "tool call succeeded");
                    text
                }
                Err(e) => {
                    warn!(tool_call_id=%call.id, name=%call.function.name, error=%e, "tool call failed");
                    e.to_string()
                }
            };
            outputs.push(ToolOutput {
                tool_call_id: call.id.clone(),
                output,
            });
        }
        outputs
    }

    pub async fn dispatch_one(&self, call: &ToolCall) -> Result<String, ToolError> {
        debug!(tool_call = ?call, "dispatching tool call");
        if call.r#type != "function" {
            return Err(ToolError::UnsupportedType {
                call_id: call.id.clone(),
                kind: call.r#type.clone(),
            });
        }
        let name = call.function.name.as_str();
        let Some(capability) = self.registry.resolve(name) else {
            return Err(ToolError::UnknownFunction {
                call_id: call.id.clone(),
                name: name.to_string(),
            });
        };

        tokio::time::timeout(self.tool_timeout, self.run_capability(capability, call))
            .await
            .map_err(|_| ToolError::Timeout {
                call_id: call.id.clone(),
                name: name.to_string(),
                secs: self.tool_timeout.as_secs(),
            })?
    }

    async fn run_capability(
        &self,
        capability: Capability,
        call: &ToolCall,
    ) -> Result<String, ToolError> {
        let provider = self.provider.as_ref();
        match capability {
            Capability::StockPrice => {
                let params: stock_price::GetStockPriceParams = parse_args(call)?;
                check_ticker(&call.id, &params.symbol)?;
                stock_price::get_stock_price(provider, params).await
            }
            Capability::StockData => {
                let params: stock_data::GetStockDataParams = parse_args(call)?;
                check_ticker(&call.id, &params.ticker)?;
                if params.period.trim().is_empty() {
                    return Err(ToolError::invalid(&call.id, "period must not be empty"));
                }
                stock_data::get_stock_data(provider, params).await
            }
        }
    }
}

fn parse_args<T: DeserializeOwned>(call: &ToolCall) -> Result<T, ToolError> {
    let value: serde_json::Value = serde_json::from_str(&call.function.arguments)
        .map_err(|e| ToolError::invalid(&call.id, format!("malformed JSON: {e}")))?;
    serde_json::from_value(value).map_err(|e| ToolError::invalid(&call.id, e.to_string()))
}

fn check_ticker(call_id: &str, ticker: &str) -> Result<(), ToolError> {
    if TICKER_RE.is_match(ticker.trim()) {
        Ok(())
    } else {
        Err(ToolError::invalid(
            call_id,
            format!("'{ticker}' is not a ticker symbol"),
        ))
    }
}
