use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::market::StockProvider;
use crate::tools::ToolError;

#[derive(Debug, Serialize, Deserialize)]
pub struct GetStockDataParams {
    pub ticker: String,
    pub period: String,
}

/// Historical OHLCV series rendered as a text table. An empty series is
/// a valid answer and renders as an empty table.
pub async fn get_stock_data(
    provider: &dyn StockProvider,
    params: GetStockDataParams,
) -> Result<String, ToolError> {
    let ticker = params.ticker.trim().to_ascii_uppercase();
    let period = params.period.trim();
    match provider.history(&ticker, period).await {
        Ok(history) => {
            debug!(%ticker, %period, rows = history.len(), "history fetched");
            Ok(history.to_text_table())
        }
        Err(e) => {
            warn!(%ticker, %period, error=%e, "history lookup failed");
            Err(ToolError::Provider {
                message: format!("Error fetching historical data for {ticker} with period {period}"),
                source: e,
            })
        }
    }
}
