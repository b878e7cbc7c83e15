use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::market::StockProvider;
use crate::tools::ToolError;

#[derive(Debug, Serialize, Deserialize)]
pub struct GetStockPriceParams {
    pub symbol: String,
}

/// Latest daily close for `params.symbol`, formatted as `Price: 242.50`.
pub async fn get_stock_price(
    provider: &dyn StockProvider,
    params: GetStockPriceParams,
) -> Result<String, ToolError> {
    let symbol = params.symbol.trim().to_ascii_uppercase();
    match provider.latest_close(&symbol).await {
        Ok(price) => Ok(format!("Price: {price:.2}")),
        Err(e) => {
            warn!(%symbol, error=%e, "price lookup failed");
            Err(ToolError::Provider {
                message: format!("Error fetching price for {symbol}"),
                source: e,
            })
        }
    }
}
