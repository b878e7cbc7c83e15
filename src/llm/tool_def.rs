use serde_json::json;

use crate::llm::types::{ToolDef, ToolFunctionDef};

pub const GET_STOCK_PRICE: &str = "get_stock_price";
pub const GET_STOCK_DATA: &str = "get_stock_data";

pub fn stock_price_tool_def() -> ToolDef {
    ToolDef {
        kind: "function".into(),
        function: Some(ToolFunctionDef {
            name: GET_STOCK_PRICE.into(),
            description: "Get the current stock price".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "symbol": {
                        "type": "string",
                        "description": "The stock symbol"
                    }
                },
                "required": ["symbol"]
            }),
        }),
    }
}

pub fn stock_data_tool_def() -> ToolDef {
    ToolDef {
        kind: "function".into(),
        function: Some(ToolFunctionDef {
            name: GET_STOCK_DATA.into(),
            description: "Fetches historical stock data for the given ticker symbol and time period.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "ticker": {
                        "type": "string",
                        "description": "The stock ticker symbol."
                    },
                    "period": {
                        "type": "string",
                        "description": "The time period for which historical data is requested (e.g., '1mo' for 1 month, '1y' for 1 year)."
                    }
                },
                "required": ["ticker", "period"]
            }),
        }),
    }
}

/// Built-in tool that lets the assistant run its own code (charts etc.).
pub fn code_interpreter_tool_def() -> ToolDef {
    ToolDef {
        kind: "code_interpreter".into(),
        function: None,
    }
}
