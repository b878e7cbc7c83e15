use thiserror::Error;

use crate::market::ProviderError;

/// Failure of a single tool invocation. The display text is what the
/// assistant receives as the tool output.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Invalid arguments for tool call {call_id}: {reason}")]
    InvalidArguments { call_id: String, reason: String },

    #[error("Unknown function '{name}' for tool call {call_id}")]
    UnknownFunction { call_id: String, name: String },

    #[error("Unsupported tool type '{kind}' for tool call {call_id}")]
    UnsupportedType { call_id: String, kind: String },

    #[error("{message}")]
    Provider {
        message: String,
        #[source]
        source: ProviderError,
    },

    #[error("Tool call {call_id} ({name}) timed out after {secs}s")]
    Timeout {
        call_id: String,
        name: String,
        secs: u64,
    },
}

impl ToolError {
    pub(crate) fn invalid(call_id: &str, reason: impl Into<String>) -> Self {
        ToolError::InvalidArguments {
            call_id: call_id.to_string(),
            reason: reason.into(),
        }
    }
}
