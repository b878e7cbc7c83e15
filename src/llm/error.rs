use reqwest::StatusCode;
use thiserror::Error;

use crate::llm::LlmErrorKind;

/// Failures talking to the assistants service.
///
/// `Transport`, `Api` and `Decode` are infrastructure problems and abort the
/// current turn. A run that the service reports as failed is not an error;
/// see [`crate::llm::RunOutcome`].
#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("assistant api error: {status} - {body}")]
    Api { status: StatusCode, body: String },

    #[error("failed to decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("run {run_id} completed without an assistant reply")]
    MissingReply { run_id: String },

    #[error("run polling cancelled")]
    Cancelled,
}

impl AssistantError {
    /// True for the infrastructure failures (network, auth, bad payloads).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AssistantError::Transport { .. }
                | AssistantError::Api { .. }
                | AssistantError::Decode { .. }
        )
    }

    pub fn kind(&self) -> LlmErrorKind {
        match self {
            AssistantError::Transport { source, .. } => {
                if source.is_timeout() {
                    LlmErrorKind::Timeout
                } else if source.is_connect() || source.is_body() || source.is_request() {
                    LlmErrorKind::Network
                } else {
                    LlmErrorKind::Unknown
                }
            }
            AssistantError::Api { status, .. } => crate::llm::classify_status(*status),
            AssistantError::Decode { .. } => LlmErrorKind::Deserialize,
            AssistantError::MissingReply { .. } => LlmErrorKind::Unknown,
            AssistantError::Cancelled => LlmErrorKind::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_are_transport_class() {
        let err = AssistantError::Api {
            status: StatusCode::UNAUTHORIZED,
            body: "bad key".into(),
        };
        assert!(err.is_transport());
        assert_eq!(err.kind(), LlmErrorKind::Auth);
        assert_eq!(format!("{err}"), "assistant api error: 401 Unauthorized - bad key");
    }

    #[test]
    fn missing_reply_is_not_transport() {
        let err = AssistantError::MissingReply {
            run_id: "run_1".into(),
        };
        assert!(!err.is_transport());
        assert!(!AssistantError::Cancelled.is_transport());
    }
}
