mod assistants;
mod client_core;
mod error;
pub mod provision;
mod run_driver;
mod tool_def;
pub mod types;

use reqwest::StatusCode;

pub use assistants::*;
pub use client_core::*;
pub use error::*;
pub use run_driver::*;
pub use tool_def::*;
pub use types::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmErrorKind {
    RateLimited,
    Auth,
    Server,
    Network,
    Timeout,
    Client,
    Deserialize,
    Cancelled,
    Unknown,
}

pub fn classify_status(status: StatusCode) -> LlmErrorKind {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return LlmErrorKind::RateLimited;
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return LlmErrorKind::Auth;
    }
    if status.is_server_error() {
        return LlmErrorKind::Server;
    }
    if status.is_client_error() {
        return LlmErrorKind::Client;
    }
    LlmErrorKind::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(classify_status(StatusCode::TOO_MANY_REQUESTS), LlmErrorKind::RateLimited);
        assert_eq!(classify_status(StatusCode::FORBIDDEN), LlmErrorKind::Auth);
        assert_eq!(classify_status(StatusCode::BAD_GATEWAY), LlmErrorKind::Server);
        assert_eq!(classify_status(StatusCode::NOT_FOUND), LlmErrorKind::Client);
    }
}
