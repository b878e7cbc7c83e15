use thiserror::Error;

use crate::llm::AssistantError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to open conversation thread: {0}")]
    Start(#[source] AssistantError),

    #[error("Turn failed: {0}")]
    Turn(#[from] AssistantError),
}

impl SessionError {
    pub fn assistant_error(&self) -> &AssistantError {
        match self {
            SessionError::Start(e) | SessionError::Turn(e) => e,
        }
    }
}
