use std::sync::mpsc::Sender;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::llm::assistants::AssistantApi;
use crate::llm::error::AssistantError;
use crate::llm::types::{Run, RunError, RunStatus, ToolCall};
use crate::tools::ToolDispatcher;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// The assistant's reply for a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalMessage {
    pub message_id: String,
    pub run_id: String,
    pub content: String,
}

/// How a driven run ended. Transport problems are reported as
/// [`AssistantError`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed {
        message: FinalMessage,
        tool_calls: usize,
    },
    Failed {
        run_id: String,
        status: RunStatus,
        error: Option<RunError>,
    },
}

/// Owns the lifecycle of runs against one assistants service.
pub struct RunDriver<'a> {
    api: &'a dyn AssistantApi,
    poll_interval: Duration,
    ui_tx: Option<Sender<String>>,
    cancel: CancellationToken,
}

impl<'a> RunDriver<'a> {
    pub fn new(api: &'a dyn AssistantApi) -> Self {
        Self {
            api,
            poll_interval: DEFAULT_POLL_INTERVAL,
            ui_tx: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Progress lines (status, tool calls) are sent here when set.
    pub fn with_ui(mut self, tx: Sender<String>) -> Self {
        self.ui_tx = Some(tx);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn start(
        &self,
        thread_id: &str,
        assistant_id: &str,
        instructions: Option<&str>,
    ) -> Result<Run, AssistantError> {
        let run = self
            .api
            .create_run(thread_id, assistant_id, instructions)
            .await?;
        info!(run_id=%run.id, status=%run.status, "run started");
        Ok(run)
    }

    pub async fn poll(&self, thread_id: &str, run: &Run) -> Result<Run, AssistantError> {
        let run = self.api.retrieve_run(thread_id, &run.id).await?;
        debug!(run_id=%run.id, status=%run.status, "run polled");
        Ok(run)
    }

    /// Start a run and poll it until the service reports a terminal status,
    /// resolving tool calls along the way.
    pub async fn drive(
        &self,
        thread_id: &str,
        assistant_id: &str,
        instructions: Option<&str>,
        dispatcher: &ToolDispatcher,
    ) -> Result<RunOutcome, AssistantError> {
        let mut run = self.start(thread_id, assistant_id, instructions).await?;
        let mut tool_calls = 0usize;

        while !run.status.is_terminal() {
            self.notify(format!("[status] {}", run.status));

            if run.status == RunStatus::RequiresAction {
                match run.pending_tool_calls() {
                    Some(batch) => {
                        tool_calls += batch.len();
                        run = self.resolve_tool_calls(thread_id, &run, batch, dispatcher).await?;
                    }
                    None => info!(run_id=%run.id, "run requires action but carries no tool calls"),
                }
            }

            if self.cancel.is_cancelled() {
                warn!(run_id=%run.id, "run polling cancelled");
                return Err(self.cancel_remote(thread_id, &run.id).await);
            }
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    warn!(run_id=%run.id, "run polling cancelled during sleep");
                    return Err(self.cancel_remote(thread_id, &run.id).await);
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            run = self.poll(thread_id, &run).await?;
        }

        self.notify(format!("[status] {}", run.status));
        if run.status != RunStatus::Completed {
            warn!(run_id=%run.id, status=%run.status, error=?run.last_error, "run ended without completing");
            return Ok(RunOutcome::Failed {
                run_id: run.id,
                status: run.status,
                error: run.last_error,
            });
        }

        let message = self.fetch_reply(thread_id, &run.id).await?;
        Ok(RunOutcome::Completed {
            message,
            tool_calls,
        })
    }

    async fn resolve_tool_calls(
        &self,
        thread_id: &str,
        run: &Run,
        batch: &[ToolCall],
        dispatcher: &ToolDispatcher,
    ) -> Result<Run, AssistantError> {
        for call in batch {
            debug!(tool_call_id=%call.id, name=%call.function.name, args=%call.function.arguments, "tool call requested");
            self.notify(format!("[tool] {}({})", call.function.name, call.function.arguments));
        }

        let outputs = dispatcher.dispatch(batch).await;
        for out in &outputs {
            self.notify(format!("[tool] {} -> {}", out.tool_call_id, first_line(&out.output)));
        }

        let run = self
            .api
            .submit_tool_outputs(thread_id, &run.id, &outputs)
            .await?;
        info!(run_id=%run.id, outputs=outputs.len(), status=%run.status, "tool outputs submitted");
        Ok(run)
    }

    /// The thread rejects new messages while a run is active, so an
    /// abandoned run is cancelled on the service too. A failed cancel
    /// request is only logged.
    async fn cancel_remote(&self, thread_id: &str, run_id: &str) -> AssistantError {
        match self.api.cancel_run(thread_id, run_id).await {
            Ok(run) => info!(run_id=%run.id, status=%run.status, "run cancel requested"),
            Err(e) => warn!(run_id=%run_id, error=%e, "run cancel request failed"),
        }
        AssistantError::Cancelled
    }

    async fn fetch_reply(&self, thread_id: &str, run_id: &str) -> Result<FinalMessage, AssistantError> {
        let messages = self.api.list_messages(thread_id).await?;
        messages
            .into_iter()
            .find(|m| m.role == "assistant" && m.run_id.as_deref() == Some(run_id))
            .map(|m| FinalMessage {
                content: m.text(),
                message_id: m.id,
                run_id: run_id.to_string(),
            })
            .ok_or_else(|| AssistantError::MissingReply {
                run_id: run_id.to_string(),
            })
    }

    fn notify(&self, line: String) {
        if let Some(tx) = &self.ui_tx {
            let _ = tx.send(line);
        }
    }
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or("")
}
