pub mod data;
pub mod error;

use tracing::{info, warn};

use crate::llm::{AssistantApi, RunDriver, RunOutcome};
use crate::tools::ToolDispatcher;

pub use data::{Role, SessionData};
pub use error::SessionError;

/// One conversation: a remote thread plus the local transcript and counters.
/// Created when a chat starts and torn down with [`ChatSession::end`].
pub struct ChatSession<'a> {
    api: &'a dyn AssistantApi,
    assistant_id: String,
    instructions: Option<String>,
    pub data: SessionData,
}

impl<'a> ChatSession<'a> {
    pub async fn start(
        api: &'a dyn AssistantApi,
        assistant_id: impl Into<String>,
        instructions: Option<String>,
    ) -> Result<Self, SessionError> {
        let thread = api.create_thread().await.map_err(SessionError::Start)?;
        let data = SessionData::new(thread.id);
        info!(session_id=%data.meta.id, thread_id=%data.meta.thread_id, "chat session started");
        Ok(Self {
            api,
            assistant_id: assistant_id.into(),
            instructions,
            data,
        })
    }

    /// Append `text` to the thread and drive a run to its end.
    ///
    /// A run the service reports as failed comes back as
    /// [`RunOutcome::Failed`] and is noted in the transcript; transport
    /// failures abort the turn.
    pub async fn send(
        &mut self,
        driver: &RunDriver<'_>,
        dispatcher: &ToolDispatcher,
        text: &str,
    ) -> Result<RunOutcome, SessionError> {
        let thread_id = self.data.meta.thread_id.clone();
        self.api.add_user_message(&thread_id, text).await?;
        self.data.push(Role::User, text);
        self.data.increment_requests();

        let result = driver
            .drive(
                &thread_id,
                &self.assistant_id,
                self.instructions.as_deref(),
                dispatcher,
            )
            .await;
        // Tool calls made before a transport failure still count.
        self.data.merge_tool_stats(dispatcher.take_stats());

        let outcome = result?;
        match &outcome {
            RunOutcome::Completed { message, .. } => {
                self.data.push(Role::Assistant, message.content.clone());
            }
            RunOutcome::Failed { status, error, .. } => {
                let detail = error
                    .as_ref()
                    .map(|e| format!(": {}", e.message))
                    .unwrap_or_default();
                self.data.push(Role::System, format!("run {status}{detail}"));
            }
        }
        Ok(outcome)
    }

    /// Delete the remote thread. Failures are logged, not returned.
    pub async fn end(self) -> SessionData {
        match self.api.delete_thread(&self.data.meta.thread_id).await {
            Ok(()) => {
                info!(session_id=%self.data.meta.id, thread_id=%self.data.meta.thread_id, "chat session ended")
            }
            Err(e) => {
                warn!(thread_id=%self.data.meta.thread_id, error=%e, "failed to delete thread")
            }
        }
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::data::TranscriptEntry;
    use crate::llm::{
        AssistantError, Run, RunError, RunStatus, Thread, ThreadMessage, ToolOutput,
    };
    use crate::market::{PriceHistory, ProviderError, StockProvider};
    use crate::tools::ToolSet;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Runs finish immediately with the configured status; the reply echoes
    /// the last user message.
    struct EchoApi {
        status: RunStatus,
        user_messages: Mutex<Vec<String>>,
        deleted: Mutex<Vec<String>>,
        fail_messages: bool,
    }

    impl EchoApi {
        fn new(status: RunStatus) -> Self {
            Self {
                status,
                user_messages: Mutex::new(Vec::new()),
                deleted: Mutex::new(Vec::new()),
                fail_messages: false,
            }
        }

        fn run(&self) -> Run {
            let n = self.user_messages.lock().unwrap().len();
            Run {
                id: format!("run_{n}"),
                thread_id: "thread_1".into(),
                assistant_id: Some("asst_1".into()),
                status: self.status,
                required_action: None,
                last_error: (self.status == RunStatus::Failed).then(|| RunError {
                    code: "rate_limit_exceeded".into(),
                    message: "quota".into(),
                }),
            }
        }
    }

    fn text_message(id: &str, role: &str, run_id: Option<&str>, text: &str) -> ThreadMessage {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "role": role,
            "run_id": run_id,
            "content": [{"type": "text", "text": {"value": text, "annotations": []}}]
        }))
        .unwrap()
    }

    #[async_trait]
    impl AssistantApi for EchoApi {
        async fn create_thread(&self) -> Result<Thread, AssistantError> {
            Ok(Thread {
                id: "thread_1".into(),
                created_at: 0,
            })
        }

        async fn delete_thread(&self, thread_id: &str) -> Result<(), AssistantError> {
            self.deleted.lock().unwrap().push(thread_id.to_string());
            Ok(())
        }

        async fn add_user_message(
            &self,
            _thread_id: &str,
            content: &str,
        ) -> Result<ThreadMessage, AssistantError> {
            if self.fail_messages {
                return Err(AssistantError::Api {
                    status: reqwest::StatusCode::UNAUTHORIZED,
                    body: "bad key".into(),
                });
            }
            self.user_messages.lock().unwrap().push(content.to_string());
            Ok(text_message("m_user", "user", None, content))
        }

        async fn create_run(
            &self,
            _thread_id: &str,
            _assistant_id: &str,
            _instructions: Option<&str>,
        ) -> Result<Run, AssistantError> {
            Ok(self.run())
        }

        async fn retrieve_run(&self, _thread_id: &str, _run_id: &str) -> Result<Run, AssistantError> {
            Ok(self.run())
        }

        async fn submit_tool_outputs(
            &self,
            _thread_id: &str,
            _run_id: &str,
            _outputs: &[ToolOutput],
        ) -> Result<Run, AssistantError> {
            Ok(self.run())
        }

        async fn cancel_run(&self, _thread_id: &str, _run_id: &str) -> Result<Run, AssistantError> {
            Ok(self.run())
        }

        async fn list_messages(&self, _thread_id: &str) -> Result<Vec<ThreadMessage>, AssistantError> {
            let msgs = self.user_messages.lock().unwrap();
            let n = msgs.len();
            let last = msgs.last().cloned().unwrap_or_default();
            Ok(vec![text_message(
                "m_reply",
                "assistant",
                Some(&format!("run_{n}")),
                &format!("echo: {last}"),
            )])
        }
    }

    struct NoProvider;

    #[async_trait]
    impl StockProvider for NoProvider {
        async fn history(&self, ticker: &str, _period: &str) -> Result<PriceHistory, ProviderError> {
            Err(ProviderError::NoData(ticker.to_string()))
        }
    }

    fn dispatcher() -> ToolDispatcher {
        ToolDispatcher::new(Arc::new(NoProvider), ToolSet::Full)
    }

    #[tokio::test]
    async fn send_records_transcript_and_counters() {
        let api = EchoApi::new(RunStatus::Completed);
        let driver = RunDriver::new(&api).with_poll_interval(Duration::ZERO);
        let tools = dispatcher();
        let mut session = ChatSession::start(&api, "asst_1", None).await.unwrap();
        assert_eq!(session.data.meta.thread_id, "thread_1");

        let outcome = session.send(&driver, &tools, "hello").await.unwrap();
        assert!(matches!(outcome, RunOutcome::Completed { .. }));
        session.send(&driver, &tools, "again").await.unwrap();

        assert_eq!(session.data.requests, 2);
        assert_eq!(
            session.data.transcript,
            vec![
                TranscriptEntry { role: Role::User, text: "hello".into() },
                TranscriptEntry { role: Role::Assistant, text: "echo: hello".into() },
                TranscriptEntry { role: Role::User, text: "again".into() },
                TranscriptEntry { role: Role::Assistant, text: "echo: again".into() },
            ]
        );
    }

    #[tokio::test]
    async fn failed_run_is_noted_in_transcript() {
        let api = EchoApi::new(RunStatus::Failed);
        let driver = RunDriver::new(&api).with_poll_interval(Duration::ZERO);
        let tools = dispatcher();
        let mut session = ChatSession::start(&api, "asst_1", None).await.unwrap();

        let outcome = session.send(&driver, &tools, "hello").await.unwrap();
        assert!(matches!(outcome, RunOutcome::Failed { .. }));
        let last = session.data.transcript.last().unwrap();
        assert_eq!(last.role, Role::System);
        assert_eq!(last.text, "run failed: quota");
    }

    #[tokio::test]
    async fn transport_error_aborts_turn() {
        let mut api = EchoApi::new(RunStatus::Completed);
        api.fail_messages = true;
        let driver = RunDriver::new(&api).with_poll_interval(Duration::ZERO);
        let tools = dispatcher();
        let mut session = ChatSession::start(&api, "asst_1", None).await.unwrap();

        let err = session.send(&driver, &tools, "hello").await.unwrap_err();
        assert!(err.assistant_error().is_transport());
        assert!(session.data.transcript.is_empty());
        assert_eq!(session.data.requests, 0);
    }

    #[tokio::test]
    async fn end_deletes_thread() {
        let api = EchoApi::new(RunStatus::Completed);
        let session = ChatSession::start(&api, "asst_1", Some("be brief".into()))
            .await
            .unwrap();
        let data = session.end().await;
        assert_eq!(data.meta.thread_id, "thread_1");
        assert_eq!(*api.deleted.lock().unwrap(), vec!["thread_1".to_string()]);
    }
}
