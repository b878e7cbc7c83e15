use async_trait::async_trait;
use serde_json::json;

use crate::llm::client_core::{OpenAIClient, delete_json, get_json, post_json};
use crate::llm::error::AssistantError;
use crate::llm::types::{
    CreateMessageRequest, CreateRunRequest, ListResponse, Run, SubmitToolOutputsRequest, Thread,
    ThreadMessage, ToolOutput,
};

/// The hosted thread/run/message service the chat is driven against.
#[async_trait]
pub trait AssistantApi: Send + Sync {
    async fn create_thread(&self) -> Result<Thread, AssistantError>;

    async fn delete_thread(&self, thread_id: &str) -> Result<(), AssistantError>;

    async fn add_user_message(
        &self,
        thread_id: &str,
        content: &str,
    ) -> Result<ThreadMessage, AssistantError>;

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        instructions: Option<&str>,
    ) -> Result<Run, AssistantError>;

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AssistantError>;

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, AssistantError>;

    /// Ask the service to stop a run that is still queued or in progress.
    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AssistantError>;

    /// Messages of a thread, newest first.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, AssistantError>;
}

#[async_trait]
impl AssistantApi for OpenAIClient {
    async fn create_thread(&self) -> Result<Thread, AssistantError> {
        post_json(self, "threads", &json!({})).await
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<(), AssistantError> {
        let _: serde_json::Value = delete_json(self, &format!("threads/{thread_id}")).await?;
        Ok(())
    }

    async fn add_user_message(
        &self,
        thread_id: &str,
        content: &str,
    ) -> Result<ThreadMessage, AssistantError> {
        let req = CreateMessageRequest {
            role: "user",
            content,
        };
        post_json(self, &format!("threads/{thread_id}/messages"), &req).await
    }

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        instructions: Option<&str>,
    ) -> Result<Run, AssistantError> {
        let req = CreateRunRequest {
            assistant_id,
            instructions,
        };
        post_json(self, &format!("threads/{thread_id}/runs"), &req).await
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AssistantError> {
        get_json(self, &format!("threads/{thread_id}/runs/{run_id}")).await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, AssistantError> {
        let req = SubmitToolOutputsRequest {
            tool_outputs: outputs,
        };
        post_json(
            self,
            &format!("threads/{thread_id}/runs/{run_id}/submit_tool_outputs"),
            &req,
        )
        .await
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AssistantError> {
        post_json(
            self,
            &format!("threads/{thread_id}/runs/{run_id}/cancel"),
            &json!({}),
        )
        .await
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, AssistantError> {
        let page: ListResponse<ThreadMessage> =
            get_json(self, &format!("threads/{thread_id}/messages")).await?;
        Ok(page.data)
    }
}
