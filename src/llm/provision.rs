use tracing::{debug, info};

use crate::llm::client_core::{OpenAIClient, get_json, post_json};
use crate::llm::error::AssistantError;
use crate::llm::tool_def::code_interpreter_tool_def;
use crate::llm::types::{Assistant, AssistantRequest, ListResponse, ToolDef};

const PAGE_SIZE: usize = 100;

/// What the assistant should look like after provisioning.
#[derive(Debug, Clone)]
pub struct AssistantSpec {
    pub name: String,
    pub instructions: String,
    pub model: String,
    pub tools: Vec<ToolDef>,
}

impl AssistantSpec {
    /// Declares `code_interpreter` ahead of the given function tools.
    pub fn with_code_interpreter(
        name: impl Into<String>,
        instructions: impl Into<String>,
        model: impl Into<String>,
        function_tools: Vec<ToolDef>,
    ) -> Self {
        let mut tools = Vec::with_capacity(function_tools.len() + 1);
        tools.push(code_interpreter_tool_def());
        tools.extend(function_tools);
        Self {
            name: name.into(),
            instructions: instructions.into(),
            model: model.into(),
            tools,
        }
    }

    fn request(&self) -> AssistantRequest<'_> {
        AssistantRequest {
            name: &self.name,
            instructions: &self.instructions,
            model: &self.model,
            tools: &self.tools,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionAction {
    Created,
    Updated,
}

#[derive(Debug, Clone)]
pub struct Provisioned {
    pub assistant: Assistant,
    pub action: ProvisionAction,
}

impl OpenAIClient {
    /// Every assistant visible to the key, following pagination.
    pub async fn list_assistants(&self) -> Result<Vec<Assistant>, AssistantError> {
        let mut all = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let mut path = format!("assistants?limit={PAGE_SIZE}&order=desc");
            if let Some(cursor) = &after {
                path.push_str(&format!("&after={cursor}"));
            }
            let page: ListResponse<Assistant> = get_json(self, &path).await?;
            let next = page.last_id.clone().or_else(|| page.data.last().map(|a| a.id.clone()));
            all.extend(page.data);
            match next {
                Some(cursor) if page.has_more => after = Some(cursor),
                _ => break,
            }
        }
        debug!(count = all.len(), "listed assistants");
        Ok(all)
    }

    pub async fn create_assistant(&self, spec: &AssistantSpec) -> Result<Assistant, AssistantError> {
        post_json(self, "assistants", &spec.request()).await
    }

    pub async fn update_assistant(
        &self,
        assistant_id: &str,
        spec: &AssistantSpec,
    ) -> Result<Assistant, AssistantError> {
        post_json(self, &format!("assistants/{assistant_id}"), &spec.request()).await
    }
}

/// Updates the first assistant named `spec.name`, or creates one.
pub async fn provision_assistant(
    client: &OpenAIClient,
    spec: &AssistantSpec,
) -> Result<Provisioned, AssistantError> {
    let existing = client
        .list_assistants()
        .await?
        .into_iter()
        .find(|a| a.name.as_deref() == Some(spec.name.as_str()));

    match existing {
        Some(found) => {
            info!(assistant_id=%found.id, name=%spec.name, "updating existing assistant");
            let assistant = client.update_assistant(&found.id, spec).await?;
            Ok(Provisioned {
                assistant,
                action: ProvisionAction::Updated,
            })
        }
        None => {
            info!(name=%spec.name, model=%spec.model, "creating assistant");
            let assistant = client.create_assistant(spec).await?;
            Ok(Provisioned {
                assistant,
                action: ProvisionAction::Created,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{stock_data_tool_def, stock_price_tool_def};
    use httptest::{Expectation, Server, matchers::*, responders::*};
    use serde_json::json;

    fn spec() -> AssistantSpec {
        AssistantSpec::with_code_interpreter(
            "Stock Assistant",
            "be helpful",
            "gpt-3.5-turbo-1106",
            vec![stock_price_tool_def(), stock_data_tool_def()],
        )
    }

    fn client_for(server: &Server) -> OpenAIClient {
        OpenAIClient::new(server.url_str(""), "test-key").unwrap()
    }

    #[test]
    fn code_interpreter_is_declared_first() {
        let s = spec();
        let kinds: Vec<&str> = s.tools.iter().map(|t| t.kind.as_str()).collect();
        assert_eq!(kinds, vec!["code_interpreter", "function", "function"]);
    }

    #[tokio::test]
    async fn existing_assistant_is_updated() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/v1/assistants")).respond_with(
                json_encoded(json!({
                    "data": [
                        {"id": "asst_other", "name": "Other", "model": "gpt-4"},
                        {"id": "asst_1", "name": "Stock Assistant", "model": "gpt-4"}
                    ],
                    "has_more": false
                })),
            ),
        );
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/v1/assistants/asst_1"),
                request::body(json_decoded(|b: &serde_json::Value| {
                    b["instructions"] == "be helpful"
                        && b["model"] == "gpt-3.5-turbo-1106"
                        && b["tools"].as_array().map(|t| t.len()) == Some(3)
                })),
            ])
            .respond_with(json_encoded(json!({
                "id": "asst_1",
                "name": "Stock Assistant",
                "model": "gpt-3.5-turbo-1106",
                "instructions": "be helpful"
            }))),
        );

        let out = provision_assistant(&client_for(&server), &spec())
            .await
            .unwrap();
        assert_eq!(out.action, ProvisionAction::Updated);
        assert_eq!(out.assistant.id, "asst_1");
    }

    #[tokio::test]
    async fn missing_assistant_is_created_after_paging() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/v1/assistants"),
                request::query(url_decoded(not(contains(key("after"))))),
            ])
            .respond_with(json_encoded(json!({
                "data": [{"id": "asst_a", "name": "A", "model": "gpt-4"}],
                "has_more": true,
                "last_id": "asst_a"
            }))),
        );
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/v1/assistants"),
                request::query(url_decoded(contains(("after", "asst_a")))),
            ])
            .respond_with(json_encoded(json!({
                "data": [{"id": "asst_b", "name": null, "model": "gpt-4"}],
                "has_more": false
            }))),
        );
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/v1/assistants"),
                request::body(json_decoded(|b: &serde_json::Value| {
                    b["name"] == "Stock Assistant"
                })),
            ])
            .respond_with(json_encoded(json!({
                "id": "asst_new",
                "name": "Stock Assistant",
                "model": "gpt-3.5-turbo-1106"
            }))),
        );

        let out = provision_assistant(&client_for(&server), &spec())
            .await
            .unwrap();
        assert_eq!(out.action, ProvisionAction::Created);
        assert_eq!(out.assistant.id, "asst_new");
    }
}
