use reqwest::RequestBuilder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use super::{ASSISTANTS_BETA_HEADER, OpenAIClient};
use crate::llm::error::AssistantError;

pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &OpenAIClient,
    path: &str,
) -> Result<T, AssistantError> {
    let url = client.endpoint(path);
    let req = client.inner.get(&url);
    execute(client, req, &url).await
}

pub(crate) async fn post_json<B, T>(
    client: &OpenAIClient,
    path: &str,
    body: &B,
) -> Result<T, AssistantError>
where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
{
    let url = client.endpoint(path);
    if let Ok(payload) = serde_json::to_string(body) {
        debug!(payload=%payload, endpoint=%url, "sending assistants payload");
    }
    let req = client.inner.post(&url).json(body);
    execute(client, req, &url).await
}

pub(crate) async fn delete_json<T: DeserializeOwned>(
    client: &OpenAIClient,
    path: &str,
) -> Result<T, AssistantError> {
    let url = client.endpoint(path);
    let req = client.inner.delete(&url);
    execute(client, req, &url).await
}

async fn execute<T: DeserializeOwned>(
    client: &OpenAIClient,
    req: RequestBuilder,
    url: &str,
) -> Result<T, AssistantError> {
    let (beta_key, beta_value) = ASSISTANTS_BETA_HEADER;
    let resp = req
        .bearer_auth(&client.api_key)
        .header(beta_key, beta_value)
        .send()
        .await
        .map_err(|e| {
            error!(err=%e, endpoint=%url, "assistants request send error");
            AssistantError::Transport {
                endpoint: url.to_string(),
                source: e,
            }
        })?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        error!(status=%status.as_u16(), body=%body, endpoint=%url, "assistants non-success status");
        return Err(AssistantError::Api { status, body });
    }

    let text = resp.text().await.map_err(|e| AssistantError::Transport {
        endpoint: url.to_string(),
        source: e,
    })?;
    debug!(endpoint=%url, response_body=%text, "assistants response");
    serde_json::from_str(&text).map_err(|e| {
        error!(err=%e, endpoint=%url, "assistants response decode error");
        AssistantError::Decode {
            endpoint: url.to_string(),
            source: e,
        }
    })
}
