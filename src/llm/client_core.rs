use anyhow::Result;
use std::time::Duration;

use crate::config::LlmConfig;

mod network;

pub(crate) use network::{delete_json, get_json, post_json};

/// Header required by the beta assistants endpoints.
pub const ASSISTANTS_BETA_HEADER: (&str, &str) = ("OpenAI-Beta", "assistants=v2");

#[derive(Debug, Clone)]
pub struct OpenAIClient {
    pub base_url: String,
    pub api_key: String,
    pub(crate) inner: reqwest::Client,
}

impl OpenAIClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let inner = reqwest::Client::builder().build()?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            inner,
        })
    }

    pub fn with_llm_config(mut self, cfg: &LlmConfig) -> Self {
        let builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(cfg.connect_timeout_ms))
            .timeout(Duration::from_millis(cfg.request_timeout_ms));
        // If building fails, keep the existing client.
        if let Ok(c) = builder.build() {
            self.inner = c;
        }
        self
    }

    /// Full URL for an API path such as `threads/abc/runs`. A trailing `/v1`
    /// segment on the base URL is optional.
    pub(crate) fn endpoint(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let base = base.strip_suffix("/v1").unwrap_or(base);
        format!("{base}/v1/{}", path.trim_start_matches('/'))
    }
}
