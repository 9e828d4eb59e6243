//! LLM client boundary.
//!
//! The analysis adapters only need "prompt in, text out" for plain text
//! and for one image URL. [`AnthropicClient`] implements that over the
//! Anthropic Messages API; tests substitute their own [`LlmClient`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::LlmConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    async fn describe_image(&self, prompt: &str, image_url: &str) -> Result<String>;
}

pub struct AnthropicClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Value>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl AnthropicClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let Some(api_key) = config.api_key.clone() else {
            bail!("{} is not set", config.api_key_env);
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/v1/messages", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    async fn send(&self, content: Value) -> Result<String> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![json!({ "role": "user", "content": content })],
        };
        debug!(model = %self.model, "sending messages request");

        let resp = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .context("LLM request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("LLM API error {}: {}", status.as_u16(), text);
        }

        let parsed: MessagesResponse = resp.json().await.context("LLM response was not JSON")?;
        let text: String = parsed
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .map(|b| b.text)
            .collect::<Vec<_>>()
            .join("\n");
        if text.is_empty() {
            bail!("LLM response had no text content");
        }
        Ok(text)
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.send(json!(prompt)).await
    }

    async fn describe_image(&self, prompt: &str, image_url: &str) -> Result<String> {
        self.send(json!([
            { "type": "image", "source": { "type": "url", "url": image_url } },
            { "type": "text", "text": prompt }
        ]))
        .await
    }
}

/// Build the configured client, or `None` when `llm.provider = "disabled"`.
pub fn create_client(config: &LlmConfig) -> Result<Option<Arc<dyn LlmClient>>> {
    match config.provider.as_str() {
        "disabled" => Ok(None),
        "anthropic" => Ok(Some(Arc::new(AnthropicClient::new(config)?))),
        other => bail!("Unknown llm provider: {}", other),
    }
}
