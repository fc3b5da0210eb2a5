use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{body_or_placeholder, LlmProvider};
use crate::chat::{ChatMessage, Role};

/// Model used when no `--chat-model` is given.
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-5";

/// Settings for the Anthropic messages API.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// Value for the `x-api-key` header.
    pub api_key: String,
    /// API root; `/messages` is appended.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Completion token cap (required by the API).
    pub max_tokens: usize,
    /// Request timeout.
    pub timeout: Duration,
}

impl AnthropicConfig {
    /// Defaults for the hosted API.
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            base_url: "https://api.anthropic.com/v1".to_string(),
            model,
            max_tokens: 1024,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Anthropic messages API client.
pub struct AnthropicProvider {
    model: String,
    max_tokens: usize,
    endpoint: String,
    client: Client,
}

impl AnthropicProvider {
    /// Builds a provider from `config`.
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        anyhow::ensure!(!config.api_key.trim().is_empty(), "missing Anthropic API key");
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(config.api_key.trim()).context("invalid Anthropic API key")?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .context("failed to build Anthropic HTTP client")?;
        Ok(Self {
            model: config.model,
            max_tokens: config.max_tokens.max(1),
            endpoint: format!("{}/messages", config.base_url.trim_end_matches('/')),
            client,
        })
    }
}

impl LlmProvider for AnthropicProvider {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        // the messages API takes the system prompt out of band
        let system = messages
            .iter()
            .filter(|message| message.role == Role::System)
            .map(|message| message.content.trim())
            .collect::<Vec<_>>()
            .join("\n\n");
        let turns = messages
            .iter()
            .filter(|message| message.role != Role::System)
            .map(|message| AnthropicMessage {
                role: message.role,
                content: vec![AnthropicContentBlock {
                    kind: "text",
                    text: &message.content,
                }],
            })
            .collect();
        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: (!system.is_empty()).then_some(system.as_str()),
            messages: turns,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .context("failed to call Anthropic messages API")?;
        let status = resp.status();
        let text = body_or_placeholder(resp);
        if !status.is_success() {
            bail!("Anthropic returned {}: {}", status, text);
        }
        let parsed: AnthropicResponse = serde_json::from_str(&text)
            .with_context(|| format!("unexpected Anthropic response: {text}"))?;
        let answer = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                AnthropicResponseBlock::Text { text } => Some(text),
                AnthropicResponseBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        if answer.is_empty() {
            bail!("Anthropic response missing text content: {}", text);
        }
        Ok(answer)
    }

    fn describe(&self) -> String {
        format!("Anthropic `{}`", self.model)
    }
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: Role,
    content: Vec<AnthropicContentBlock<'a>>,
}

#[derive(Serialize)]
struct AnthropicContentBlock<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}
