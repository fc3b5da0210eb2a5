use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{body_or_placeholder, LlmProvider};
use crate::chat::ChatMessage;

/// How the API key is presented in the `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`.
    Bearer,
    /// `Authorization: <key>`.
    Raw,
}

/// Settings for any OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiChatConfig {
    /// Display name used in status output.
    pub label: String,
    /// API key; may be empty for endpoints that do not check it.
    pub api_key: String,
    /// API root; `/chat/completions` is appended.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Header format for the API key.
    pub auth: AuthStyle,
    /// Optional sampling temperature.
    pub temperature: Option<f32>,
    /// Optional completion token cap.
    pub max_tokens: Option<usize>,
    /// Request timeout.
    pub timeout: Duration,
}

impl OpenAiChatConfig {
    /// OpenAI's hosted `gpt-3.5-turbo`.
    pub fn openai(api_key: String) -> Self {
        Self {
            label: "OpenAI".to_string(),
            api_key,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            auth: AuthStyle::Bearer,
            temperature: None,
            max_tokens: None,
            timeout: Duration::from_secs(60),
        }
    }

    /// ChatNBX hosted Llama 2 endpoint.
    pub fn chatnbx(api_key: String) -> Self {
        Self {
            label: "ChatNBX".to_string(),
            api_key,
            base_url: "https://chat.nbox.ai/api".to_string(),
            model: "llama-2-chat-70b-4k".to_string(),
            auth: AuthStyle::Raw,
            temperature: None,
            max_tokens: None,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Chat completions client for OpenAI-compatible APIs.
pub struct OpenAiProvider {
    config: OpenAiChatConfig,
    endpoint: String,
    client: Client,
}

impl OpenAiProvider {
    /// Builds a provider from `config`.
    pub fn new(config: OpenAiChatConfig) -> Result<Self> {
        anyhow::ensure!(!config.model.trim().is_empty(), "missing chat model name");
        let mut headers = HeaderMap::new();
        let key = config.api_key.trim();
        if !key.is_empty() {
            let value = match config.auth {
                AuthStyle::Bearer => format!("Bearer {key}"),
                AuthStyle::Raw => key.to_string(),
            };
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&value)
                    .with_context(|| format!("invalid {} API key", config.label))?,
            );
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .with_context(|| format!("failed to build {} HTTP client", config.label))?;
        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        Ok(Self {
            config,
            endpoint,
            client,
        })
    }
}

impl LlmProvider for OpenAiProvider {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let label = &self.config.label;
        let body = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .with_context(|| format!("failed to call {label} chat completions"))?;
        let status = resp.status();
        let text = body_or_placeholder(resp);
        if !status.is_success() {
            bail!("{} returned {}: {}", label, status, text);
        }
        let parsed: ChatResponse = serde_json::from_str(&text)
            .with_context(|| format!("unexpected {label} response: {text}"))?;
        match parsed.choices.into_iter().next() {
            Some(choice) => Ok(choice.message.content),
            None => bail!("{} response had no choices: {}", label, text),
        }
    }

    fn describe(&self) -> String {
        format!("{} `{}`", self.config.label, self.config.model)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: String,
}
