//! Chat-completion backends.

use anyhow::Result;

mod anthropic;
mod openai;

pub use anthropic::{AnthropicConfig, AnthropicProvider, DEFAULT_ANTHROPIC_MODEL};
pub use openai::{AuthStyle, OpenAiChatConfig, OpenAiProvider};

use super::ChatMessage;

/// Trait implemented by concrete LLM providers.
pub trait LlmProvider: Send + Sync {
    /// Sends `messages` and returns the assistant reply text.
    fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Human-readable provider and model label.
    fn describe(&self) -> String;
}

pub(crate) fn body_or_placeholder(resp: reqwest::blocking::Response) -> String {
    resp.text()
        .unwrap_or_else(|_| "<body unavailable>".to_string())
}
