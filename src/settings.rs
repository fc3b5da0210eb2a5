//! Command-line and environment configuration shared by the binaries.

use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Args, ValueEnum};

use crate::chat::providers::{
    AnthropicConfig, AnthropicProvider, LlmProvider, OpenAiChatConfig, OpenAiProvider,
    DEFAULT_ANTHROPIC_MODEL,
};
use crate::embedder::openai::{OpenAiEmbedder, OpenAiEmbedderConfig, DEFAULT_EMBEDDING_MODEL};
use crate::vector_store::{QdrantConfig, QdrantStore};

/// Logging verbosity.
#[derive(Args, Debug, Clone)]
pub struct LogArgs {
    /// Log filter, e.g. `info` or `warn,pagecite=debug` (RUST_LOG overrides)
    #[arg(long, env = "PAGECITE_LOG", default_value = "info")]
    pub log_level: String,
}

/// Embedding endpoint settings.
#[derive(Args, Debug, Clone)]
pub struct OpenAiArgs {
    /// OpenAI API key used for embedding calls
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Embedding model identifier
    #[arg(long, env = "PAGECITE_EMBED_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    pub embedding_model: String,

    /// Optional dimension override when supported by the model
    #[arg(long, env = "PAGECITE_EMBED_DIMENSIONS")]
    pub embedding_dimensions: Option<usize>,

    /// Base URL for the OpenAI-compatible API
    #[arg(long, env = "PAGECITE_OPENAI_BASE", default_value = "https://api.openai.com/v1")]
    pub openai_base_url: String,

    /// Max seconds to wait for each embedding request
    #[arg(long, env = "PAGECITE_OPENAI_TIMEOUT_SECS", default_value_t = 30)]
    pub openai_timeout_secs: u64,

    /// Attempts per embedding request for rate limits or transient errors
    #[arg(long, env = "PAGECITE_OPENAI_MAX_RETRIES", default_value_t = 5)]
    pub max_retries: usize,
}

impl OpenAiArgs {
    /// Builds the embedding client; `batch_size` caps inputs per request.
    pub fn build_embedder(&self, batch_size: usize) -> Result<OpenAiEmbedder> {
        OpenAiEmbedder::new(OpenAiEmbedderConfig {
            api_key: self.openai_api_key.clone().unwrap_or_default(),
            base_url: self.openai_base_url.clone(),
            model: self.embedding_model.clone(),
            dimensions: self.embedding_dimensions,
            timeout: Duration::from_secs(self.openai_timeout_secs.max(1)),
            max_retries: self.max_retries.max(1),
            batch_size: batch_size.max(1),
        })
    }
}

/// Vector database connection settings.
#[derive(Args, Debug, Clone)]
pub struct QdrantArgs {
    /// Qdrant REST endpoint
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    pub qdrant_url: String,

    /// Qdrant API key (Qdrant Cloud)
    #[arg(long, env = "QDRANT_API_KEY", hide_env_values = true)]
    pub qdrant_api_key: Option<String>,

    /// Max seconds to wait for each Qdrant request
    #[arg(long, env = "PAGECITE_QDRANT_TIMEOUT_SECS", default_value_t = 60)]
    pub qdrant_timeout_secs: u64,
}

impl QdrantArgs {
    /// Builds the Qdrant client.
    pub fn build_store(&self) -> Result<QdrantStore> {
        QdrantStore::new(QdrantConfig {
            url: self.qdrant_url.clone(),
            api_key: self.qdrant_api_key.clone(),
            timeout: Duration::from_secs(self.qdrant_timeout_secs.max(1)),
        })
    }
}

/// Chat backends selectable from the command line.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    /// OpenAI chat completions (`gpt-3.5-turbo`).
    Openai,
    /// ChatNBX hosted Llama 2 (`llama-2-chat-70b-4k`).
    Chatnbx,
    /// Anthropic messages API.
    Anthropic,
}

/// Answer model settings.
#[derive(Args, Debug, Clone)]
pub struct LlmArgs {
    /// Which LLM answers the question
    #[arg(long, env = "PAGECITE_PROVIDER", value_enum, default_value_t = ProviderKind::Chatnbx)]
    pub provider: ProviderKind,

    /// Model override; each provider has its own default
    #[arg(long, env = "PAGECITE_CHAT_MODEL")]
    pub chat_model: Option<String>,

    /// ChatNBX API key
    #[arg(long, env = "CHATNBX_API_KEY", hide_env_values = true)]
    pub chatnbx_api_key: Option<String>,

    /// ChatNBX API root
    #[arg(long, env = "PAGECITE_CHATNBX_BASE", default_value = "https://chat.nbox.ai/api")]
    pub chatnbx_base_url: String,

    /// Anthropic API key
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,

    /// Anthropic model used when no --chat-model is given
    #[arg(long, env = "PAGECITE_ANTHROPIC_MODEL", default_value = DEFAULT_ANTHROPIC_MODEL)]
    pub anthropic_model: String,

    /// Sampling temperature for the answer model
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Maximum tokens to request from the completion model
    #[arg(long)]
    pub max_completion_tokens: Option<usize>,
}

impl LlmArgs {
    /// Builds the selected provider; the OpenAI key is shared with embeddings.
    pub fn build_provider(&self, openai_api_key: Option<&str>) -> Result<Box<dyn LlmProvider>> {
        match self.provider {
            ProviderKind::Openai => {
                let key = openai_api_key
                    .filter(|key| !key.trim().is_empty())
                    .ok_or_else(|| anyhow!("OPENAI_API_KEY must be set for the OpenAI provider"))?;
                let config = self.tune(OpenAiChatConfig::openai(key.to_string()));
                Ok(Box::new(OpenAiProvider::new(config)?))
            }
            ProviderKind::Chatnbx => {
                let mut config =
                    self.tune(OpenAiChatConfig::chatnbx(self.chatnbx_api_key.clone().unwrap_or_default()));
                config.base_url = self.chatnbx_base_url.clone();
                Ok(Box::new(OpenAiProvider::new(config)?))
            }
            ProviderKind::Anthropic => {
                let key = self.anthropic_api_key.clone().ok_or_else(|| {
                    anyhow!("ANTHROPIC_API_KEY must be set for the Anthropic provider")
                })?;
                let model = self
                    .chat_model
                    .clone()
                    .unwrap_or_else(|| self.anthropic_model.clone());
                let mut config = AnthropicConfig::new(key, model);
                if let Some(max_tokens) = self.max_completion_tokens {
                    config.max_tokens = max_tokens;
                }
                Ok(Box::new(AnthropicProvider::new(config)?))
            }
        }
    }

    fn tune(&self, mut config: OpenAiChatConfig) -> OpenAiChatConfig {
        if let Some(model) = &self.chat_model {
            config.model = model.clone();
        }
        config.temperature = self.temperature;
        config.max_tokens = self.max_completion_tokens;
        config
    }
}
