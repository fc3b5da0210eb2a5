//! Retrieval-augmented question answering over an ingested collection.
//!
//! Each question is answered independently: embed it, pull the nearest
//! chunks from Qdrant, wrap them in the citation prompt and hand the result
//! to the configured LLM. Nothing is remembered between questions.

use std::time::Instant;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::embedder::Embedder;
use crate::embeddings::ScoredChunk;
use crate::vector_store::{CollectionName, QdrantStore};

pub mod prompt;
pub mod providers;

pub use providers::LlmProvider;

/// Number of chunks retrieved per question.
pub const DEFAULT_TOP_K: usize = 3;

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions for the model.
    System,
    /// The person asking.
    User,
    /// The model.
    Assistant,
}

/// One message in a chat-completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Speaker.
    pub role: Role,
    /// Message text.
    pub content: String,
}

/// Prompt assembled for a question, before the LLM call.
#[derive(Debug, Clone)]
pub struct PreparedPrompt {
    /// Messages to send to the model.
    pub messages: Vec<ChatMessage>,
    /// Retrieved chunks, in the order they are numbered in the prompt.
    pub data_points: Vec<ScoredChunk>,
    /// Time spent embedding the question and searching, in seconds.
    pub retrieval_secs: f64,
}

/// Answer plus the chunks it was grounded on.
#[derive(Debug, Clone)]
pub struct ChatAnswer {
    /// Model reply, with `<id>n</id>` citation tags.
    pub response: String,
    /// Retrieved chunks referenced by the citation ids.
    pub data_points: Vec<ScoredChunk>,
    /// Time spent embedding the question and searching, in seconds.
    pub retrieval_secs: f64,
    /// Time spent waiting on the LLM, in seconds.
    pub llm_secs: f64,
}

/// Question-answering loop over one collection.
pub struct ChatSession {
    embedder: Box<dyn Embedder>,
    store: QdrantStore,
    collection: CollectionName,
    provider: Box<dyn LlmProvider>,
    top_k: usize,
}

impl ChatSession {
    /// Wires the session's collaborators together.
    pub fn new(
        embedder: Box<dyn Embedder>,
        store: QdrantStore,
        collection: CollectionName,
        provider: Box<dyn LlmProvider>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            collection,
            provider,
            top_k: top_k.max(1),
        }
    }

    /// Provider label for status output.
    pub fn provider_label(&self) -> String {
        self.provider.describe()
    }

    /// Embeds `question`, retrieves context and builds the prompt.
    pub fn prepare(&self, question: &str) -> Result<PreparedPrompt> {
        anyhow::ensure!(!question.trim().is_empty(), "question is empty");
        let started = Instant::now();
        let vector = self
            .embedder
            .embed_one(question)
            .context("failed to embed question")?;
        let data_points = self
            .store
            .search(&self.collection, &vector, self.top_k)
            .with_context(|| format!("failed to search collection {}", self.collection))?;
        let retrieval_secs = started.elapsed().as_secs_f64();
        info!(hits = data_points.len(), retrieval_secs, "loaded data points");
        let messages = prompt::build_messages(question, &data_points);
        Ok(PreparedPrompt {
            messages,
            data_points,
            retrieval_secs,
        })
    }

    /// Answers `question` with citations into the retrieved chunks.
    pub fn ask(&self, question: &str) -> Result<ChatAnswer> {
        let prepared = self.prepare(question)?;
        self.complete(prepared)
    }

    /// Sends an already prepared prompt to the LLM.
    pub fn complete(&self, prepared: PreparedPrompt) -> Result<ChatAnswer> {
        let started = Instant::now();
        debug!(provider = %self.provider.describe(), "calling llm");
        let response = self.provider.complete(&prepared.messages)?;
        let llm_secs = started.elapsed().as_secs_f64();
        info!(llm_secs, "llm answered");
        Ok(ChatAnswer {
            response,
            data_points: prepared.data_points,
            retrieval_secs: prepared.retrieval_secs,
            llm_secs,
        })
    }
}
