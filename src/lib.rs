#![warn(missing_docs)]
//! Core library entry points for the pagecite PDF question-answering pipeline.

pub mod batcher;
pub mod chat;
pub mod chunker;
pub mod embedder;
pub mod embeddings;
pub mod ingest;
pub mod logging;
pub mod pdf;
pub mod settings;
pub mod vector_store;

pub use batcher::{embed_chunks, BatchConfig, BatchOutcome, EmbeddingFailure};
pub use chat::{ChatAnswer, ChatSession};
pub use chunker::{chunk_pages, ChunkingConfig};
pub use embedder::Embedder;
pub use embeddings::{Chunk, EmbeddedChunk, ScoredChunk};
pub use ingest::{IngestOptions, IngestReport};
pub use pdf::PageText;
pub use vector_store::{CollectionName, QdrantStore};
