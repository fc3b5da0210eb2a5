//! Embedding clients used by the ingestion and chat stages.

use anyhow::Result;

pub mod openai;

pub use openai::OpenAiEmbedder;

/// Remote service that turns text into fixed-dimension vectors.
pub trait Embedder: Send + Sync {
    /// Embeds `inputs`, returning one vector per input in input order.
    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Maximum number of inputs accepted per request.
    fn batch_size(&self) -> usize;

    /// Embeds a single string.
    fn embed_one(&self, input: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[input])?;
        anyhow::ensure!(
            vectors.len() == 1,
            "expected one embedding, got {}",
            vectors.len()
        );
        Ok(vectors.remove(0))
    }
}
