//! Shared chunk and embedding data structures used across pipeline stages.

use std::io::Write;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Text span cut from one PDF page; doubles as the Qdrant point payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Source document path as given on the command line.
    pub doc: String,
    /// Zero-based page index inside the document.
    pub page_no: usize,
    /// Window index within the page.
    pub chunk: usize,
    /// Chunk body text submitted to the embedding model.
    pub text: String,
}

/// Chunk paired with the vector returned by the embedding service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    /// Payload uploaded alongside the vector.
    #[serde(flatten)]
    pub chunk: Chunk,
    /// Model embedding vector.
    pub embedding: Vec<f32>,
}

/// Nearest-neighbor hit returned by the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// Stored payload of the matching point.
    pub payload: Chunk,
    /// Similarity score reported by the store (higher is closer for cosine).
    pub score: f32,
}

/// Writes embedded chunks as JSONL, one record per line.
pub fn write_jsonl<W: Write>(writer: &mut W, records: &[EmbeddedChunk]) -> Result<usize> {
    let mut written = 0usize;
    for record in records {
        serde_json::to_writer(&mut *writer, record)?;
        writer.write_all(b"\n")?;
        written += 1;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_chunk_serializes_flat_payload() {
        let record = EmbeddedChunk {
            chunk: Chunk {
                doc: "deck.pdf".into(),
                page_no: 3,
                chunk: 1,
                text: "hello".into(),
            },
            embedding: vec![0.5, 0.25],
        };
        let mut out = Vec::new();
        let written = write_jsonl(&mut out, &[record]).unwrap();
        assert_eq!(written, 1);

        let line = String::from_utf8(out).unwrap();
        assert!(line.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(value["doc"], "deck.pdf");
        assert_eq!(value["page_no"], 3);
        assert_eq!(value["chunk"], 1);
        assert_eq!(value["embedding"][1], 0.25);
    }
}
