//! PDF ingestion: extract, chunk, embed and bulk-load into Qdrant.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::batcher::{embed_chunks, BatchConfig};
use crate::chunker::{chunk_pages, ChunkingConfig};
use crate::embedder::Embedder;
use crate::embeddings::{write_jsonl, Chunk};
use crate::pdf::{extract_pages, PageText};
use crate::vector_store::{
    check_dimensions, CollectionName, Distance, QdrantStore, DEFAULT_UPLOAD_BATCH,
};

/// Output dimension of `text-embedding-ada-002`.
pub const DEFAULT_EMBEDDING_DIM: usize = 1536;

/// Knobs for a single ingestion run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Target collection; recreated on every run.
    pub collection: CollectionName,
    /// Vector size the collection is created with.
    pub embedding_dim: usize,
    /// Similarity metric for the collection.
    pub distance: Distance,
    /// Page filtering and windowing.
    pub chunking: ChunkingConfig,
    /// Embedding fan-out.
    pub batch: BatchConfig,
    /// Points per upload request.
    pub upload_batch: usize,
    /// Optional JSONL copy of every embedded chunk.
    pub dump_path: Option<PathBuf>,
}

impl IngestOptions {
    /// Defaults for `collection`.
    pub fn new(collection: CollectionName) -> Self {
        Self {
            collection,
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            distance: Distance::Cosine,
            chunking: ChunkingConfig::default(),
            batch: BatchConfig::default(),
            upload_batch: DEFAULT_UPLOAD_BATCH,
            dump_path: None,
        }
    }
}

/// Counters describing a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Pages in the source document.
    pub pages: usize,
    /// Chunks produced by the chunker.
    pub payloads: usize,
    /// Chunks that received an embedding.
    pub embedded: usize,
    /// Chunks skipped after an embedding failure.
    pub failed: usize,
    /// Points written to the collection.
    pub uploaded: usize,
}

/// Extracts and chunks `pdf` without touching any remote service.
pub fn prepare_chunks(pdf: &Path, chunking: &ChunkingConfig) -> Result<(usize, Vec<Chunk>)> {
    let pages = extract_pages(pdf)?;
    let doc = pdf.to_string_lossy();
    let chunks = chunk_pages(&doc, &pages, chunking)?;
    info!(pages = pages.len(), payloads = chunks.len(), "chunked document");
    Ok((pages.len(), chunks))
}

/// Runs the full pipeline for the PDF at `pdf`.
pub fn ingest_pdf<E>(
    pdf: &Path,
    embedder: &E,
    store: &QdrantStore,
    options: &IngestOptions,
) -> Result<IngestReport>
where
    E: Embedder + ?Sized,
{
    let pages = extract_pages(pdf)?;
    ingest_pages(&pdf.to_string_lossy(), &pages, embedder, store, options)
}

/// Runs chunk → embed → load for already extracted pages of `doc`.
pub fn ingest_pages<E>(
    doc: &str,
    pages: &[PageText],
    embedder: &E,
    store: &QdrantStore,
    options: &IngestOptions,
) -> Result<IngestReport>
where
    E: Embedder + ?Sized,
{
    let chunks = chunk_pages(doc, pages, &options.chunking)?;
    info!(pages = pages.len(), payloads = chunks.len(), "chunked document");
    if let Some(sample) = chunks.first() {
        info!(?sample, "sample payload");
    }
    let mut report = IngestReport {
        pages: pages.len(),
        payloads: chunks.len(),
        ..IngestReport::default()
    };

    let outcome = embed_chunks(embedder, chunks, &options.batch)?;
    report.embedded = outcome.embedded.len();
    report.failed = outcome.failed.len();
    anyhow::ensure!(
        report.embedded > 0,
        "no chunks were embedded ({} payloads, {} failed)",
        report.payloads,
        report.failed
    );

    // the collection is dropped below, so refuse bad vectors first
    check_dimensions(&outcome.embedded, options.embedding_dim)?;

    if let Some(path) = &options.dump_path {
        let file =
            File::create(path).with_context(|| format!("failed to create {:?}", path))?;
        let mut writer = BufWriter::new(file);
        let written = write_jsonl(&mut writer, &outcome.embedded)?;
        writer.flush()?;
        info!(path = %path.display(), written, "wrote embedding dump");
    }

    let collection = &options.collection;
    store.recreate_collection(collection, options.embedding_dim, options.distance)?;
    store.disable_indexing(collection)?;
    report.uploaded = store.upload_points(
        collection,
        &outcome.embedded,
        options.embedding_dim,
        options.upload_batch,
    )?;
    store.enable_indexing(collection)?;
    anyhow::ensure!(
        report.uploaded == report.embedded,
        "uploaded {} points for {} embeddings",
        report.uploaded,
        report.embedded
    );
    info!(?report, "ingestion complete");
    Ok(report)
}
