use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use pagecite::batcher::BatchConfig;
use pagecite::chunker::ChunkingConfig;
use pagecite::ingest::{ingest_pdf, prepare_chunks, IngestOptions};
use pagecite::settings::{LogArgs, OpenAiArgs, QdrantArgs};
use pagecite::vector_store::Distance;
use pagecite::{logging, CollectionName};

#[derive(Parser, Debug)]
#[command(
    name = "pagecite-ingest",
    about = "Chunk a PDF, embed the chunks and bulk-load them into a Qdrant collection"
)]
struct IngestCli {
    /// PDF document to load
    pdf: PathBuf,

    /// Chunks embedded per bucket; buckets run one after another
    #[arg(long, env = "PAGECITE_BUCKET_SIZE", default_value_t = 16)]
    bucket_size: usize,

    /// Collection to (re)create and fill
    #[arg(long, env = "PAGECITE_COLLECTION", default_value = "my-test-collection")]
    collection_name: String,

    /// Max concurrent embedding requests inside a bucket
    #[arg(long, env = "PAGECITE_MAX_THREADS", default_value_t = 16)]
    max_threads: usize,

    /// Chunks sent per embedding request
    #[arg(long, env = "PAGECITE_INPUTS_PER_REQUEST", default_value_t = 1)]
    inputs_per_request: usize,

    /// Vector size of the collection (1536 for text-embedding-ada-002)
    #[arg(long, env = "PAGECITE_EMBEDDING_DIM", default_value_t = 1536)]
    embedding_dim: usize,

    /// Similarity metric for the collection
    #[arg(long, value_enum, default_value_t = Distance::Cosine)]
    distance: Distance,

    /// Window width in characters
    #[arg(long, default_value_t = 2500)]
    chunk_chars: usize,

    /// Fraction of each window repeated at the start of the next
    #[arg(long, default_value_t = 0.2)]
    overlap: f64,

    /// Skip pages with fewer words than this
    #[arg(long, default_value_t = 10)]
    min_words: usize,

    /// Points per upload request
    #[arg(long, env = "PAGECITE_UPLOAD_BATCH", default_value_t = 256)]
    upload_batch: usize,

    /// Also write embedded chunks to this JSONL file
    #[arg(long)]
    dump: Option<PathBuf>,

    /// Only extract and chunk; print stats and a sample payload
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    #[command(flatten)]
    openai: OpenAiArgs,

    #[command(flatten)]
    qdrant: QdrantArgs,

    #[command(flatten)]
    log: LogArgs,
}

fn main() -> Result<()> {
    let cli = IngestCli::parse();
    logging::init(&cli.log.log_level);

    let chunking = ChunkingConfig {
        chunk_chars: cli.chunk_chars,
        overlap_ratio: cli.overlap,
        min_words: cli.min_words,
    };

    if cli.dry_run {
        let (pages, chunks) = prepare_chunks(&cli.pdf, &chunking)?;
        println!("Total pages: {pages}");
        println!("Total payloads: {}", chunks.len());
        if let Some(sample) = chunks.first() {
            println!("Sample payload: {}", serde_json::to_string_pretty(sample)?);
        }
        println!("dry-run enabled; skipping embedding and upload.");
        return Ok(());
    }

    let batch = BatchConfig {
        bucket_size: cli.bucket_size.max(1),
        max_threads: cli.max_threads.max(1),
        inputs_per_request: cli.inputs_per_request.max(1),
    };
    let embedder = cli.openai.build_embedder(batch.inputs_per_request)?;
    let store = cli.qdrant.build_store()?;
    let options = IngestOptions {
        embedding_dim: cli.embedding_dim,
        distance: cli.distance,
        chunking,
        batch,
        upload_batch: cli.upload_batch.max(1),
        dump_path: cli.dump.clone(),
        ..IngestOptions::new(CollectionName::new(cli.collection_name.clone())?)
    };

    let report = ingest_pdf(&cli.pdf, &embedder, &store, &options)?;
    println!(
        "Loaded {} of {} payload{} from {} page{} into {} ({} skipped).",
        report.uploaded,
        report.payloads,
        if report.payloads == 1 { "" } else { "s" },
        report.pages,
        if report.pages == 1 { "" } else { "s" },
        options.collection,
        report.failed
    );
    Ok(())
}
