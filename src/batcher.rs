//! Bounded-concurrency embedding fan-out.
//!
//! Chunks are processed bucket by bucket. Within a bucket the embedding
//! requests are spread over a small worker pool and the bucket is only
//! finished once every request has come back, so at most `max_threads`
//! requests are ever in flight. A request that fails marks each chunk it
//! carried as an [`EmbeddingFailure`]; the remaining chunks still go through.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use anyhow::Result;
use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::embedder::Embedder;
use crate::embeddings::{Chunk, EmbeddedChunk};

/// Fan-out settings for [`embed_chunks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Chunks per bucket; buckets run one after another.
    pub bucket_size: usize,
    /// Upper bound on concurrent requests inside a bucket.
    pub max_threads: usize,
    /// Chunks carried by each embedding request.
    pub inputs_per_request: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            bucket_size: 16,
            max_threads: 16,
            inputs_per_request: 1,
        }
    }
}

/// Chunk that could not be embedded, with the upstream error text.
#[derive(Debug, Clone)]
pub struct EmbeddingFailure {
    /// The chunk that was skipped.
    pub chunk: Chunk,
    /// Rendered error chain from the embedding call.
    pub error: String,
}

/// Result of embedding a full chunk list.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Successfully embedded chunks, in input order.
    pub embedded: Vec<EmbeddedChunk>,
    /// Chunks skipped because their request failed, in input order.
    pub failed: Vec<EmbeddingFailure>,
    /// Final value of the shared progress counter.
    pub processed: usize,
}

impl BatchOutcome {
    /// Total chunks accounted for.
    pub fn total(&self) -> usize {
        self.embedded.len() + self.failed.len()
    }
}

/// Embeds `chunks` with `embedder`, preserving input order in the outcome.
pub fn embed_chunks<E>(embedder: &E, chunks: Vec<Chunk>, config: &BatchConfig) -> Result<BatchOutcome>
where
    E: Embedder + ?Sized,
{
    anyhow::ensure!(config.bucket_size > 0, "bucket size must be positive");
    anyhow::ensure!(config.max_threads > 0, "max threads must be positive");
    let per_request = config
        .inputs_per_request
        .clamp(1, embedder.batch_size().max(1));

    let total = chunks.len();
    let progress = AtomicUsize::new(0);
    let mut outcome = BatchOutcome::default();
    let mut remaining = chunks.into_iter().peekable();
    let mut bucket_no = 0usize;
    info!(
        chunks = total,
        bucket_size = config.bucket_size,
        max_threads = config.max_threads,
        "embedding chunks"
    );

    while remaining.peek().is_some() {
        let bucket: Vec<Chunk> = remaining.by_ref().take(config.bucket_size).collect();
        let results = embed_bucket(
            embedder,
            bucket,
            per_request,
            config.max_threads,
            &progress,
            total,
        );
        for task in results {
            collect_task(task, &mut outcome);
        }
        info!(
            bucket = bucket_no,
            done = progress.load(Ordering::Relaxed),
            total,
            "bucket complete"
        );
        bucket_no += 1;
    }

    outcome.processed = progress.into_inner();
    if !outcome.failed.is_empty() {
        warn!(
            failed = outcome.failed.len(),
            embedded = outcome.embedded.len(),
            "some chunks were skipped"
        );
    }
    Ok(outcome)
}

fn embed_bucket<E>(
    embedder: &E,
    bucket: Vec<Chunk>,
    per_request: usize,
    max_threads: usize,
    progress: &AtomicUsize,
    total: usize,
) -> Vec<TaskResult>
where
    E: Embedder + ?Sized,
{
    let mut tasks = Vec::new();
    let mut bucket = bucket.into_iter().peekable();
    while bucket.peek().is_some() {
        let chunks: Vec<Chunk> = bucket.by_ref().take(per_request).collect();
        tasks.push(EmbeddingTask {
            id: tasks.len(),
            chunks,
        });
    }

    // both channels hold the whole bucket, so neither side ever blocks
    let capacity = tasks.len().max(1);
    let (task_tx, task_rx) = bounded::<EmbeddingTask>(capacity);
    let (result_tx, result_rx) = bounded::<TaskResult>(capacity);
    let workers = max_threads.min(tasks.len());
    for task in tasks {
        let sent = task_tx.send(task);
        debug_assert!(sent.is_ok(), "task channel sized to the bucket");
    }
    drop(task_tx);

    thread::scope(|scope| {
        for worker_id in 0..workers {
            let rx = task_rx.clone();
            let tx = result_tx.clone();
            scope.spawn(move || worker_loop(worker_id, embedder, rx, tx, progress, total));
        }
    });
    drop(result_tx);

    let mut ordered: BTreeMap<usize, TaskResult> = BTreeMap::new();
    for result in result_rx.iter() {
        ordered.insert(result.id, result);
    }
    ordered.into_values().collect()
}

fn worker_loop<E>(
    worker_id: usize,
    embedder: &E,
    receiver: Receiver<EmbeddingTask>,
    sender: Sender<TaskResult>,
    progress: &AtomicUsize,
    total: usize,
) where
    E: Embedder + ?Sized,
{
    for task in receiver.iter() {
        let EmbeddingTask { id, chunks } = task;
        let inputs: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        let vectors = embedder.embed_batch(&inputs).and_then(|vectors| {
            anyhow::ensure!(
                vectors.len() == chunks.len(),
                "embedding count {} mismatched request size {}",
                vectors.len(),
                chunks.len()
            );
            Ok(vectors)
        });
        let done = progress.fetch_add(chunks.len(), Ordering::Relaxed) + chunks.len();
        debug!(worker = worker_id, task = id, done, total, "embedding request finished");
        let result = TaskResult {
            id,
            chunks,
            vectors: vectors.map_err(|err| format!("{err:#}")),
        };
        if sender.send(result).is_err() {
            break;
        }
    }
}

fn collect_task(task: TaskResult, outcome: &mut BatchOutcome) {
    match task.vectors {
        Ok(vectors) => {
            for (chunk, embedding) in task.chunks.into_iter().zip(vectors) {
                outcome.embedded.push(EmbeddedChunk { chunk, embedding });
            }
        }
        Err(error) => {
            for chunk in task.chunks {
                warn!(
                    page = chunk.page_no,
                    chunk = chunk.chunk,
                    error = %error,
                    "skipping chunk after embedding failure"
                );
                outcome.failed.push(EmbeddingFailure {
                    chunk,
                    error: error.clone(),
                });
            }
        }
    }
}

struct EmbeddingTask {
    id: usize,
    chunks: Vec<Chunk>,
}

struct TaskResult {
    id: usize,
    chunks: Vec<Chunk>,
    vectors: std::result::Result<Vec<Vec<f32>>, String>,
}
